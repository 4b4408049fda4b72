//! A single cached file and its bookkeeping.

use std::collections::HashSet;
use std::time::Instant;

pub type ClientId = u64;

pub struct FileEntry {
    pub content: Vec<u8>,
    /// The client holding an exclusive lock over this file, if any.
    pub locker: Option<ClientId>,
    /// The client granted the next-write privilege, if any — set only by a
    /// successful open-with-CREATE-and-LOCK, cleared by any later mutation.
    pub writer: Option<ClientId>,
    pub openers: HashSet<ClientId>,
    pub last_access: Instant,
    pub access_count: u64,
}

impl FileEntry {
    pub fn new() -> Self {
        FileEntry {
            content: Vec::new(),
            locker: None,
            writer: None,
            openers: HashSet::new(),
            last_access: Instant::now(),
            access_count: 0,
        }
    }

    pub fn touch(&mut self) {
        self.last_access = Instant::now();
        self.access_count += 1;
    }
}
