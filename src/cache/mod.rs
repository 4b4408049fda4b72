//! The concurrent file cache — the hard part of this crate.
//!
//! Structural changes (creating/removing entries, the insertion-order
//! sequence, the capacity counters) are guarded by one global `RwLock`; each
//! file's mutable state (content, locker, writer, openers, usage counters)
//! is additionally guarded by its own per-file `RwLock`, so unrelated files
//! can be read concurrently under a single global read lock. This mirrors
//! `editr`'s `FileStateContainer` (global `RwLock<HashMap<..>>`, per-file
//! client bookkeeping) generalized with the per-file locks, eviction policy,
//! and usage counters `cache.c` in the reference implementation adds.

pub mod file_entry;
pub mod policy;

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Outcome, ServerError};
use crate::sync::RwLock;

pub use file_entry::ClientId;
use file_entry::FileEntry;
pub use policy::Policy;
use policy::Usage;

/// Result of an operation that may trigger eviction: the primary outcome,
/// plus whichever victims were actually removed from the cache during the
/// call (possibly including the target itself on a self-eviction failure).
pub struct EvictingResult<T> {
    pub outcome: Outcome<T>,
    pub evicted: Vec<(String, Vec<u8>)>,
}

struct Inner {
    map: HashMap<String, Arc<RwLock<FileEntry>>>,
    order: Vec<String>,
    byte_total: usize,
    peak_file_count: usize,
    peak_byte_total: usize,
    eviction_events: u64,
}

impl Inner {
    fn new() -> Self {
        Inner {
            map: HashMap::new(),
            order: Vec::new(),
            byte_total: 0,
            peak_file_count: 0,
            peak_byte_total: 0,
            eviction_events: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct CacheStats {
    pub current_file_count: usize,
    pub current_byte_total: usize,
    pub peak_file_count: usize,
    pub peak_byte_total: usize,
    pub eviction_events: u64,
}

pub struct Cache {
    policy: Policy,
    max_files: usize,
    max_bytes: usize,
    inner: RwLock<Inner>,
}

impl Cache {
    pub fn new(max_files: usize, max_bytes: usize, policy: Policy) -> Self {
        Cache {
            policy,
            max_files,
            max_bytes,
            inner: RwLock::new(Inner::new()),
        }
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.read();
        CacheStats {
            current_file_count: inner.map.len(),
            current_byte_total: inner.byte_total,
            peak_file_count: inner.peak_file_count,
            peak_byte_total: inner.peak_byte_total,
            eviction_events: inner.eviction_events,
        }
    }

    /// Names still resident in the cache, in insertion order — used for the
    /// residual listing logged on shutdown.
    pub fn resident_names(&self) -> Vec<String> {
        self.inner.read().order.clone()
    }

    // ---- 4.2.1 openFile -------------------------------------------------

    pub fn open_file(&self, name: &str, flags: u8, client: ClientId) -> Outcome<()> {
        use crate::protocol::flags::{CREATE, LOCK};

        if flags & CREATE != 0 {
            let mut inner = self.inner.write();
            if inner.map.contains_key(name) {
                return Outcome::Failure(ServerError::AlreadyExists);
            }
            if inner.map.len() == self.max_files {
                return Outcome::Failure(ServerError::NoSpace);
            }
            let mut entry = FileEntry::new();
            entry.openers.insert(client);
            if flags & LOCK != 0 {
                entry.locker = Some(client);
                entry.writer = Some(client);
            }
            inner.map.insert(name.to_string(), Arc::new(RwLock::new(entry)));
            inner.order.push(name.to_string());
            inner.peak_file_count = inner.peak_file_count.max(inner.map.len());
            Outcome::Success(())
        } else {
            let inner = self.inner.read();
            let entry_arc = match inner.map.get(name) {
                Some(e) => e.clone(),
                None => return Outcome::Failure(ServerError::NoSuchEntry),
            };

            {
                let entry = entry_arc.read();
                if entry.openers.contains(&client) {
                    return Outcome::Failure(ServerError::AlreadyOpen);
                }
                if flags & LOCK != 0 {
                    if let Some(locker) = entry.locker {
                        if locker != client {
                            return Outcome::Failure(ServerError::PermissionDenied);
                        }
                    }
                }
            }

            let mut entry = entry_arc.write();
            if entry.openers.contains(&client) {
                return Outcome::Failure(ServerError::AlreadyOpen);
            }
            if flags & LOCK != 0 {
                if let Some(locker) = entry.locker {
                    if locker != client {
                        return Outcome::Failure(ServerError::PermissionDenied);
                    }
                }
            }
            entry.openers.insert(client);
            if flags & LOCK != 0 && entry.locker.is_none() {
                entry.locker = Some(client);
            }
            entry.touch();
            Outcome::Success(())
        }
    }

    // ---- 4.2.2 readFile ---------------------------------------------------

    pub fn read_file(&self, name: &str, client: ClientId) -> Outcome<Vec<u8>> {
        let inner = self.inner.read();
        let entry_arc = match inner.map.get(name) {
            Some(e) => e.clone(),
            None => return Outcome::Failure(ServerError::NoSuchEntry),
        };

        {
            let entry = entry_arc.read();
            if let Some(locker) = entry.locker {
                if locker != client {
                    return Outcome::Failure(ServerError::PermissionDenied);
                }
            }
            if !entry.openers.contains(&client) {
                return Outcome::Failure(ServerError::AccessDenied);
            }
        }

        let mut entry = entry_arc.write();
        if let Some(locker) = entry.locker {
            if locker != client {
                return Outcome::Failure(ServerError::PermissionDenied);
            }
        }
        if !entry.openers.contains(&client) {
            return Outcome::Failure(ServerError::AccessDenied);
        }
        let content = entry.content.clone();
        entry.writer = None;
        entry.touch();
        Outcome::Success(content)
    }

    // ---- 4.2.3 readNFiles --------------------------------------------------

    pub fn read_n_files(&self, n: i64, client: ClientId) -> Outcome<Vec<(String, Vec<u8>)>> {
        let inner = self.inner.read();
        let order = inner.order.clone();
        let total = order.len();
        let effective_n = if n <= 0 || (n as usize) > total {
            total
        } else {
            n as usize
        };

        let mut results = Vec::new();
        let mut attempts = 0usize;
        for name in order.iter() {
            if attempts >= effective_n {
                break;
            }
            attempts += 1;
            let entry_arc = match inner.map.get(name) {
                Some(e) => e.clone(),
                None => continue,
            };

            {
                let entry = entry_arc.read();
                if let Some(locker) = entry.locker {
                    if locker != client {
                        continue;
                    }
                }
            }

            let mut entry = entry_arc.write();
            if let Some(locker) = entry.locker {
                if locker != client {
                    continue;
                }
            }
            let content = entry.content.clone();
            entry.writer = None;
            entry.touch();
            results.push((name.clone(), content));
        }
        Outcome::Success(results)
    }

    // ---- 4.2.4 writeFile ---------------------------------------------------

    pub fn write_file(&self, name: &str, content: Vec<u8>, client: ClientId) -> EvictingResult<()> {
        if content.len() > self.max_bytes {
            return EvictingResult {
                outcome: Outcome::Failure(ServerError::FileTooBig),
                evicted: Vec::new(),
            };
        }

        let mut inner = self.inner.write();
        let entry_arc = match inner.map.get(name) {
            Some(e) => e.clone(),
            None => {
                return EvictingResult {
                    outcome: Outcome::Failure(ServerError::NoSuchEntry),
                    evicted: Vec::new(),
                }
            }
        };

        let old_len = {
            let entry = entry_arc.read();
            if entry.writer != Some(client) {
                return EvictingResult {
                    outcome: Outcome::Failure(ServerError::AccessDenied),
                    evicted: Vec::new(),
                };
            }
            entry.content.len()
        };

        let mut evicted = Vec::new();
        loop {
            let prospective = inner.byte_total - old_len + content.len();
            if prospective <= self.max_bytes {
                break;
            }
            match self.evict_one(&mut inner) {
                Some((victim_name, victim_content)) => {
                    let is_self = victim_name == name;
                    evicted.push((victim_name, victim_content));
                    if is_self {
                        return EvictingResult {
                            outcome: Outcome::Failure(ServerError::Evicted),
                            evicted,
                        };
                    }
                }
                None => break,
            }
        }

        let mut entry = entry_arc.write();
        inner.byte_total = inner.byte_total - old_len + content.len();
        entry.content = content;
        entry.writer = None;
        inner.peak_byte_total = inner.peak_byte_total.max(inner.byte_total);
        EvictingResult {
            outcome: Outcome::Success(()),
            evicted,
        }
    }

    // ---- 4.2.5 appendToFile ------------------------------------------------

    pub fn append_to_file(&self, name: &str, buf: Vec<u8>, client: ClientId) -> EvictingResult<()> {
        let mut inner = self.inner.write();
        let entry_arc = match inner.map.get(name) {
            Some(e) => e.clone(),
            None => {
                return EvictingResult {
                    outcome: Outcome::Failure(ServerError::NoSuchEntry),
                    evicted: Vec::new(),
                }
            }
        };

        {
            let entry = entry_arc.read();
            if !entry.openers.contains(&client) {
                return EvictingResult {
                    outcome: Outcome::Failure(ServerError::AccessDenied),
                    evicted: Vec::new(),
                };
            }
            if let Some(locker) = entry.locker {
                if locker != client {
                    return EvictingResult {
                        outcome: Outcome::Failure(ServerError::PermissionDenied),
                        evicted: Vec::new(),
                    };
                }
            }
        }

        if buf.is_empty() {
            return EvictingResult {
                outcome: Outcome::Success(()),
                evicted: Vec::new(),
            };
        }

        let mut evicted = Vec::new();
        loop {
            let prospective = inner.byte_total + buf.len();
            if prospective <= self.max_bytes {
                break;
            }
            match self.evict_one(&mut inner) {
                Some((victim_name, victim_content)) => {
                    let is_self = victim_name == name;
                    evicted.push((victim_name, victim_content));
                    if is_self {
                        return EvictingResult {
                            outcome: Outcome::Failure(ServerError::Evicted),
                            evicted,
                        };
                    }
                }
                None => break,
            }
        }

        let mut entry = entry_arc.write();
        entry.content.extend_from_slice(&buf);
        entry.writer = None;
        inner.byte_total += buf.len();
        inner.peak_byte_total = inner.peak_byte_total.max(inner.byte_total);
        EvictingResult {
            outcome: Outcome::Success(()),
            evicted,
        }
    }

    /// Selects one victim under the configured policy, removes it from both
    /// the map and the ordered name sequence, and returns its name and
    /// content. Caller must already hold the global write lock.
    fn evict_one(&self, inner: &mut Inner) -> Option<(String, Vec<u8>)> {
        let map = &inner.map;
        let victim_idx = self.policy.select_victim(&inner.order, |name| {
            let entry = map.get(name).expect("name in order implies name in map").read();
            Usage {
                last_access: entry.last_access,
                access_count: entry.access_count,
            }
        })?;
        let victim_name = inner.order.remove(victim_idx);
        let victim_arc = inner.map.remove(&victim_name)?;
        let victim_content = victim_arc.read().content.clone();
        inner.byte_total -= victim_content.len();
        inner.eviction_events += 1;
        Some((victim_name, victim_content))
    }

    // ---- 4.2.6 lockFile -----------------------------------------------------

    pub fn lock_file(&self, name: &str, client: ClientId) -> Outcome<()> {
        let inner = self.inner.read();
        let entry_arc = match inner.map.get(name) {
            Some(e) => e.clone(),
            None => return Outcome::Failure(ServerError::NoSuchEntry),
        };

        {
            let entry = entry_arc.read();
            if !entry.openers.contains(&client) {
                return Outcome::Failure(ServerError::AccessDenied);
            }
            if entry.locker == Some(client) {
                return Outcome::Success(());
            }
            if let Some(locker) = entry.locker {
                if locker != client {
                    return Outcome::Failure(ServerError::PermissionDenied);
                }
            }
        }

        let mut entry = entry_arc.write();
        if !entry.openers.contains(&client) {
            return Outcome::Failure(ServerError::AccessDenied);
        }
        if entry.locker == Some(client) {
            return Outcome::Success(());
        }
        if let Some(locker) = entry.locker {
            if locker != client {
                return Outcome::Failure(ServerError::PermissionDenied);
            }
        }
        entry.locker = Some(client);
        entry.writer = None;
        entry.touch();
        Outcome::Success(())
    }

    // ---- 4.2.7 unlockFile ---------------------------------------------------

    pub fn unlock_file(&self, name: &str, client: ClientId) -> Outcome<()> {
        let inner = self.inner.read();
        let entry_arc = match inner.map.get(name) {
            Some(e) => e.clone(),
            None => return Outcome::Failure(ServerError::NoSuchEntry),
        };

        {
            let entry = entry_arc.read();
            if !entry.openers.contains(&client) {
                return Outcome::Failure(ServerError::AccessDenied);
            }
            if entry.locker != Some(client) {
                return Outcome::Failure(ServerError::PermissionDenied);
            }
        }

        let mut entry = entry_arc.write();
        if !entry.openers.contains(&client) {
            return Outcome::Failure(ServerError::AccessDenied);
        }
        if entry.locker != Some(client) {
            return Outcome::Failure(ServerError::PermissionDenied);
        }
        entry.locker = None;
        entry.writer = None;
        entry.touch();
        Outcome::Success(())
    }

    // ---- 4.2.8 closeFile ----------------------------------------------------

    pub fn close_file(&self, name: &str, client: ClientId) -> Outcome<()> {
        let inner = self.inner.read();
        let entry_arc = match inner.map.get(name) {
            Some(e) => e.clone(),
            None => return Outcome::Failure(ServerError::NoSuchEntry),
        };

        {
            let entry = entry_arc.read();
            if !entry.openers.contains(&client) {
                return Outcome::Failure(ServerError::AccessDenied);
            }
        }

        let mut entry = entry_arc.write();
        if !entry.openers.contains(&client) {
            return Outcome::Failure(ServerError::AccessDenied);
        }
        // Note: locker is NOT cleared here — a client may hold a lock on a
        // file it has closed.
        entry.openers.remove(&client);
        entry.writer = None;
        entry.touch();
        Outcome::Success(())
    }

    // ---- 4.2.9 removeFile ----------------------------------------------------

    pub fn remove_file(&self, name: &str, client: ClientId) -> Outcome<()> {
        let mut inner = self.inner.write();
        let entry_arc = match inner.map.get(name) {
            Some(e) => e.clone(),
            None => return Outcome::Failure(ServerError::NoSuchEntry),
        };

        {
            let entry = entry_arc.read();
            if !entry.openers.contains(&client) {
                return Outcome::Failure(ServerError::AccessDenied);
            }
            if entry.locker != Some(client) {
                return Outcome::Failure(ServerError::PermissionDenied);
            }
        }

        let content_len = entry_arc.read().content.len();
        inner.byte_total -= content_len;
        inner.map.remove(name);
        inner.order.retain(|n| n != name);
        Outcome::Success(())
    }

    /// Clears a departed client's bookkeeping from every file: removes it
    /// from `openers`, and clears `locker`/`writer` wherever it matches.
    /// The original C server never runs this cleanup; a client that drops
    /// its connection without explicitly unlocking leaves the lock stuck
    /// forever under that behavior.
    pub fn disconnect_client(&self, client: ClientId) {
        let inner = self.inner.read();
        for entry_arc in inner.map.values() {
            let mut entry = entry_arc.write();
            entry.openers.remove(&client);
            if entry.locker == Some(client) {
                entry.locker = None;
            }
            if entry.writer == Some(client) {
                entry.writer = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::flags::{CREATE, LOCK};

    const CLIENT_A: ClientId = 1;
    const CLIENT_B: ClientId = 2;

    fn assert_success<T>(outcome: Outcome<T>) -> T {
        match outcome {
            Outcome::Success(v) => v,
            Outcome::Failure(e) => panic!("expected success, got failure: {e}"),
            Outcome::Fatal(e) => panic!("expected success, got fatal: {e}"),
        }
    }

    fn assert_failure<T>(outcome: Outcome<T>, expected: ServerError) {
        match outcome {
            Outcome::Success(_) => panic!("expected failure({expected}), got success"),
            Outcome::Failure(e) => {
                assert_eq!(e.errno(), expected.errno(), "got {e}, expected {expected}")
            }
            Outcome::Fatal(e) => panic!("expected failure({expected}), got fatal({e})"),
        }
    }

    // Basic write/read round-trip.
    #[test]
    fn basic_write_read_round_trip() {
        let cache = Cache::new(10, 1024, Policy::Fifo);
        assert_success(cache.open_file("x", CREATE | LOCK, CLIENT_A));
        let write = cache.write_file("x", b"hello".to_vec(), CLIENT_A);
        assert_success(write.outcome);
        assert!(write.evicted.is_empty());
        let content = assert_success(cache.read_file("x", CLIENT_A));
        assert_eq!(content, b"hello");
    }

    #[test]
    fn round_trip_holds_under_every_policy() {
        for policy in [Policy::Fifo, Policy::Lru, Policy::Lfu] {
            let cache = Cache::new(10, 1024, policy);
            assert_success(cache.open_file("p", CREATE | LOCK, CLIENT_A));
            assert_success(cache.write_file("p", b"payload".to_vec(), CLIENT_A).outcome);
            let content = assert_success(cache.read_file("p", CLIENT_A));
            assert_eq!(content, b"payload", "policy {:?}", policy);
        }
    }

    // Permission semantics: opening without LOCK doesn't grant locking
    // rights, and lock() is idempotent for the current locker.
    #[test]
    fn permission_and_idempotent_lock() {
        let cache = Cache::new(10, 1024, Policy::Lru);
        assert_success(cache.open_file("x", CREATE | LOCK, CLIENT_A));
        assert_success(cache.open_file("x", 0, CLIENT_B));

        assert_failure(cache.lock_file("x", CLIENT_B), ServerError::PermissionDenied);
        assert_failure(cache.lock_file("x", CLIENT_B), ServerError::PermissionDenied);

        assert_success(cache.unlock_file("x", CLIENT_A));
        assert_success(cache.lock_file("x", CLIENT_B));
        // idempotent: locking again as the current locker is a no-op success
        assert_success(cache.lock_file("x", CLIENT_B));
    }

    // Capacity eviction under FIFO picks the oldest entry.
    #[test]
    fn capacity_eviction_fifo() {
        let cache = Cache::new(10, 100, Policy::Fifo);
        for (name, payload) in [("a", vec![1u8; 40]), ("b", vec![2u8; 40])] {
            assert_success(cache.open_file(name, CREATE | LOCK, CLIENT_A));
            assert_success(cache.write_file(name, payload, CLIENT_A).outcome);
            assert_success(cache.unlock_file(name, CLIENT_A));
        }
        assert_success(cache.open_file("c", CREATE | LOCK, CLIENT_A));
        let result = cache.write_file("c", vec![3u8; 40], CLIENT_A);
        assert_success(result.outcome);
        assert_eq!(result.evicted.len(), 1);
        assert_eq!(result.evicted[0].0, "a");
        assert_eq!(result.evicted[0].1.len(), 40);
        assert_eq!(cache.stats().current_byte_total, 80);
    }

    // Writer privilege is single-use: it is granted only by the CREATE|LOCK
    // open that made the entry, and cleared by that entry's first mutation
    // A second write by the same client
    // with no intervening re-creation is access-denied, not re-attempted.
    #[test]
    fn writer_privilege_does_not_survive_a_write() {
        let cache = Cache::new(10, 50, Policy::Fifo);
        assert_success(cache.open_file("a", CREATE | LOCK, CLIENT_A));
        assert_success(cache.write_file("a", vec![1u8; 40], CLIENT_A).outcome);
        let result = cache.write_file("a", vec![2u8; 10], CLIENT_A);
        assert_failure(result.outcome, ServerError::AccessDenied);
    }

    // Self-eviction failure. The write's own target can be chosen as
    // the eviction victim — here because LRU tracks wall-clock `last_access`
    // rather than the insertion-order sequence: "a" is inserted last but
    // last touched first, so once "old" is read again afterward, "a" is the
    // least-recently-used entry despite being the newest one.
    #[test]
    fn self_eviction_failure() {
        let cache = Cache::new(10, 50, Policy::Lru);

        assert_success(cache.open_file("old", CREATE | LOCK, CLIENT_A));
        assert_success(cache.write_file("old", vec![9u8; 30], CLIENT_A).outcome);
        assert_success(cache.unlock_file("old", CLIENT_A));
        std::thread::sleep(std::time::Duration::from_millis(5));

        assert_success(cache.open_file("a", CREATE | LOCK, CLIENT_A));
        std::thread::sleep(std::time::Duration::from_millis(5));

        assert_success(cache.open_file("old", 0, CLIENT_B));
        assert_success(cache.read_file("old", CLIENT_B));

        let result = cache.write_file("a", vec![1u8; 30], CLIENT_A);
        assert_failure(result.outcome, ServerError::Evicted);
        assert_eq!(result.evicted.len(), 1);
        assert_eq!(result.evicted[0].0, "a");
        assert_failure(cache.read_file("a", CLIENT_A), ServerError::NoSuchEntry);
        // "old" survives: only the target itself was chosen as victim.
        assert_success(cache.read_file("old", CLIENT_B));
    }

    // readN returns files in insertion order.
    #[test]
    fn read_n_ordering() {
        let cache = Cache::new(10, 1024, Policy::Fifo);
        for name in ["a", "b", "c"] {
            assert_success(cache.open_file(name, CREATE | LOCK, CLIENT_A));
            assert_success(cache.write_file(name, vec![0u8; 1], CLIENT_A).outcome);
        }
        let result = assert_success(cache.read_n_files(2, CLIENT_A));
        let names: Vec<&str> = result.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn read_n_skips_files_locked_by_others() {
        let cache = Cache::new(10, 1024, Policy::Fifo);
        for name in ["a", "b"] {
            assert_success(cache.open_file(name, CREATE | LOCK, CLIENT_A));
            assert_success(cache.write_file(name, vec![0u8; 1], CLIENT_A).outcome);
        }
        // "a" stays locked by CLIENT_A; CLIENT_B should see only "b"
        assert_success(cache.open_file("b", 0, CLIENT_B));
        let result = assert_success(cache.read_n_files(0, CLIENT_B));
        let names: Vec<&str> = result.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["b"]);
    }

    // Policy correctness: LRU evicts whoever was touched least recently.
    #[test]
    fn lru_evicts_least_recently_used() {
        let cache = Cache::new(10, 100, Policy::Lru);
        assert_success(cache.open_file("a", CREATE | LOCK, CLIENT_A));
        assert_success(cache.write_file("a", vec![0u8; 40], CLIENT_A).outcome);
        assert_success(cache.unlock_file("a", CLIENT_A));

        std::thread::sleep(std::time::Duration::from_millis(5));
        assert_success(cache.open_file("b", CREATE | LOCK, CLIENT_A));
        assert_success(cache.write_file("b", vec![0u8; 40], CLIENT_A).outcome);
        assert_success(cache.unlock_file("b", CLIENT_A));

        std::thread::sleep(std::time::Duration::from_millis(5));
        // touch "a" again so "b" becomes the least-recently-used entry
        assert_success(cache.read_file("a", CLIENT_A));

        std::thread::sleep(std::time::Duration::from_millis(5));
        assert_success(cache.open_file("c", CREATE | LOCK, CLIENT_A));
        let result = cache.write_file("c", vec![0u8; 40], CLIENT_A);
        assert_eq!(result.evicted.len(), 1);
        assert_eq!(result.evicted[0].0, "b");
    }

    // Policy correctness: LFU evicts whoever has the fewest accesses.
    #[test]
    fn lfu_evicts_least_frequently_used() {
        let cache = Cache::new(10, 100, Policy::Lfu);
        assert_success(cache.open_file("a", CREATE | LOCK, CLIENT_A));
        assert_success(cache.write_file("a", vec![0u8; 40], CLIENT_A).outcome);
        assert_success(cache.unlock_file("a", CLIENT_A));

        assert_success(cache.open_file("b", CREATE | LOCK, CLIENT_A));
        assert_success(cache.write_file("b", vec![0u8; 40], CLIENT_A).outcome);
        assert_success(cache.unlock_file("b", CLIENT_A));

        // give "a" extra accesses so it has a higher access_count than "b"
        assert_success(cache.read_file("a", CLIENT_A));
        assert_success(cache.open_file("a", 0, CLIENT_B));
        assert_success(cache.read_file("a", CLIENT_B));

        assert_success(cache.open_file("c", CREATE | LOCK, CLIENT_A));
        let result = cache.write_file("c", vec![0u8; 40], CLIENT_A);
        assert_eq!(result.evicted.len(), 1);
        assert_eq!(result.evicted[0].0, "b");
    }

    // Invariant 2: a non-opener gets access-denied on every non-OPEN op.
    #[test]
    fn non_opener_is_denied() {
        let cache = Cache::new(10, 1024, Policy::Fifo);
        assert_success(cache.open_file("x", CREATE, CLIENT_A));
        assert_failure(cache.read_file("x", CLIENT_B), ServerError::AccessDenied);
        assert_failure(cache.lock_file("x", CLIENT_B), ServerError::AccessDenied);
        assert_failure(cache.unlock_file("x", CLIENT_B), ServerError::AccessDenied);
        assert_failure(cache.close_file("x", CLIENT_B), ServerError::AccessDenied);
        assert_failure(cache.remove_file("x", CLIENT_B), ServerError::AccessDenied);
    }

    // Invariant: byte/file counters track actual content exactly.
    #[test]
    fn counters_track_content_and_file_count() {
        let cache = Cache::new(10, 1024, Policy::Fifo);
        assert_success(cache.open_file("a", CREATE | LOCK, CLIENT_A));
        assert_success(cache.write_file("a", vec![0u8; 30], CLIENT_A).outcome);
        assert_success(cache.open_file("b", CREATE | LOCK, CLIENT_A));
        assert_success(cache.write_file("b", vec![0u8; 20], CLIENT_A).outcome);

        let stats = cache.stats();
        assert_eq!(stats.current_file_count, 2);
        assert_eq!(stats.current_byte_total, 50);
        assert_eq!(stats.peak_file_count, 2);
        assert_eq!(stats.peak_byte_total, 50);

        assert_success(cache.remove_file("a", CLIENT_A));
        let stats = cache.stats();
        assert_eq!(stats.current_file_count, 1);
        assert_eq!(stats.current_byte_total, 20);
        // peaks never decrease
        assert_eq!(stats.peak_file_count, 2);
        assert_eq!(stats.peak_byte_total, 50);
    }

    // No-space rejection on CREATE at file-count capacity.
    #[test]
    fn create_rejected_at_file_count_capacity() {
        let cache = Cache::new(1, 1024, Policy::Fifo);
        assert_success(cache.open_file("a", CREATE, CLIENT_A));
        assert_failure(cache.open_file("b", CREATE, CLIENT_B), ServerError::NoSpace);
    }

    // File-too-big is independent of current occupancy.
    #[test]
    fn write_rejected_when_content_exceeds_cache_capacity() {
        let cache = Cache::new(10, 50, Policy::Fifo);
        assert_success(cache.open_file("a", CREATE | LOCK, CLIENT_A));
        let result = cache.write_file("a", vec![0u8; 51], CLIENT_A);
        assert_failure(result.outcome, ServerError::FileTooBig);
    }

    // Append requires opener status and respects the locker, independent of
    // the writer-privilege flag that write() consumes.
    #[test]
    fn append_requires_opener_and_respects_locker() {
        let cache = Cache::new(10, 1024, Policy::Fifo);
        assert_success(cache.open_file("a", CREATE | LOCK, CLIENT_A));
        assert_success(cache.write_file("a", b"ab".to_vec(), CLIENT_A).outcome);

        assert_failure(cache.append_to_file("a", b"!".to_vec(), CLIENT_B), ServerError::AccessDenied);

        assert_success(cache.open_file("a", 0, CLIENT_B));
        assert_failure(
            cache.append_to_file("a", b"!".to_vec(), CLIENT_B),
            ServerError::PermissionDenied,
        );

        assert_success(cache.append_to_file("a", b"cd".to_vec(), CLIENT_A).outcome);
        assert_eq!(assert_success(cache.read_file("a", CLIENT_A)), b"abcd");
    }

    // Zero-length append is a no-op success (distinct from write, which has
    // no zero-length special case).
    #[test]
    fn zero_length_append_is_success_with_no_change() {
        let cache = Cache::new(10, 1024, Policy::Fifo);
        assert_success(cache.open_file("a", CREATE | LOCK, CLIENT_A));
        assert_success(cache.write_file("a", b"x".to_vec(), CLIENT_A).outcome);
        assert_success(cache.append_to_file("a", Vec::new(), CLIENT_A).outcome);
        assert_eq!(cache.stats().current_byte_total, 1);
    }

    // close() does not implicitly unlock.
    #[test]
    fn close_does_not_unlock() {
        let cache = Cache::new(10, 1024, Policy::Fifo);
        assert_success(cache.open_file("a", CREATE | LOCK, CLIENT_A));
        assert_success(cache.close_file("a", CLIENT_A));
        assert_success(cache.open_file("a", 0, CLIENT_B));
        assert_failure(cache.lock_file("a", CLIENT_B), ServerError::PermissionDenied);
    }

    // Disconnect cleanup: a departed client's openers/locker bookkeeping
    // is cleared crate-wide.
    #[test]
    fn disconnect_clears_openers_and_locker() {
        let cache = Cache::new(10, 1024, Policy::Fifo);
        assert_success(cache.open_file("a", CREATE | LOCK, CLIENT_A));
        cache.disconnect_client(CLIENT_A);

        assert_success(cache.open_file("a", LOCK, CLIENT_B));
        assert_success(cache.read_file("a", CLIENT_B));
    }

    // remove requires being the locker, not just an opener.
    #[test]
    fn remove_requires_locker() {
        let cache = Cache::new(10, 1024, Policy::Fifo);
        assert_success(cache.open_file("a", CREATE | LOCK, CLIENT_A));
        assert_success(cache.open_file("a", 0, CLIENT_B));
        assert_failure(cache.remove_file("a", CLIENT_B), ServerError::PermissionDenied);
        assert_success(cache.remove_file("a", CLIENT_A));
        assert_failure(cache.read_file("a", CLIENT_A), ServerError::NoSuchEntry);
    }
}
