//! Eviction policy selection.
//!
//! Numeric mapping follows `defines.h`'s own `policy_t` enum order in the
//! reference implementation — `FIFO = 0, LFU = 1, LRU = 2` — rather than
//! the other header's ordering.

use std::time::Instant;

use crate::error::ServerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    Fifo = 0,
    Lfu = 1,
    Lru = 2,
}

/// The two usage counters a victim selection needs, handed back by value so
/// the lookup closure isn't forced to return a reference into a lock guard.
#[derive(Debug, Clone, Copy)]
pub struct Usage {
    pub last_access: Instant,
    pub access_count: u64,
}

impl Policy {
    pub fn from_i64(v: i64) -> Result<Policy, ServerError> {
        Ok(match v {
            0 => Policy::Fifo,
            1 => Policy::Lfu,
            2 => Policy::Lru,
            _ => return Err(ServerError::Config("replacement policy must be 0, 1, or 2".into())),
        })
    }

    /// Picks the index into `order` (the cache's insertion-order sequence)
    /// of the victim to evict. Ties are always broken by insertion order
    /// (earliest wins), which is automatic for FIFO and explicit for
    /// LRU/LFU below since we scan in insertion order and only replace the
    /// incumbent on a strictly smaller value.
    pub fn select_victim<F>(&self, order: &[String], usage: F) -> Option<usize>
    where
        F: Fn(&str) -> Usage,
    {
        if order.is_empty() {
            return None;
        }
        match self {
            Policy::Fifo => Some(0),
            Policy::Lru => {
                let mut best_idx = 0;
                let mut best_time = usage(&order[0]).last_access;
                for (idx, name) in order.iter().enumerate().skip(1) {
                    let t = usage(name).last_access;
                    if t < best_time {
                        best_time = t;
                        best_idx = idx;
                    }
                }
                Some(best_idx)
            }
            Policy::Lfu => {
                let mut best_idx = 0;
                let mut best_count = usage(&order[0]).access_count;
                for (idx, name) in order.iter().enumerate().skip(1) {
                    let c = usage(name).access_count;
                    if c < best_count {
                        best_count = c;
                        best_idx = idx;
                    }
                }
                Some(best_idx)
            }
        }
    }
}
