//! Hardlink deduplication — a concurrent set of file identifiers.
//!
//! Hardlinked data is reachable through several paths but occupies disk
//! space once. Every entry discovered by the platform layer is stamped
//! through this filter; only the first path wins, so the tree never holds
//! two entries for the same `(device, inode)` pair.
//!
//! An explicit context object owned by the scan, not a process global, so
//! concurrent scans (and tests) stay isolated.

use parking_lot::Mutex;
use std::collections::HashSet;

/// Thread-safe deduplication set keyed by a combined device/inode value.
#[derive(Default)]
pub struct InodeFilter {
    seen: Mutex<HashSet<u64>>,
}

impl InodeFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Combine a device id and inode number into one filter key.
    #[inline]
    pub fn key(device: u64, inode: u64) -> u64 {
        (device << 32) ^ inode
    }

    /// Record `key`, returning `true` on first insertion and `false` for
    /// a duplicate. A zero key means the platform could not produce a
    /// file identifier; those entries are never deduplicated.
    pub fn add(&self, key: u64) -> bool {
        if key == 0 {
            return true;
        }
        self.seen.lock().insert(key)
    }

    /// Clear the set between scans.
    pub fn reset(&self) {
        self.seen.lock().clear();
    }

    /// Number of distinct identifiers seen so far.
    pub fn len(&self) -> usize {
        self.seen.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_insertion_wins() {
        let filter = InodeFilter::new();
        let key = InodeFilter::key(2049, 117);

        assert!(filter.add(key));
        assert!(!filter.add(key));
        assert_eq!(filter.len(), 1);
    }

    #[test]
    fn zero_keys_always_pass() {
        let filter = InodeFilter::new();
        assert!(filter.add(0));
        assert!(filter.add(0));
        assert!(filter.is_empty());
    }

    #[test]
    fn reset_clears_between_scans() {
        let filter = InodeFilter::new();
        filter.add(InodeFilter::key(1, 1));
        filter.reset();
        assert!(filter.add(InodeFilter::key(1, 1)));
    }

    #[test]
    fn distinct_devices_do_not_collide() {
        let a = InodeFilter::key(1, 100);
        let b = InodeFilter::key(2, 100);
        assert_ne!(a, b);
    }
}
