//! Scan progress reporting — lightweight messages sent from the scan
//! workers to the consuming thread via a crossbeam channel.
//!
//! The tree data itself lives in the shared [`crate::scanner::LiveTree`];
//! these messages carry only counters and status flags.

use std::time::Duration;

/// Progress updates emitted while a scan runs.
#[derive(Debug)]
pub enum ScanProgress {
    /// Periodic update with running totals. Numbers are stale but
    /// converging while workers keep inserting.
    Update {
        files_found: u64,
        dirs_found: u64,
        total_size: i64,
        current_path: String,
    },

    /// A non-fatal per-directory error; the traversal continues.
    Error { path: String, message: String },

    /// The scan finished; the aggregated tree is in the shared
    /// `LiveTree`.
    Complete { duration: Duration, error_count: u64 },

    /// The scan was cancelled before completion.
    Cancelled,
}
