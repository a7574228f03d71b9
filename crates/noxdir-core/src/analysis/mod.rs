//! Analysis — post-scan algorithms over the built tree.

pub mod diff;
pub mod top_entries;

pub use diff::{diff, Diff, DiffEntry, DiffStats};
pub use top_entries::{TopDirs, TopFiles, DEFAULT_TOP_LEN};
