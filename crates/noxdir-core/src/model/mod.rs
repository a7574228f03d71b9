//! Data model — the arena-allocated directory tree and size formatting.

pub mod entry;
pub mod size;
pub mod tree;

pub use entry::{Entry, EntryId};
pub use tree::{DirTree, EntryKind};
