//! A single node in the arena-allocated directory tree.
//!
//! Nodes live in a flat `Vec<Entry>` owned by [`crate::model::DirTree`].
//! Relationships use [`EntryId`] (a thin `u32` wrapper) rather than heap
//! pointers, which avoids parent/child reference cycles and makes sharing
//! the tree across scan workers trivial.

use compact_str::CompactString;

/// Lightweight index into the tree arena.
///
/// `u32` keeps nodes small — supports up to ~4 billion entries, more than
/// enough for any real filesystem.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(pub u32);

impl EntryId {
    /// Create an `EntryId` from a `usize`, panicking in debug builds if it
    /// exceeds `u32::MAX`.
    #[inline]
    pub fn new(index: usize) -> Self {
        debug_assert!(index <= u32::MAX as usize, "EntryId overflow");
        Self(index as u32)
    }

    /// Return the index as a `usize` for Vec indexing.
    #[inline]
    pub fn idx(self) -> usize {
        self.0 as usize
    }
}

/// A single file or directory in the scanned tree.
///
/// Only the last path component is stored; full paths are reconstructed
/// on demand by walking up via `parent`. For directories `size` holds the
/// aggregate of all descendant files once
/// [`crate::model::DirTree::aggregate`] has run; between mutations the
/// value is stale but converges on the next pass.
#[derive(Debug, Clone)]
pub struct Entry {
    /// File or directory name (not the full path). The root entry is the
    /// exception: its name holds the full root path.
    pub name: CompactString,

    /// Logical size in bytes. Files carry their own size; directories
    /// carry the aggregated descendant total.
    pub size: i64,

    /// Last-modified time, seconds since the Unix epoch.
    pub mtime: i64,

    /// `true` if this entry represents a directory.
    pub is_dir: bool,

    /// Parent entry. `None` for the root and for detached subtrees.
    pub parent: Option<EntryId>,

    /// Immediate children in insertion order. The order is mutable —
    /// [`crate::model::DirTree::sort_children_by_size`] rewrites it.
    pub children: Vec<EntryId>,

    /// Immediate child directory count.
    pub local_dirs: u64,

    /// Immediate child file count.
    pub local_files: u64,

    /// Recursive directory count, filled by the aggregation pass.
    pub total_dirs: u64,

    /// Recursive file count, filled by the aggregation pass.
    pub total_files: u64,
}

impl Entry {
    /// Create a directory entry.
    pub fn new_dir(name: CompactString, mtime: i64, parent: Option<EntryId>) -> Self {
        Self {
            name,
            size: 0,
            mtime,
            is_dir: true,
            parent,
            children: Vec::new(),
            local_dirs: 0,
            local_files: 0,
            total_dirs: 0,
            total_files: 0,
        }
    }

    /// Create a file entry with a known size.
    pub fn new_file(name: CompactString, size: i64, mtime: i64, parent: Option<EntryId>) -> Self {
        Self {
            name,
            size,
            mtime,
            is_dir: false,
            parent,
            children: Vec::new(),
            local_dirs: 0,
            local_files: 0,
            total_dirs: 0,
            total_files: 0,
        }
    }

    /// Last path component. For non-root entries this is the stored name;
    /// for the root (whose name holds the whole path) the final component
    /// is extracted.
    pub fn file_name(&self) -> &str {
        let trimmed = self.name.trim_end_matches(['/', '\\']);
        match trimmed.rfind(['/', '\\']) {
            Some(idx) => &trimmed[idx + 1..],
            None => trimmed,
        }
    }

    /// Lowercased extension after the final `.`, or an empty string.
    /// Dotfiles such as `.gitignore` have no extension.
    pub fn ext(&self) -> CompactString {
        let name = self.file_name();
        match name.rfind('.') {
            Some(idx) if idx > 0 && idx + 1 < name.len() => {
                name[idx + 1..].to_lowercase().into()
            }
            _ => CompactString::default(),
        }
    }

    /// Whether the entry has at least one child.
    pub fn has_child(&self) -> bool {
        !self.children.is_empty()
    }
}
