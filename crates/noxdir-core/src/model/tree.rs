//! Arena-backed directory tree with O(n) bottom-up aggregation.
//!
//! All entries live in a single `Vec<Entry>`; the scan inserts parents
//! before their children, so a single reverse pass over the arena visits
//! every child before its parent. Aggregation therefore needs no
//! recursion and no stack, and is idempotent — directory totals are reset
//! at the start of each pass.

use crate::model::entry::{Entry, EntryId};
use compact_str::CompactString;
use std::collections::VecDeque;
use std::path::{PathBuf, MAIN_SEPARATOR};

/// Immediate-children selection for [`DirTree::entries`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryKind {
    All,
    DirsOnly,
    FilesOnly,
}

/// The complete tree produced by one scan, rooted at a drive root or a
/// user-supplied directory.
#[derive(Debug, Clone)]
pub struct DirTree {
    nodes: Vec<Entry>,
    root: EntryId,
    root_path: PathBuf,
}

impl DirTree {
    /// Create a tree containing only the root directory entry.
    pub fn with_root(root_path: PathBuf, mtime: i64) -> Self {
        let name = CompactString::new(root_path.to_string_lossy());
        Self {
            nodes: vec![Entry::new_dir(name, mtime, None)],
            root: EntryId::new(0),
            root_path,
        }
    }

    /// Like [`with_root`](Self::with_root), pre-allocating arena capacity
    /// for an expected entry count.
    pub fn with_root_and_capacity(root_path: PathBuf, mtime: i64, capacity: usize) -> Self {
        let mut tree = Self::with_root(root_path, mtime);
        tree.nodes.reserve(capacity.saturating_sub(1));
        tree
    }

    pub fn root(&self) -> EntryId {
        self.root
    }

    pub fn root_path(&self) -> &PathBuf {
        &self.root_path
    }

    /// Append a node to the arena and return its id. The node is not yet
    /// reachable — pair with [`add_child`](Self::add_child).
    pub fn add_node(&mut self, entry: Entry) -> EntryId {
        let id = EntryId::new(self.nodes.len());
        self.nodes.push(entry);
        id
    }

    /// Attach `child` under `parent`, appending to the sibling list and
    /// setting the back reference. Children must be allocated after their
    /// parent so the reverse aggregation pass stays valid.
    pub fn add_child(&mut self, parent: EntryId, child: EntryId) {
        debug_assert!(child > parent, "children must be arena-allocated after parents");

        self.nodes[child.idx()].parent = Some(parent);

        let parent_node = &mut self.nodes[parent.idx()];
        parent_node.children.push(child);

        if self.nodes[child.idx()].is_dir {
            self.nodes[parent.idx()].local_dirs += 1;
        } else {
            self.nodes[parent.idx()].local_files += 1;
        }
    }

    /// Detach `id` from its parent. The subtree stays in the arena but is
    /// no longer reachable from the root; a following aggregation pass
    /// removes its contribution from the ancestor chain.
    pub fn detach(&mut self, id: EntryId) {
        let Some(parent) = self.nodes[id.idx()].parent.take() else {
            return;
        };

        let is_dir = self.nodes[id.idx()].is_dir;
        let parent_node = &mut self.nodes[parent.idx()];
        parent_node.children.retain(|&c| c != id);

        if is_dir {
            parent_node.local_dirs = parent_node.local_dirs.saturating_sub(1);
        } else {
            parent_node.local_files = parent_node.local_files.saturating_sub(1);
        }
    }

    #[inline]
    pub fn node(&self, id: EntryId) -> &Entry {
        &self.nodes[id.idx()]
    }

    #[inline]
    pub fn node_mut(&mut self, id: EntryId) -> &mut Entry {
        &mut self.nodes[id.idx()]
    }

    /// Total number of arena slots, including detached subtrees.
    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Immediate children of `id`, optionally restricted to one kind.
    pub fn entries(&self, id: EntryId, kind: EntryKind) -> impl Iterator<Item = EntryId> + '_ {
        self.nodes[id.idx()].children.iter().copied().filter(
            move |&child| match kind {
                EntryKind::All => true,
                EntryKind::DirsOnly => self.nodes[child.idx()].is_dir,
                EntryKind::FilesOnly => !self.nodes[child.idx()].is_dir,
            },
        )
    }

    /// Breadth-first walk over the subtree rooted at `id`, excluding
    /// detached entries (they are unreachable from any live node).
    pub fn descendants(&self, id: EntryId) -> Descendants<'_> {
        Descendants {
            tree: self,
            queue: VecDeque::from([id]),
        }
    }

    /// Rewrite the child order of `id` by size, descending, directories
    /// and files interleaved.
    pub fn sort_children_by_size(&mut self, id: EntryId) {
        let mut children = std::mem::take(&mut self.nodes[id.idx()].children);
        children.sort_unstable_by(|a, b| {
            self.nodes[b.idx()].size.cmp(&self.nodes[a.idx()].size)
        });
        self.nodes[id.idx()].children = children;
    }

    /// Reconstruct the full path of an entry by walking up to the root.
    pub fn full_path(&self, id: EntryId) -> PathBuf {
        let mut segments = Vec::new();
        let mut current = Some(id);

        while let Some(idx) = current {
            segments.push(self.nodes[idx.idx()].name.as_str());
            current = self.nodes[idx.idx()].parent;
        }

        let mut path = String::with_capacity(
            segments.iter().map(|s| s.len() + 1).sum::<usize>(),
        );

        for (i, segment) in segments.iter().rev().enumerate() {
            if i > 0 && !path.ends_with(MAIN_SEPARATOR) {
                path.push(MAIN_SEPARATOR);
            }
            path.push_str(segment);
        }

        PathBuf::from(path)
    }

    /// Recompute `size`, `total_dirs`, and `total_files` for every
    /// directory in a single bottom-up pass.
    ///
    /// Children are always arena-allocated after their parent, so a
    /// reverse iteration processes each child first. Totals are reset up
    /// front, which makes repeated calls — including mid-scan progress
    /// refreshes — converge instead of accumulating. Invoked while
    /// workers are still inserting, the caller observes a partial but
    /// internally consistent snapshot.
    pub fn aggregate(&mut self) {
        for node in self.nodes.iter_mut() {
            if node.is_dir {
                node.size = 0;
                node.total_dirs = 0;
                node.total_files = 0;
            }
        }

        for i in (0..self.nodes.len()).rev() {
            let Some(parent) = self.nodes[i].parent else {
                continue;
            };

            let (size, dirs, files) = {
                let node = &self.nodes[i];
                if node.is_dir {
                    (node.size, 1 + node.total_dirs, node.total_files)
                } else {
                    (node.size, 0, 1)
                }
            };

            let parent_node = &mut self.nodes[parent.idx()];
            parent_node.size += size;
            parent_node.total_dirs += dirs;
            parent_node.total_files += files;
        }
    }
}

/// Iterator state for [`DirTree::descendants`].
pub struct Descendants<'a> {
    tree: &'a DirTree,
    queue: VecDeque<EntryId>,
}

impl Iterator for Descendants<'_> {
    type Item = EntryId;

    fn next(&mut self) -> Option<EntryId> {
        let id = self.queue.pop_front()?;
        self.queue.extend(&self.tree.node(id).children);
        Some(id)
    }
}
