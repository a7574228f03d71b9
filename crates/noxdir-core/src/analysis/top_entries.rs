//! Top-N heaps — bounded min-heaps retaining the largest files and the
//! heaviest directories seen in a scan.
//!
//! Both are explicit objects populated by scanning a finished (or
//! mid-scan, aggregated) tree, so independent scans never share state.
//!
//! The directory heap ranks by *local* size — a directory's aggregate
//! minus what its subdirectories contribute — so directories dominated by
//! their own files rank above mere containers of big subtrees.

use crate::model::{DirTree, EntryId, EntryKind};
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::collections::VecDeque;

/// Default bound for both heaps.
pub const DEFAULT_TOP_LEN: usize = 15;

/// Bounded min-heap of the largest files.
pub struct TopFiles {
    heap: BinaryHeap<Reverse<(i64, EntryId)>>,
    cap: usize,
}

impl Default for TopFiles {
    fn default() -> Self {
        Self::new(DEFAULT_TOP_LEN)
    }
}

impl TopFiles {
    pub fn new(cap: usize) -> Self {
        Self {
            heap: BinaryHeap::with_capacity(cap + 1),
            cap,
        }
    }

    /// Record one file; the smallest falls out once over capacity.
    pub fn push(&mut self, size: i64, id: EntryId) {
        if self.cap == 0 {
            return;
        }
        self.heap.push(Reverse((size, id)));
        if self.heap.len() > self.cap {
            self.heap.pop();
        }
    }

    /// Walk the subtree under `root` and collect every file.
    pub fn scan(&mut self, tree: &DirTree, root: EntryId) {
        for id in tree.descendants(root) {
            let entry = tree.node(id);
            if !entry.is_dir {
                self.push(entry.size, id);
            }
        }
    }

    pub fn reset(&mut self) {
        self.heap.clear();
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Drain into a list sorted by size, largest first.
    pub fn into_sorted(self) -> Vec<(i64, EntryId)> {
        let mut entries: Vec<(i64, EntryId)> =
            self.heap.into_iter().map(|Reverse(pair)| pair).collect();
        entries.sort_unstable_by(|a, b| b.cmp(a));
        entries
    }
}

/// Bounded min-heap of directories ranked by local size.
pub struct TopDirs {
    heap: BinaryHeap<Reverse<(i64, EntryId)>>,
    cap: usize,
}

impl Default for TopDirs {
    fn default() -> Self {
        Self::new(DEFAULT_TOP_LEN)
    }
}

impl TopDirs {
    pub fn new(cap: usize) -> Self {
        Self {
            heap: BinaryHeap::with_capacity(cap + 1),
            cap,
        }
    }

    fn push(&mut self, local_size: i64, id: EntryId) {
        if self.cap == 0 {
            return;
        }
        self.heap.push(Reverse((local_size, id)));
        if self.heap.len() > self.cap {
            self.heap.pop();
        }
    }

    /// Walk the subtree under `root`, collecting directories whose own
    /// file contents dominate their size.
    ///
    /// For each directory the subtree walk computes how much of its
    /// aggregate comes from subdirectories; when that share drops below
    /// half, the directory itself is the space consumer — record it and
    /// stop descending. Otherwise the interesting weight is deeper, so
    /// recurse into the subdirectories instead. Requires an aggregated
    /// tree.
    pub fn scan(&mut self, tree: &DirTree, root: EntryId) {
        if !tree.node(root).is_dir {
            return;
        }

        let mut queue = VecDeque::from([root]);

        while let Some(id) = queue.pop_front() {
            let size = tree.node(id).size;

            let subdir_size: i64 = tree
                .entries(id, EntryKind::DirsOnly)
                .map(|child| tree.node(child).size)
                .sum();

            if subdir_size < size / 2 {
                self.push(size - subdir_size, id);
                continue;
            }

            queue.extend(tree.entries(id, EntryKind::DirsOnly));
        }
    }

    pub fn reset(&mut self) {
        self.heap.clear();
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Drain into a list sorted by local size, heaviest first.
    pub fn into_sorted(self) -> Vec<(i64, EntryId)> {
        let mut entries: Vec<(i64, EntryId)> =
            self.heap.into_iter().map(|Reverse(pair)| pair).collect();
        entries.sort_unstable_by(|a, b| b.cmp(a));
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Entry;
    use std::path::PathBuf;

    fn add_dir(tree: &mut DirTree, parent: EntryId, name: &str) -> EntryId {
        let id = tree.add_node(Entry::new_dir(name.into(), 0, None));
        tree.add_child(parent, id);
        id
    }

    fn add_file(tree: &mut DirTree, parent: EntryId, name: &str, size: i64) -> EntryId {
        let id = tree.add_node(Entry::new_file(name.into(), size, 0, None));
        tree.add_child(parent, id);
        id
    }

    #[test]
    fn top_files_keeps_largest_in_order() {
        let mut tree = DirTree::with_root(PathBuf::from("/t"), 0);
        let root = tree.root();
        add_file(&mut tree, root, "small", 100);
        let big = add_file(&mut tree, root, "big", 9_000);
        add_file(&mut tree, root, "mid", 500);
        tree.aggregate();

        let mut top = TopFiles::new(2);
        top.scan(&tree, root);
        let sorted = top.into_sorted();

        assert_eq!(sorted.len(), 2);
        assert_eq!(sorted[0], (9_000, big));
        assert_eq!(sorted[1].0, 500);
    }

    #[test]
    fn top_files_bounded_by_capacity() {
        let mut tree = DirTree::with_root(PathBuf::from("/t"), 0);
        let root = tree.root();
        for i in 0..40 {
            add_file(&mut tree, root, &format!("f{i}"), i);
        }
        tree.aggregate();

        let mut top = TopFiles::default();
        top.scan(&tree, root);

        assert_eq!(top.len(), DEFAULT_TOP_LEN);
        let sorted = top.into_sorted();
        assert_eq!(sorted[0].0, 39);
        assert_eq!(sorted.last().unwrap().0, 39 - DEFAULT_TOP_LEN as i64 + 1);
    }

    #[test]
    fn zero_capacity_heap_stays_empty() {
        let mut tree = DirTree::with_root(PathBuf::from("/t"), 0);
        let root = tree.root();
        add_file(&mut tree, root, "f", 10);
        tree.aggregate();

        let mut top = TopFiles::new(0);
        top.scan(&tree, root);
        assert!(top.is_empty());
    }

    #[test]
    fn top_dirs_prefers_file_heavy_directories() {
        let mut tree = DirTree::with_root(PathBuf::from("/t"), 0);
        let root = tree.root();

        // `container` holds all its weight in a subdirectory; `heavy`
        // holds its weight directly in files.
        let container = add_dir(&mut tree, root, "container");
        let nested = add_dir(&mut tree, container, "nested");
        add_file(&mut tree, nested, "deep.bin", 10_000);

        let heavy = add_dir(&mut tree, root, "heavy");
        add_file(&mut tree, heavy, "a.bin", 6_000);
        add_file(&mut tree, heavy, "b.bin", 5_000);

        tree.aggregate();

        let mut top = TopDirs::default();
        top.scan(&tree, root);
        let sorted = top.into_sorted();

        let ids: Vec<EntryId> = sorted.iter().map(|&(_, id)| id).collect();
        assert!(ids.contains(&heavy), "file-heavy dir must be recorded");
        assert!(ids.contains(&nested), "the walk descends through containers");
        assert!(
            !ids.contains(&container),
            "containers of heavy subtrees are pruned in favour of their children"
        );

        // `heavy` ranks by its local (file) contents.
        let heavy_entry = sorted.iter().find(|&&(_, id)| id == heavy).unwrap();
        assert_eq!(heavy_entry.0, 11_000);
    }

    #[test]
    fn top_dirs_reset_clears() {
        let mut tree = DirTree::with_root(PathBuf::from("/t"), 0);
        let root = tree.root();
        add_file(&mut tree, root, "f", 10);
        tree.aggregate();

        let mut top = TopDirs::default();
        top.scan(&tree, root);
        assert!(!top.is_empty());

        top.reset();
        assert!(top.is_empty());
    }
}
