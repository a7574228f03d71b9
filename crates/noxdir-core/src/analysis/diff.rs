//! Scan differencing — what appeared and what vanished between two scans
//! of the same root.
//!
//! Both trees must be fully scanned and aggregated. The walk descends
//! both trees simultaneously, matching children by name. A subtree that
//! exists on only one side is reported once, as its top entry; its
//! statistics cover the whole subtree.

use crate::model::{DirTree, EntryId};
use compact_str::CompactString;
use std::collections::HashMap;
use std::path::PathBuf;

/// One added or removed entry. A directory stands for its entire
/// subtree.
#[derive(Debug, Clone)]
pub struct DiffEntry {
    pub path: PathBuf,
    pub name: CompactString,
    pub is_dir: bool,
    pub size: i64,
}

/// Aggregate counts over one side of a diff.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiffStats {
    pub dirs: u64,
    pub files: u64,
    pub size: i64,
}

impl DiffStats {
    fn absorb(&mut self, tree: &DirTree, id: EntryId) {
        let entry = tree.node(id);
        if entry.is_dir {
            self.dirs += 1 + entry.total_dirs;
            self.files += entry.total_files;
        } else {
            self.files += 1;
        }
        self.size += entry.size;
    }
}

/// Result of comparing two same-rooted scans.
#[derive(Debug, Default)]
pub struct Diff {
    pub added: Vec<DiffEntry>,
    pub removed: Vec<DiffEntry>,
    pub added_stats: DiffStats,
    pub removed_stats: DiffStats,
}

impl Diff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

fn diff_entry(tree: &DirTree, id: EntryId) -> DiffEntry {
    let entry = tree.node(id);
    DiffEntry {
        path: tree.full_path(id),
        name: CompactString::new(entry.file_name()),
        is_dir: entry.is_dir,
        size: entry.size,
    }
}

/// Compare `old` and `new`, returning flat added/removed lists plus
/// per-list statistics.
pub fn diff(old: &DirTree, new: &DirTree) -> Diff {
    let mut result = Diff::default();
    let mut stack = vec![(old.root(), new.root())];

    while let Some((old_id, new_id)) = stack.pop() {
        let old_children: HashMap<&str, EntryId> = old
            .node(old_id)
            .children
            .iter()
            .map(|&child| (old.node(child).name.as_str(), child))
            .collect();

        let new_children: HashMap<&str, EntryId> = new
            .node(new_id)
            .children
            .iter()
            .map(|&child| (new.node(child).name.as_str(), child))
            .collect();

        for (&name, &new_child) in &new_children {
            match old_children.get(name) {
                None => {
                    // Entirely new subtree: report the top entry only.
                    result.added_stats.absorb(new, new_child);
                    result.added.push(diff_entry(new, new_child));
                }
                Some(&old_child) => {
                    let old_is_dir = old.node(old_child).is_dir;
                    let new_is_dir = new.node(new_child).is_dir;

                    if old_is_dir && new_is_dir {
                        stack.push((old_child, new_child));
                    } else if old_is_dir != new_is_dir {
                        // Same name, different kind: the old entry is
                        // gone and the new one appeared.
                        result.removed_stats.absorb(old, old_child);
                        result.removed.push(diff_entry(old, old_child));
                        result.added_stats.absorb(new, new_child);
                        result.added.push(diff_entry(new, new_child));
                    }
                }
            }
        }

        for (&name, &old_child) in &old_children {
            if !new_children.contains_key(name) {
                result.removed_stats.absorb(old, old_child);
                result.removed.push(diff_entry(old, old_child));
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Entry;

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

    fn tree(root: &str) -> DirTree {
        DirTree::with_root(PathBuf::from(root), 0)
    }

    #[test]
    fn identical_trees_have_empty_diff() {
        let mut t = tree("/t");
        let root = t.root();
        let sub = add_dir(&mut t, root, "sub");
        add_file(&mut t, sub, "a", 100);
        t.aggregate();

        let result = diff(&t, &t.clone());
        assert!(result.is_empty());
        assert_eq!(result.added_stats, DiffStats::default());
        assert_eq!(result.removed_stats, DiffStats::default());
    }

    #[test]
    fn added_and_removed_files() {
        let mut old = tree("/t");
        let old_root = old.root();
        add_file(&mut old, old_root, "a", 10);
        add_file(&mut old, old_root, "b", 20);
        old.aggregate();

        let mut new = tree("/t");
        let new_root = new.root();
        add_file(&mut new, new_root, "a", 10);
        add_file(&mut new, new_root, "c", 30);
        new.aggregate();

        let result = diff(&old, &new);

        assert_eq!(result.added.len(), 1);
        assert_eq!(result.added[0].name, "c");
        assert_eq!(result.removed.len(), 1);
        assert_eq!(result.removed[0].name, "b");

        assert_eq!(
            result.added_stats,
            DiffStats { dirs: 0, files: 1, size: 30 }
        );
        assert_eq!(
            result.removed_stats,
            DiffStats { dirs: 0, files: 1, size: 20 }
        );
    }

    #[test]
    fn added_directory_reported_once_with_subtree_stats() {
        let mut old = tree("/t");
        old.aggregate();

        let mut new = tree("/t");
        let new_root = new.root();
        let sub = add_dir(&mut new, new_root, "sub");
        let inner = add_dir(&mut new, sub, "inner");
        add_file(&mut new, inner, "deep", 500);
        add_file(&mut new, sub, "shallow", 100);
        new.aggregate();

        let result = diff(&old, &new);

        assert_eq!(result.added.len(), 1, "subtree collapses to its top entry");
        assert_eq!(result.added[0].name, "sub");
        assert!(result.added[0].is_dir);
        assert_eq!(
            result.added_stats,
            DiffStats { dirs: 2, files: 2, size: 600 }
        );
        assert!(result.removed.is_empty());
    }

    #[test]
    fn disjoint_trees_count_everything() {
        let mut old = tree("/t");
        let old_root = old.root();
        add_file(&mut old, old_root, "a", 1);
        add_file(&mut old, old_root, "b", 2);
        old.aggregate();

        let mut new = tree("/t");
        let new_root = new.root();
        add_file(&mut new, new_root, "c", 3);
        new.aggregate();

        let result = diff(&old, &new);
        assert_eq!(result.added.len() + result.removed.len(), 3);
    }

    #[test]
    fn kind_change_is_removed_plus_added() {
        let mut old = tree("/t");
        let old_root = old.root();
        add_file(&mut old, old_root, "x", 42);
        old.aggregate();

        let mut new = tree("/t");
        let new_root = new.root();
        let x = add_dir(&mut new, new_root, "x");
        add_file(&mut new, x, "inside", 7);
        new.aggregate();

        let result = diff(&old, &new);

        assert_eq!(result.removed.len(), 1);
        assert!(!result.removed[0].is_dir);
        assert_eq!(result.added.len(), 1);
        assert!(result.added[0].is_dir);
    }

    #[test]
    fn common_directories_recurse() {
        let mut old = tree("/t");
        let old_root = old.root();
        let old_sub = add_dir(&mut old, old_root, "sub");
        add_file(&mut old, old_sub, "stays", 5);
        add_file(&mut old, old_sub, "goes", 6);
        old.aggregate();

        let mut new = tree("/t");
        let new_root = new.root();
        let new_sub = add_dir(&mut new, new_root, "sub");
        add_file(&mut new, new_sub, "stays", 5);
        new.aggregate();

        let result = diff(&old, &new);

        assert!(result.added.is_empty());
        assert_eq!(result.removed.len(), 1);
        assert_eq!(result.removed[0].name, "goes");
        assert_eq!(result.removed[0].path, PathBuf::from("/t/sub/goes"));
    }
}
