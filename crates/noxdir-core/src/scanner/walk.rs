//! Traversal internals shared by the synchronous and worker-pool modes.
//!
//! # Completion and back-pressure
//!
//! The directory channel is unbounded, so a worker that discovers new
//! directories never blocks while holding progress. Completion is
//! detected with an outstanding-directory counter: incremented before a
//! directory is enqueued, decremented once it has been handled. The
//! worker that drops the counter to zero broadcasts one shutdown
//! sentinel per worker, so the pool drains deterministically instead of
//! relying on idle timers.
//!
//! # Tree writes
//!
//! A directory's children are inserted under a single write-lock
//! acquisition. Within a directory, insertion order follows what
//! `read_dir` returned; across directories no order is guaranteed.

use crate::arena::ByteArena;
use crate::error::ScanError;
use crate::filter::FileInfoFilter;
use crate::model::{DirTree, Entry, EntryId};
use crate::platform::{self, FileInfo};
use crate::scanner::inode::InodeFilter;
use crate::scanner::progress::ScanProgress;
use crate::scanner::{LiveTree, ScanOptions};
use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Initial capacity of each worker's name-staging arena.
const WORKER_ARENA_CAPACITY: usize = 64 * 1024;

/// State shared by every worker of one concurrent scan.
#[derive(Clone)]
pub(crate) struct WalkShared {
    inner: Arc<WalkInner>,
}

struct WalkInner {
    tree: LiveTree,
    queue_tx: Sender<Option<EntryId>>,
    queue_rx: Receiver<Option<EntryId>>,
    outstanding: AtomicUsize,
    cancel: Arc<AtomicBool>,
    inodes: InodeFilter,
    exclude: Vec<String>,
    filters: Vec<Arc<dyn FileInfoFilter>>,
    progress_tx: Sender<ScanProgress>,
    files_found: AtomicU64,
    dirs_found: AtomicU64,
    total_size: AtomicI64,
    error_count: AtomicU64,
    current_path: Mutex<String>,
    workers: usize,
}

impl WalkShared {
    pub(crate) fn new(
        options: &ScanOptions,
        tree: LiveTree,
        progress_tx: Sender<ScanProgress>,
        cancel: Arc<AtomicBool>,
    ) -> Self {
        let (queue_tx, queue_rx) = crossbeam_channel::unbounded();

        Self {
            inner: Arc::new(WalkInner {
                tree,
                queue_tx,
                queue_rx,
                outstanding: AtomicUsize::new(0),
                cancel,
                inodes: InodeFilter::new(),
                exclude: options.exclude.clone(),
                filters: options.file_filters.clone(),
                progress_tx,
                files_found: AtomicU64::new(0),
                dirs_found: AtomicU64::new(1), // the root
                total_size: AtomicI64::new(0),
                error_count: AtomicU64::new(0),
                current_path: Mutex::new(String::new()),
                workers: options.worker_count(),
            }),
        }
    }

    /// Enqueue the root directory. Must run after the workers exist so
    /// the shutdown broadcast has its full audience, and exactly once.
    pub(crate) fn seed(&self) {
        self.inner.inodes.reset();
        let root = self.inner.tree.read().root();
        self.inner.outstanding.store(1, Ordering::SeqCst);
        let _ = self.inner.queue_tx.send(Some(root));
    }

    /// Current counters as a progress message. Dropped on the floor when
    /// the channel is full — a stale periodic update has no value.
    pub(crate) fn snapshot(&self) -> ScanProgress {
        ScanProgress::Update {
            files_found: self.inner.files_found.load(Ordering::Relaxed),
            dirs_found: self.inner.dirs_found.load(Ordering::Relaxed),
            total_size: self.inner.total_size.load(Ordering::Relaxed),
            current_path: self.inner.current_path.lock().clone(),
        }
    }

    pub(crate) fn error_count(&self) -> u64 {
        self.inner.error_count.load(Ordering::Relaxed)
    }
}

/// Worker loop: pop a directory, handle it, account for it. A `None`
/// sentinel ends the loop.
pub(crate) fn worker(shared: WalkShared) {
    let inner = &*shared.inner;
    let mut arena = ByteArena::new(WORKER_ARENA_CAPACITY, true);

    while let Ok(message) = inner.queue_rx.recv() {
        let Some(id) = message else {
            break;
        };

        if !inner.cancel.load(Ordering::Relaxed) {
            process_dir(inner, &mut arena, id);
        }

        finish_dir(inner);
    }
}

/// Enumerate one directory and insert its children under a single write
/// lock. Newly discovered directories are re-enqueued.
fn process_dir(inner: &WalkInner, arena: &mut ByteArena, id: EntryId) {
    let path = inner.tree.read().full_path(id);

    if path_excluded(&path, &inner.exclude) {
        return;
    }

    let infos = match platform::read_dir(arena, &path, &inner.inodes) {
        Ok(infos) => infos,
        Err(err) => {
            inner.error_count.fetch_add(1, Ordering::Relaxed);
            debug!(path = %path.display(), %err, "directory skipped");
            let _ = inner.progress_tx.send(ScanProgress::Error {
                path: path.to_string_lossy().into_owned(),
                message: err.to_string(),
            });
            return;
        }
    };

    let mut new_dirs = Vec::new();
    {
        let mut tree = inner.tree.write();

        for info in infos {
            if !accepts(&inner.filters, &info) {
                continue;
            }

            if info.is_dir {
                let child = tree.add_node(Entry::new_dir(info.name, info.mtime, None));
                tree.add_child(id, child);
                new_dirs.push(child);
                inner.dirs_found.fetch_add(1, Ordering::Relaxed);
            } else {
                let child =
                    tree.add_node(Entry::new_file(info.name, info.size, info.mtime, None));
                tree.add_child(id, child);
                inner.files_found.fetch_add(1, Ordering::Relaxed);
                inner.total_size.fetch_add(info.size, Ordering::Relaxed);
            }
        }
    }

    // Account for the children before this directory completes, so the
    // counter can never dip to zero while work is still reachable.
    if !new_dirs.is_empty() {
        inner.outstanding.fetch_add(new_dirs.len(), Ordering::SeqCst);
        for dir in new_dirs {
            let _ = inner.queue_tx.send(Some(dir));
        }
    }

    *inner.current_path.lock() = path.to_string_lossy().into_owned();
}

/// Mark one directory as handled; the last one wakes the whole pool for
/// shutdown.
fn finish_dir(inner: &WalkInner) {
    if inner.outstanding.fetch_sub(1, Ordering::SeqCst) == 1 {
        for _ in 0..inner.workers {
            let _ = inner.queue_tx.send(None);
        }
    }
}

/// Synchronous BFS building a fresh tree on the calling thread.
pub(crate) fn walk_sync(
    options: &ScanOptions,
    inodes: &InodeFilter,
) -> (DirTree, Vec<ScanError>) {
    let mut tree = DirTree::with_root(options.root.clone(), 0);
    let mut errors = Vec::new();
    let mut arena = ByteArena::new(WORKER_ARENA_CAPACITY, true);

    inodes.reset();

    let mut queue = VecDeque::from([tree.root()]);

    while let Some(id) = queue.pop_front() {
        let path = tree.full_path(id);

        if path_excluded(&path, &options.exclude) {
            continue;
        }

        let infos = match platform::read_dir(&mut arena, &path, inodes) {
            Ok(infos) => infos,
            Err(err) => {
                errors.push(err);
                continue;
            }
        };

        for info in infos {
            if !accepts(&options.file_filters, &info) {
                continue;
            }

            if info.is_dir {
                let child = tree.add_node(Entry::new_dir(info.name, info.mtime, None));
                tree.add_child(id, child);
                queue.push_back(child);
            } else {
                let child =
                    tree.add_node(Entry::new_file(info.name, info.size, info.mtime, None));
                tree.add_child(id, child);
            }
        }
    }

    (tree, errors)
}

fn accepts(filters: &[Arc<dyn FileInfoFilter>], info: &FileInfo) -> bool {
    filters.iter().all(|f| f.applies(info))
}

/// Case-insensitive substring exclusion against the full path.
fn path_excluded(path: &Path, exclude: &[String]) -> bool {
    if exclude.is_empty() {
        return false;
    }

    let lowered = path.to_string_lossy().to_lowercase();
    exclude.iter().any(|needle| lowered.contains(needle))
}
