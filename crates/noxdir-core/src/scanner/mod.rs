//! Traversal engine — synchronous and worker-pool BFS over the platform
//! adapter.
//!
//! Both modes drive [`crate::platform::read_dir`], apply the traversal
//! filter chain, stamp entries through the per-scan [`InodeFilter`], and
//! build the shared [`DirTree`]. The concurrent mode feeds a pool of
//! `2 × logical CPUs` workers from an unbounded directory channel; an
//! outstanding-directory counter detects completion deterministically and
//! a cancellation flag stops the pool early.

pub mod inode;
pub mod progress;
mod walk;

use crate::cache::Cache;
use crate::error::ScanError;
use crate::filter::FileInfoFilter;
use crate::model::DirTree;
use inode::InodeFilter;
use progress::ScanProgress;

use crossbeam_channel::Receiver;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Maximum number of progress messages that may queue up in the channel.
///
/// Consumers drain it on their own cadence; this headroom lets a scan
/// burst ahead for a while before back-pressure makes `send` block, and
/// bounds heap usage if the consumer falls behind.
pub const PROGRESS_CHANNEL_CAPACITY: usize = 4_096;

/// Interval between progress snapshots emitted by the supervisor.
const PROGRESS_TICK: Duration = Duration::from_millis(500);

/// How often the supervisor polls the pool for completion. Much shorter
/// than [`PROGRESS_TICK`] so small scans finish promptly.
const JOIN_POLL: Duration = Duration::from_millis(25);

/// A shared, concurrently readable tree with a single-owner aggregation
/// gate.
///
/// Workers hold the write lock briefly while inserting directory
/// batches; consumers hold the read lock to render. The gate serialises
/// [`calculate_size`](Self::calculate_size) so overlapping callers do not
/// stack redundant full passes.
#[derive(Clone)]
pub struct LiveTree {
    tree: Arc<RwLock<DirTree>>,
    aggregating: Arc<AtomicBool>,
}

impl LiveTree {
    pub fn new(tree: DirTree) -> Self {
        Self {
            tree: Arc::new(RwLock::new(tree)),
            aggregating: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn read(&self) -> RwLockReadGuard<'_, DirTree> {
        self.tree.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, DirTree> {
        self.tree.write()
    }

    /// Run a full aggregation pass unless one is already in flight.
    ///
    /// Returns `false` when another caller holds the gate. Safe to invoke
    /// repeatedly, including mid-scan: the caller observes a partial but
    /// internally consistent snapshot that converges on the next pass.
    pub fn calculate_size(&self) -> bool {
        if self
            .aggregating
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        self.tree.write().aggregate();
        self.aggregating.store(false, Ordering::Release);
        true
    }
}

/// Everything a single scan needs, passed in explicitly so concurrent
/// scans (and tests) stay isolated.
#[derive(Clone)]
pub struct ScanOptions {
    pub root: PathBuf,
    /// Lowercased, case-insensitive path substrings to skip entirely.
    pub exclude: Vec<String>,
    /// Traversal filter chain applied to every discovered entry.
    pub file_filters: Vec<Arc<dyn FileInfoFilter>>,
    pub cache: Option<Arc<Cache>>,
    /// Root supplied by the user rather than a drive root; read from the
    /// cache but never persisted.
    pub partial_root: bool,
    /// Bypass the cache for this scan (refresh).
    pub skip_cache: bool,
    /// Worker count override; defaults to `2 × logical CPUs`.
    pub workers: Option<usize>,
}

impl ScanOptions {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            exclude: Vec::new(),
            file_filters: Vec::new(),
            cache: None,
            partial_root: false,
            skip_cache: false,
            workers: None,
        }
    }

    /// Set path exclusion substrings; matching is case-insensitive, so
    /// the values are normalised here once.
    pub fn with_exclude(mut self, exclude: impl IntoIterator<Item = String>) -> Self {
        self.exclude = exclude
            .into_iter()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();
        self
    }

    pub fn with_file_filters(mut self, filters: Vec<Arc<dyn FileInfoFilter>>) -> Self {
        self.file_filters = filters;
        self
    }

    pub fn with_cache(mut self, cache: Arc<Cache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn partial_root(mut self, partial: bool) -> Self {
        self.partial_root = partial;
        self
    }

    pub fn skip_cache(mut self, skip: bool) -> Self {
        self.skip_cache = skip;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    /// Clone the options for a second scan of a different (or the same)
    /// root: shared settings, fresh root. Used by the diff flow, which
    /// re-scans the current path into an independent tree.
    pub fn clone_for_root(&self, root: PathBuf) -> Self {
        let mut opts = self.clone();
        opts.root = root;
        opts
    }

    fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(|| num_cpus::get() * 2).max(1)
    }
}

/// Handle to a running or completed scan: progress receiver, shared live
/// tree, and cancellation.
pub struct ScanHandle {
    /// Receiver for progress updates from the scan workers.
    pub progress_rx: Receiver<ScanProgress>,
    /// Shared tree, populated incrementally while the scan runs.
    pub live_tree: LiveTree,
    cancel_flag: Arc<AtomicBool>,
    options: ScanOptions,
    _thread: Option<thread::JoinHandle<()>>,
}

impl ScanHandle {
    /// Request the scan to stop as soon as possible. Workers drain the
    /// pending directory queue without processing it and exit.
    pub fn cancel(&self) {
        self.cancel_flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_flag.load(Ordering::Relaxed)
    }

    /// Whether this scan's root was user-supplied rather than a drive
    /// root. Partial trees are never written to the persistent cache.
    pub fn is_partial(&self) -> bool {
        self.options.partial_root
    }

    /// Gated aggregation pass over the live tree; see
    /// [`LiveTree::calculate_size`].
    pub fn calculate_size(&self) -> bool {
        self.live_tree.calculate_size()
    }

    /// Write the completed tree to the persistent cache.
    ///
    /// No-op without a cache and for partial-root scans.
    pub fn persist_cache(&self) -> crate::Result<()> {
        let Some(cache) = &self.options.cache else {
            return Ok(());
        };
        if self.options.partial_root {
            return Ok(());
        }

        cache.set(&self.options.root, &self.live_tree.read())?;
        Ok(())
    }
}

/// Scan `options.root` on the calling thread with a plain BFS queue.
///
/// Returns the aggregated tree plus the per-directory errors collected
/// along the way. The cache is consulted exactly like in the concurrent
/// mode.
pub fn scan_sync(options: &ScanOptions) -> (DirTree, Vec<ScanError>) {
    let inodes = InodeFilter::new();

    if let Some(tree) = try_cache_load(options) {
        return (tree, Vec::new());
    }

    let (mut tree, errors) = walk::walk_sync(options, &inodes);
    tree.aggregate();
    (tree, errors)
}

/// Start a concurrent scan of `options.root` on a background worker pool.
pub fn start_scan(options: ScanOptions) -> ScanHandle {
    let (progress_tx, progress_rx) =
        crossbeam_channel::bounded::<ScanProgress>(PROGRESS_CHANNEL_CAPACITY);
    let cancel_flag = Arc::new(AtomicBool::new(false));

    let root_mtime = root_mtime(&options.root);
    let live_tree = LiveTree::new(DirTree::with_root_and_capacity(
        options.root.clone(),
        root_mtime,
        4_096,
    ));

    let supervisor_options = options.clone();
    let supervisor_tree = live_tree.clone();
    let supervisor_cancel = cancel_flag.clone();

    let thread = thread::Builder::new()
        .name("noxdir-scan".into())
        .spawn(move || {
            let start = Instant::now();
            info!(root = %supervisor_options.root.display(), "starting scan");

            if let Some(tree) = try_cache_load(&supervisor_options) {
                info!(root = %supervisor_options.root.display(), "cache hit");
                *supervisor_tree.write() = tree;
                let _ = progress_tx.send(ScanProgress::Complete {
                    duration: start.elapsed(),
                    error_count: 0,
                });
                return;
            }

            let shared = walk::WalkShared::new(
                &supervisor_options,
                supervisor_tree.clone(),
                progress_tx.clone(),
                supervisor_cancel.clone(),
            );

            let workers: Vec<_> = (0..supervisor_options.worker_count())
                .map(|i| {
                    let shared = shared.clone();
                    thread::Builder::new()
                        .name(format!("noxdir-scan-{i}"))
                        .spawn(move || walk::worker(shared))
                        .expect("failed to spawn scan worker")
                })
                .collect();

            shared.seed();

            // Tick progress until the pool drains, then join. Snapshots
            // are droppable: a full channel just loses a stale update.
            let mut last_tick = Instant::now();
            while !workers.iter().all(|w| w.is_finished()) {
                thread::sleep(JOIN_POLL);
                if last_tick.elapsed() >= PROGRESS_TICK {
                    last_tick = Instant::now();
                    supervisor_tree.calculate_size();
                    let _ = progress_tx.try_send(shared.snapshot());
                }
            }
            for worker in workers {
                let _ = worker.join();
            }

            // Final full pass over the finished tree.
            supervisor_tree.write().aggregate();

            let duration = start.elapsed();
            let error_count = shared.error_count();
            debug!(?duration, error_count, "scan finished");

            if supervisor_cancel.load(Ordering::Relaxed) {
                let _ = progress_tx.send(ScanProgress::Cancelled);
            } else {
                let _ = progress_tx.send(ScanProgress::Complete {
                    duration,
                    error_count,
                });
            }
        })
        .expect("failed to spawn scan supervisor");

    ScanHandle {
        progress_rx,
        live_tree,
        cancel_flag,
        options,
        _thread: Some(thread),
    }
}

/// Load the cached tree for `options.root` when the cache is configured,
/// not bypassed, and holds a matching record. Every failure is a miss.
fn try_cache_load(options: &ScanOptions) -> Option<DirTree> {
    if options.skip_cache {
        return None;
    }
    let cache = options.cache.as_deref()?;
    if !cache.has(&options.root) {
        return None;
    }

    let mut tree = DirTree::with_root(options.root.clone(), root_mtime(&options.root));
    match cache.get(&options.root, &mut tree) {
        Ok(()) => {
            tree.aggregate();
            Some(tree)
        }
        Err(err) => {
            debug!(root = %options.root.display(), %err, "cache read failed, rescanning");
            None
        }
    }
}

fn root_mtime(root: &std::path::Path) -> i64 {
    std::fs::metadata(root)
        .ok()
        .and_then(|m| m.modified().ok())
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
