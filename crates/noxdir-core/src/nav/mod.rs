//! Navigation state — cursor and breadcrumb over the volume list and the
//! scanned tree, driving user-level commands.
//!
//! ```text
//! Drives --select drive--> Dirs (root = drive path, traversal starts)
//! Dirs   --back at root--> Drives
//! Dirs   --enter child---> Dirs (current moves to the child)
//! Dirs   --delete entry--> Dirs (remove child, recompute ancestors)
//! ```
//!
//! A busy gate serialises traversal-starting transitions: frontends call
//! [`Navigation::lock`] before `enter_drive`/`refresh` and release it
//! when the scan's terminal progress message arrives.

use crate::error::ScanError;
use crate::model::EntryId;
use crate::platform::{self, VolumeList};
use crate::scanner::{start_scan, LiveTree, ScanHandle, ScanOptions};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;

/// Which table the frontend is looking at.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViewState {
    Drives,
    Dirs,
}

/// Navigation over volumes and the current scan.
pub struct Navigation {
    volumes: VolumeList,
    base: ScanOptions,
    state: ViewState,
    scan: Option<ScanHandle>,
    current: Option<EntryId>,
    cursor: usize,
    busy: AtomicBool,
}

impl Navigation {
    /// Start at the drives list. `base` carries the scan settings
    /// (exclusions, filters, cache) applied to every drive scan; its
    /// root is replaced per selection.
    pub fn new(volumes: VolumeList, base: ScanOptions) -> Self {
        Self {
            volumes,
            base,
            state: ViewState::Drives,
            scan: None,
            current: None,
            cursor: 0,
            busy: AtomicBool::new(false),
        }
    }

    /// Start directly inside a user-supplied root directory. The scan
    /// begins immediately and is flagged partial, so it is never written
    /// to the persistent cache.
    pub fn with_root(volumes: VolumeList, base: ScanOptions, root: PathBuf) -> Self {
        let mut nav = Self::new(volumes, base);

        let options = nav.base.clone_for_root(root).partial_root(true);
        let handle = start_scan(options);

        nav.current = Some(handle.live_tree.read().root());
        nav.scan = Some(handle);
        nav.state = ViewState::Dirs;
        nav
    }

    pub fn state(&self) -> ViewState {
        self.state
    }

    pub fn volumes(&self) -> &VolumeList {
        &self.volumes
    }

    pub fn live_tree(&self) -> Option<&LiveTree> {
        self.scan.as_ref().map(|s| &s.live_tree)
    }

    pub fn scan(&self) -> Option<&ScanHandle> {
        self.scan.as_ref()
    }

    /// Current entry within the tree, `None` on the drives view.
    pub fn current(&self) -> Option<EntryId> {
        self.current
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn set_cursor(&mut self, cursor: usize) {
        self.cursor = cursor;
    }

    /// Try to take the busy gate. Returns `false` while another
    /// traversal-starting command is in flight.
    pub fn lock(&self) -> bool {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn unlock(&self) {
        self.busy.store(false, Ordering::Release);
    }

    /// Select a drive and start scanning it. Returns the running scan
    /// handle; the previous scan (if any) is dropped.
    pub fn enter_drive(&mut self, path: &Path) -> &ScanHandle {
        info!(drive = %path.display(), "entering drive");

        let options = self.base.clone_for_root(path.to_path_buf());
        let handle = start_scan(options);

        self.current = Some(handle.live_tree.read().root());
        self.scan = Some(handle);
        self.state = ViewState::Dirs;
        self.cursor = 0;

        self.scan.as_ref().expect("scan just started")
    }

    /// Re-scan the current root, bypassing the cache.
    pub fn refresh(&mut self) -> Option<&ScanHandle> {
        let root = self.scan.as_ref()?.live_tree.read().root_path().clone();

        let partial = self.scan.as_ref()?.is_partial();
        let options = self
            .base
            .clone_for_root(root)
            .partial_root(partial)
            .skip_cache(true);
        let handle = start_scan(options);

        self.current = Some(handle.live_tree.read().root());
        self.scan = Some(handle);
        self.cursor = 0;

        self.scan.as_ref()
    }

    /// Move into a child directory. Files and foreign ids are ignored.
    pub fn enter_child(&mut self, id: EntryId) -> bool {
        let Some(scan) = &self.scan else {
            return false;
        };

        if !scan.live_tree.read().node(id).is_dir {
            return false;
        }

        self.current = Some(id);
        self.cursor = 0;
        true
    }

    /// Move to the parent entry; at the tree root, fall back to the
    /// drives view.
    pub fn level_up(&mut self) -> ViewState {
        let parent = self
            .scan
            .as_ref()
            .zip(self.current)
            .and_then(|(scan, id)| scan.live_tree.read().node(id).parent);

        match parent {
            Some(parent) => {
                self.current = Some(parent);
                self.cursor = 0;
            }
            None => {
                self.state = ViewState::Drives;
                self.current = None;
                self.cursor = 0;
            }
        }

        self.state
    }

    /// Delete an entry from the filesystem, detach its subtree, and
    /// recompute the ancestor aggregates.
    pub fn delete_entry(&mut self, id: EntryId) -> Result<(), ScanError> {
        let Some(scan) = &self.scan else {
            return Ok(());
        };

        let (path, is_dir) = {
            let tree = scan.live_tree.read();
            (tree.full_path(id), tree.node(id).is_dir)
        };

        info!(path = %path.display(), is_dir, "deleting entry");

        let removal = if is_dir {
            std::fs::remove_dir_all(&path)
        } else {
            std::fs::remove_file(&path)
        };
        removal.map_err(|source| ScanError::Delete {
            path: path.clone(),
            source,
        })?;

        scan.live_tree.write().detach(id);
        scan.live_tree.calculate_size();

        // Deleting the entry the cursor points at is common; clamp.
        if self.current == Some(id) {
            self.level_up();
        }

        Ok(())
    }

    /// Start an independent scan of the current root for diffing against
    /// the live tree. The clone bypasses the cache — the point is a
    /// fresh snapshot.
    pub fn start_diff(&self) -> Option<ScanHandle> {
        let root = self.scan.as_ref()?.live_tree.read().root_path().clone();
        Some(start_scan(self.base.clone_for_root(root).skip_cache(true)))
    }

    /// Open the given path in the OS file explorer.
    pub fn explore(&self, path: &Path) -> std::io::Result<()> {
        platform::open_external(path)
    }

    /// Persist the completed scan to the cache; no-op for partial roots
    /// and cache-less sessions.
    pub fn persist_cache(&self) -> crate::Result<()> {
        match &self.scan {
            Some(scan) => scan.persist_cache(),
            None => Ok(()),
        }
    }
}
