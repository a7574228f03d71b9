//! End-to-end engine tests against a real temporary filesystem.
//!
//! The traversal spawns real OS threads, reads real directories through
//! the platform adapter, and writes into a shared tree behind a lock.
//! Mocking the OS here would test nothing; `tempfile` trees exercise
//! every layer — worker pool, inode filter, aggregation, cache, diff —
//! with zero mocking.

use noxdir_core::analysis::{diff, TopDirs, TopFiles};
use noxdir_core::cache::Cache;
use noxdir_core::filter::{entry_passes, EmptyDirFilter, EntryFilter, SizeBand};
use noxdir_core::model::{DirTree, EntryId, EntryKind};
use noxdir_core::nav::{Navigation, ViewState};
use noxdir_core::platform::VolumeList;
use noxdir_core::scanner::progress::ScanProgress;
use noxdir_core::scanner::{scan_sync, start_scan, ScanHandle, ScanOptions};
use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;

// ── Helpers ──────────────────────────────────────────────────────────────────

fn write_bytes(path: &Path, n: usize) {
    let mut f = fs::File::create(path).unwrap();
    f.write_all(&vec![0u8; n]).unwrap();
}

/// Drain progress until the scan reports `Complete`, with a generous
/// deadline so a stuck pool fails the test instead of hanging the suite.
fn drain_to_completion(handle: &ScanHandle) -> u64 {
    let deadline = Instant::now() + Duration::from_secs(30);
    loop {
        assert!(
            Instant::now() < deadline,
            "scanner did not complete within 30 seconds"
        );
        match handle.progress_rx.try_recv() {
            Ok(ScanProgress::Complete { error_count, .. }) => return error_count,
            Ok(ScanProgress::Cancelled) => panic!("scan was unexpectedly cancelled"),
            Ok(_) => continue,
            Err(crossbeam_channel::TryRecvError::Empty) => {
                std::thread::sleep(Duration::from_millis(5));
            }
            Err(crossbeam_channel::TryRecvError::Disconnected) => {
                panic!("scanner channel disconnected before Complete was sent");
            }
        }
    }
}

fn root_of(tree: &DirTree) -> EntryId {
    tree.root()
}

// ── Scenarios ────────────────────────────────────────────────────────────────

/// Flat directory: two files of known sizes aggregate exactly.
#[test]
fn flat_directory_totals() {
    let tmp = TempDir::new().unwrap();
    write_bytes(&tmp.path().join("a"), 1024);
    write_bytes(&tmp.path().join("b"), 2048);

    let (tree, errors) = scan_sync(&ScanOptions::new(tmp.path().to_path_buf()));
    assert!(errors.is_empty());

    let root = root_of(&tree);
    assert_eq!(tree.node(root).size, 3072);
    assert_eq!(tree.node(root).total_files, 2);
    assert_eq!(tree.node(root).total_dirs, 0);
}

/// Nested tree: totals count every level; the empty-dirs render filter
/// hides the empty branch without touching the physical tree.
#[test]
fn nested_tree_with_empty_dirs_filter() {
    let tmp = TempDir::new().unwrap();
    let x = tmp.path().join("x");
    let y = x.join("y");
    fs::create_dir_all(&y).unwrap();
    fs::create_dir(tmp.path().join("empty")).unwrap();
    write_bytes(&y.join("z.bin"), 5 << 20);

    let (tree, _) = scan_sync(&ScanOptions::new(tmp.path().to_path_buf()));
    let root = root_of(&tree);

    assert_eq!(tree.node(root).size, 5 << 20);
    assert_eq!(tree.node(root).total_files, 1);
    assert_eq!(tree.node(root).total_dirs, 3, "x, y, and empty all exist");

    // Rendered view: `empty` is filtered, x survives.
    let filters: Vec<Box<dyn EntryFilter>> = vec![Box::new(EmptyDirFilter)];
    let rendered: Vec<&str> = tree
        .entries(root, EntryKind::All)
        .filter(|&id| entry_passes(&tree, id, &filters))
        .map(|id| tree.node(id).name.as_str())
        .collect();
    assert_eq!(rendered, vec!["x"]);

    // Dirs surviving the filter across the whole tree: x and y.
    let visible_dirs = tree
        .descendants(root)
        .skip(1)
        .filter(|&id| tree.node(id).is_dir && entry_passes(&tree, id, &filters))
        .count();
    assert_eq!(visible_dirs, 2);
}

/// Size band: files below the lower bound never enter the tree, and
/// directory sizes reflect only what was kept.
#[test]
fn size_band_excludes_small_files() {
    let tmp = TempDir::new().unwrap();
    let sub = tmp.path().join("sub");
    fs::create_dir(&sub).unwrap();
    write_bytes(&sub.join("z.bin"), 5 << 20);
    write_bytes(&sub.join("tiny"), 100 << 10);

    let band = SizeBand::parse("1MB:").unwrap();
    let options = ScanOptions::new(tmp.path().to_path_buf())
        .with_file_filters(vec![Arc::new(band)]);

    let (tree, _) = scan_sync(&options);
    let root = root_of(&tree);

    assert_eq!(tree.node(root).total_files, 1, "tiny is filtered out");
    assert_eq!(tree.node(root).size, 5 << 20, "dir size counts kept files only");
}

/// Cache round trip: persist a scan, reload it, observe identical
/// aggregates without re-reading the filesystem.
#[test]
fn cache_round_trip_restores_tree() {
    let tmp = TempDir::new().unwrap();
    let cache_dir = TempDir::new().unwrap();

    let sub = tmp.path().join("docs");
    fs::create_dir(&sub).unwrap();
    write_bytes(&sub.join("report.pdf"), 10_000);
    write_bytes(&tmp.path().join("top.txt"), 500);

    let cache = Arc::new(Cache::new(cache_dir.path().to_path_buf(), false, true).unwrap());
    let options = ScanOptions::new(tmp.path().to_path_buf()).with_cache(cache.clone());

    let handle = start_scan(options.clone());
    drain_to_completion(&handle);
    handle.persist_cache().unwrap();

    let (first_size, first_files, first_dirs) = {
        let tree = handle.live_tree.read();
        let root = tree.root();
        (
            tree.node(root).size,
            tree.node(root).total_files,
            tree.node(root).total_dirs,
        )
    };
    drop(handle);

    // Remove the filesystem content: a cache hit must not need it.
    fs::remove_dir_all(tmp.path().join("docs")).unwrap();
    fs::remove_file(tmp.path().join("top.txt")).unwrap();

    let handle = start_scan(options);
    drain_to_completion(&handle);

    let tree = handle.live_tree.read();
    let root = tree.root();
    assert_eq!(tree.node(root).size, first_size);
    assert_eq!(tree.node(root).total_files, first_files);
    assert_eq!(tree.node(root).total_dirs, first_dirs);
    assert_eq!(first_size, 10_500);
}

/// Partial-root scans read the cache but never write it.
#[test]
fn partial_root_is_not_persisted() {
    let tmp = TempDir::new().unwrap();
    let cache_dir = TempDir::new().unwrap();
    write_bytes(&tmp.path().join("f"), 100);

    let cache = Arc::new(Cache::new(cache_dir.path().to_path_buf(), false, true).unwrap());
    let options = ScanOptions::new(tmp.path().to_path_buf())
        .with_cache(cache.clone())
        .partial_root(true);

    let handle = start_scan(options);
    drain_to_completion(&handle);
    handle.persist_cache().unwrap();

    assert!(!cache.has(tmp.path()), "partial roots must not be cached");
}

/// Diff of two scans: added and removed entries with their stats.
#[test]
fn diff_between_two_scans() {
    let tmp = TempDir::new().unwrap();
    write_bytes(&tmp.path().join("a"), 10);
    write_bytes(&tmp.path().join("b"), 20);

    let (old_tree, _) = scan_sync(&ScanOptions::new(tmp.path().to_path_buf()));

    fs::remove_file(tmp.path().join("b")).unwrap();
    write_bytes(&tmp.path().join("c"), 30);

    let (new_tree, _) = scan_sync(&ScanOptions::new(tmp.path().to_path_buf()));

    let result = diff(&old_tree, &new_tree);

    assert_eq!(result.added.len(), 1);
    assert_eq!(result.added[0].name, "c");
    assert_eq!(result.added_stats.size, 30);
    assert_eq!(result.added_stats.files, 1);

    assert_eq!(result.removed.len(), 1);
    assert_eq!(result.removed[0].name, "b");
    assert_eq!(result.removed_stats.size, 20);
    assert_eq!(result.removed_stats.files, 1);
}

/// Diff of a tree against itself is empty.
#[test]
fn diff_is_reflexively_empty() {
    let tmp = TempDir::new().unwrap();
    write_bytes(&tmp.path().join("a"), 10);

    let (tree, _) = scan_sync(&ScanOptions::new(tmp.path().to_path_buf()));
    assert!(diff(&tree, &tree).is_empty());
}

/// A file reachable through two hardlinked paths is counted once.
#[cfg(unix)]
#[test]
fn hardlinks_count_once() {
    let tmp = TempDir::new().unwrap();
    let original = tmp.path().join("payload.bin");
    write_bytes(&original, 4096);
    fs::hard_link(&original, tmp.path().join("alias.bin")).unwrap();

    let (tree, _) = scan_sync(&ScanOptions::new(tmp.path().to_path_buf()));
    let root = root_of(&tree);

    assert_eq!(tree.node(root).total_files, 1);
    assert_eq!(tree.node(root).size, 4096);
}

/// The concurrent scanner reaches the same totals as the synchronous
/// one.
#[test]
fn concurrent_scan_matches_sync_scan() {
    let tmp = TempDir::new().unwrap();
    for d in 0..4 {
        let dir = tmp.path().join(format!("dir{d}"));
        fs::create_dir(&dir).unwrap();
        for f in 0..25 {
            write_bytes(&dir.join(format!("f{f}.bin")), 100 + f);
        }
    }

    let (sync_tree, _) = scan_sync(&ScanOptions::new(tmp.path().to_path_buf()));

    let handle = start_scan(ScanOptions::new(tmp.path().to_path_buf()));
    drain_to_completion(&handle);

    let tree = handle.live_tree.read();
    let sync_root = sync_tree.root();
    let root = tree.root();

    assert_eq!(tree.node(root).size, sync_tree.node(sync_root).size);
    assert_eq!(
        tree.node(root).total_files,
        sync_tree.node(sync_root).total_files
    );
    assert_eq!(
        tree.node(root).total_dirs,
        sync_tree.node(sync_root).total_dirs
    );
    assert_eq!(tree.node(root).total_files, 100);
}

/// Path exclusion prunes whole subtrees during traversal.
#[test]
fn exclusion_skips_subtrees() {
    let tmp = TempDir::new().unwrap();
    let keep = tmp.path().join("src");
    let skip = tmp.path().join("node_modules");
    fs::create_dir(&keep).unwrap();
    fs::create_dir(&skip).unwrap();
    write_bytes(&keep.join("main.rs"), 1000);
    write_bytes(&skip.join("dep.js"), 9_999);

    let options = ScanOptions::new(tmp.path().to_path_buf())
        .with_exclude(vec!["NODE_MODULES".to_string()]);
    let (tree, _) = scan_sync(&options);
    let root = root_of(&tree);

    // The excluded directory node exists but was never descended into.
    assert_eq!(tree.node(root).size, 1000);
    assert_eq!(tree.node(root).total_files, 1);
}

/// Cancellation produces a terminal message and stops the pool.
#[test]
fn cancellation_sends_terminal_message() {
    let tmp = TempDir::new().unwrap();
    for f in 0..50 {
        write_bytes(&tmp.path().join(format!("f{f}")), 64);
    }

    let handle = start_scan(ScanOptions::new(tmp.path().to_path_buf()));
    handle.cancel();

    let deadline = Instant::now() + Duration::from_secs(30);
    let mut terminal = false;
    while Instant::now() < deadline {
        match handle.progress_rx.try_recv() {
            Ok(ScanProgress::Cancelled) | Ok(ScanProgress::Complete { .. }) => {
                terminal = true;
                break;
            }
            Ok(_) => continue,
            Err(crossbeam_channel::TryRecvError::Empty) => {
                std::thread::sleep(Duration::from_millis(5));
            }
            Err(crossbeam_channel::TryRecvError::Disconnected) => break,
        }
    }
    assert!(terminal, "scan must end with Cancelled or Complete");
}

/// Per-directory failures are reported but do not abort the traversal.
#[cfg(unix)]
#[test]
fn unreadable_directory_is_logged_not_fatal() {
    use std::os::unix::fs::PermissionsExt;

    if unsafe { libc::geteuid() } == 0 {
        // Root ignores permission bits; the scenario cannot happen.
        return;
    }

    let tmp = TempDir::new().unwrap();
    write_bytes(&tmp.path().join("ok.txt"), 123);
    let locked = tmp.path().join("locked");
    fs::create_dir(&locked).unwrap();
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

    let (tree, errors) = scan_sync(&ScanOptions::new(tmp.path().to_path_buf()));
    let root = root_of(&tree);

    assert_eq!(errors.len(), 1);
    assert_eq!(tree.node(root).total_files, 1, "the readable file survives");

    fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
}

/// Top-N heaps over a scanned tree.
#[test]
fn top_heaps_over_scanned_tree() {
    let tmp = TempDir::new().unwrap();
    let heavy = tmp.path().join("heavy");
    fs::create_dir(&heavy).unwrap();
    write_bytes(&heavy.join("big.iso"), 50_000);
    write_bytes(&heavy.join("mid.zip"), 20_000);
    write_bytes(&tmp.path().join("small.txt"), 10);

    let (tree, _) = scan_sync(&ScanOptions::new(tmp.path().to_path_buf()));
    let root = root_of(&tree);

    let mut files = TopFiles::new(2);
    files.scan(&tree, root);
    let files = files.into_sorted();
    assert_eq!(files.len(), 2);
    assert_eq!(files[0].0, 50_000);
    assert_eq!(files[1].0, 20_000);

    let mut dirs = TopDirs::default();
    dirs.scan(&tree, root);
    let dirs = dirs.into_sorted();
    assert!(dirs
        .iter()
        .any(|&(local, id)| local == 70_000 && tree.node(id).name == "heavy"));
}

/// Navigation: enter a root, walk down, delete an entry, walk back up.
#[test]
fn navigation_flow_with_delete() {
    let tmp = TempDir::new().unwrap();
    let sub = tmp.path().join("sub");
    fs::create_dir(&sub).unwrap();
    write_bytes(&sub.join("doomed.bin"), 2048);
    write_bytes(&tmp.path().join("kept.bin"), 512);

    let mut nav = Navigation::with_root(
        VolumeList::default(),
        ScanOptions::new(tmp.path().to_path_buf()),
        tmp.path().to_path_buf(),
    );
    assert_eq!(nav.state(), ViewState::Dirs);

    drain_to_completion(nav.scan().unwrap());
    nav.scan().unwrap().calculate_size();

    let (sub_id, root_size) = {
        let tree = nav.live_tree().unwrap().read();
        let root = tree.root();
        assert_eq!(tree.node(root).size, 2560);
        let sub_id = tree
            .entries(root, EntryKind::DirsOnly)
            .next()
            .expect("sub directory discovered");
        (sub_id, tree.node(root).size)
    };
    assert_eq!(root_size, 2560);

    assert!(nav.enter_child(sub_id));

    let doomed = {
        let tree = nav.live_tree().unwrap().read();
        let doomed = tree
            .entries(sub_id, EntryKind::FilesOnly)
            .next()
            .expect("file inside sub");
        doomed
    };

    nav.delete_entry(doomed).unwrap();
    assert!(!sub.join("doomed.bin").exists(), "file is gone from disk");

    {
        let tree = nav.live_tree().unwrap().read();
        let root = tree.root();
        assert_eq!(tree.node(root).size, 512, "ancestors recomputed");
        assert_eq!(tree.node(root).total_files, 1);
    }

    // Up from sub: still Dirs at the root; up again: Drives.
    assert_eq!(nav.level_up(), ViewState::Dirs);
    assert_eq!(nav.level_up(), ViewState::Drives);
    assert!(nav.current().is_none());
}

/// The busy gate rejects reentrant traversal commands.
#[test]
fn navigation_busy_gate() {
    let nav = Navigation::new(
        VolumeList::default(),
        ScanOptions::new(std::env::temp_dir()),
    );

    assert!(nav.lock());
    assert!(!nav.lock(), "second lock must fail while busy");
    nav.unlock();
    assert!(nav.lock());
}
