//! Platform filesystem adapter — volume enumeration, directory reading,
//! and opening paths in the OS file explorer.
//!
//! The traversal engine never issues a syscall itself; everything flows
//! through [`list_volumes`], [`read_dir`], and [`open_external`]. Each OS
//! gets its own module with its own exclusion rules, selected at compile
//! time.

use crate::arena::ByteArena;
use crate::error::ScanError;
use crate::scanner::inode::InodeFilter;
use compact_str::CompactString;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;

#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "macos")]
mod macos;
#[cfg(unix)]
mod unix;
#[cfg(windows)]
mod windows;

/// One raw child entry as returned by the platform layer, before any
/// tree node exists for it.
#[derive(Debug, Clone)]
pub struct FileInfo {
    pub name: CompactString,
    pub is_dir: bool,
    pub size: i64,
    pub mtime: i64,
    /// Combined device/inode identifier, `0` when unavailable.
    pub ino_key: u64,
}

impl FileInfo {
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Capacity statistics for a single volume, mount, or device row.
#[derive(Debug, Clone)]
pub struct VolumeInfo {
    pub path: PathBuf,
    pub volume_label: String,
    pub fs_name: String,
    pub device: String,
    pub total_bytes: u64,
    pub free_bytes: u64,
    pub used_bytes: u64,
    pub used_percent: f64,
    /// Synthetic header row for a device that backs several mounts.
    pub is_device_row: bool,
}

/// Sort order for the volume table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortKey {
    TotalCap,
    TotalUsed,
    TotalFree,
    UsedPercent,
}

/// All volumes discovered on the system plus running capacity totals.
#[derive(Debug, Default)]
pub struct VolumeList {
    volumes: HashMap<PathBuf, VolumeInfo>,
    pub total_capacity: u64,
    pub total_free: u64,
    pub total_used: u64,
    /// `true` when the list contains device header rows with child mount
    /// rows (several mounts sharing one device).
    pub mounts_layout: bool,
}

impl VolumeList {
    pub(crate) fn insert(&mut self, info: VolumeInfo) {
        self.volumes.insert(info.path.clone(), info);
    }

    /// Add a volume's capacity to the list-wide totals. Device-backed
    /// mount rows share capacity with their header row and must be
    /// counted once; callers decide which row contributes.
    pub(crate) fn add_totals(&mut self, info: &VolumeInfo) {
        self.total_capacity += info.total_bytes;
        self.total_free += info.free_bytes;
        self.total_used += info.used_bytes;
    }

    pub fn get(&self, path: &Path) -> Option<&VolumeInfo> {
        self.volumes.get(path)
    }

    pub fn iter(&self) -> impl Iterator<Item = &VolumeInfo> {
        self.volumes.values()
    }

    pub fn len(&self) -> usize {
        self.volumes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.volumes.is_empty()
    }

    /// Volumes ordered by `key`. Ties fall back to the device name, and
    /// device header rows sort above their mount rows.
    pub fn sorted(&self, key: SortKey, desc: bool) -> Vec<&VolumeInfo> {
        let mut volumes: Vec<&VolumeInfo> = self.volumes.values().collect();

        volumes.sort_by(|a, b| {
            let mut ord = match key {
                SortKey::TotalCap => a.total_bytes.cmp(&b.total_bytes),
                SortKey::TotalUsed => a.used_bytes.cmp(&b.used_bytes),
                SortKey::TotalFree => a.free_bytes.cmp(&b.free_bytes),
                SortKey::UsedPercent => a
                    .used_percent
                    .partial_cmp(&b.used_percent)
                    .unwrap_or(std::cmp::Ordering::Equal),
            };

            if desc {
                ord = ord.reverse();
            }

            ord.then_with(|| a.device.cmp(&b.device))
                .then_with(|| b.is_device_row.cmp(&a.is_device_row))
        });

        volumes
    }
}

/// Enumerate mounted volumes with capacity statistics.
///
/// Pseudo-filesystems and system-internal mounts are excluded with
/// OS-specific rules; see the per-platform modules.
pub fn list_volumes() -> Result<VolumeList, ScanError> {
    #[cfg(target_os = "linux")]
    {
        linux::list_volumes()
    }
    #[cfg(target_os = "macos")]
    {
        macos::list_volumes()
    }
    #[cfg(windows)]
    {
        windows::list_volumes()
    }
}

/// Return the immediate children of `path`.
///
/// `.`/`..` and OS metadata names are skipped, entries crossing a device
/// boundary relative to `path` are skipped, and every entry is stamped
/// through `inodes` so hardlinked data is counted once. `arena` stages
/// name bytes between the syscall and the keep decision; it is reset on
/// entry.
pub fn read_dir(
    arena: &mut ByteArena,
    path: &Path,
    inodes: &InodeFilter,
) -> Result<Vec<FileInfo>, ScanError> {
    #[cfg(target_os = "linux")]
    {
        unix::read_dir_posix(arena, path, inodes, linux::skip_name)
    }
    #[cfg(target_os = "macos")]
    {
        unix::read_dir_posix(arena, path, inodes, macos::skip_name)
    }
    #[cfg(windows)]
    {
        windows::read_dir(arena, path, inodes)
    }
}

/// Open `path` in the OS file explorer. Fire-and-forget: failures are
/// logged and reported once, never retried.
pub fn open_external(path: &Path) -> std::io::Result<()> {
    if path.as_os_str().is_empty() {
        return Ok(());
    }

    #[cfg(target_os = "linux")]
    let program = "xdg-open";
    #[cfg(target_os = "macos")]
    let program = "open";
    #[cfg(windows)]
    let program = "explorer";

    match Command::new(program).arg(path).spawn() {
        Ok(_child) => Ok(()),
        Err(err) => {
            tracing::warn!(path = %path.display(), %err, "open in file explorer failed");
            Err(err)
        }
    }
}
