//! Windows adapter: logical drive enumeration via the Win32 volume APIs
//! and a directory reader over `FindFirstFile`-backed `std::fs` with
//! UTF-16 name staging.

use crate::arena::ByteArena;
use crate::error::{ArenaError, ScanError};
use crate::platform::{FileInfo, VolumeInfo, VolumeList};
use crate::scanner::inode::InodeFilter;
use compact_str::CompactString;
use std::os::windows::ffi::OsStrExt;
use std::os::windows::fs::MetadataExt;
use std::path::{Path, PathBuf};
use windows::core::PCWSTR;
use windows::Win32::Storage::FileSystem::{
    GetDiskFreeSpaceExW, GetDriveTypeW, GetLogicalDrives, GetVolumeInformationW,
};

// Drive type constants from the Windows API.
const DRIVE_REMOTE_VAL: u32 = 4;

/// Seconds between the FILETIME epoch (1601) and the Unix epoch (1970).
const FILETIME_UNIX_DIFF_SECS: i64 = 11_644_473_600;

fn filetime_to_unix(ft: u64) -> i64 {
    (ft / 10_000_000) as i64 - FILETIME_UNIX_DIFF_SECS
}

/// Decode a UTF-16 buffer into the arena and return the borrowed `&str`.
///
/// Unpaired surrogates decode to U+FFFD. The arena slice is sized for the
/// worst case (three bytes per unit covers the replacement character and
/// every BMP scalar; astral scalars use two units for four bytes).
pub(crate) fn utf16_to_str<'a>(
    arena: &'a mut ByteArena,
    units: &[u16],
) -> Result<&'a str, ArenaError> {
    let buf = arena.alloc(units.len() * 3)?;
    let mut written = 0;

    for ch in char::decode_utf16(units.iter().copied()) {
        let ch = ch.unwrap_or(char::REPLACEMENT_CHARACTER);
        written += ch.encode_utf8(&mut buf[written..]).len();
    }

    // Everything below `written` is valid UTF-8 by construction.
    Ok(std::str::from_utf8(&buf[..written]).expect("encoded UTF-8"))
}

fn wide_null(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

fn utf16_field(buf: &[u16]) -> String {
    let len = buf.iter().position(|&c| c == 0).unwrap_or(0);
    String::from_utf16_lossy(&buf[..len])
}

/// Enumerate logical drives from the `GetLogicalDrives` bitmask and query
/// volume name, filesystem name, and capacity for each. Network drives
/// are excluded; the list is flat (no device/mount layout on Windows).
pub(crate) fn list_volumes() -> Result<VolumeList, ScanError> {
    let mask = unsafe { GetLogicalDrives() };
    if mask == 0 {
        return Err(ScanError::Volumes("GetLogicalDrives returned 0".into()));
    }

    let mut list = VolumeList::default();

    for bit in 0..26u32 {
        if (mask & (1 << bit)) == 0 {
            continue;
        }

        let letter = char::from(b'A' + bit as u8);
        let root = format!("{letter}:\\");
        let root_wide = wide_null(&root);
        let root_pcwstr = PCWSTR(root_wide.as_ptr());

        let drive_type = unsafe { GetDriveTypeW(root_pcwstr) };
        if drive_type == DRIVE_REMOTE_VAL {
            continue;
        }

        let mut label_buf = [0u16; 256];
        let mut fs_buf = [0u16; 256];
        let has_volume_info = unsafe {
            GetVolumeInformationW(
                root_pcwstr,
                Some(&mut label_buf),
                None,
                None,
                None,
                Some(&mut fs_buf),
            )
            .is_ok()
        };

        let (volume_label, fs_name) = if has_volume_info {
            (utf16_field(&label_buf), utf16_field(&fs_buf))
        } else {
            (String::new(), String::new())
        };

        let mut free_caller: u64 = 0;
        let mut total: u64 = 0;
        let mut free_total: u64 = 0;
        let has_space = unsafe {
            GetDiskFreeSpaceExW(
                root_pcwstr,
                Some(&mut free_caller as *mut u64),
                Some(&mut total as *mut u64),
                Some(&mut free_total as *mut u64),
            )
            .is_ok()
        };

        let (total_bytes, free_bytes) = if has_space { (total, free_caller) } else { (0, 0) };
        let used_bytes = total_bytes.saturating_sub(free_bytes);
        let used_percent = if total_bytes > 0 {
            used_bytes as f64 / total_bytes as f64 * 100.0
        } else {
            0.0
        };

        let info = VolumeInfo {
            path: PathBuf::from(&root),
            volume_label,
            fs_name,
            device: format!("{letter}:"),
            total_bytes,
            free_bytes,
            used_bytes,
            used_percent,
            is_device_row: false,
        };

        list.add_totals(&info);
        list.insert(info);
    }

    if list.is_empty() {
        return Err(ScanError::Volumes("no scannable volumes found".into()));
    }

    Ok(list)
}

/// Read the immediate children of `path`.
///
/// Reparse points (symlinks, junctions, volume mount points) are skipped
/// so a scan never leaves its drive. Windows exposes no cheap per-entry
/// file identifier during enumeration, so `ino_key` is zero and the
/// inode filter passes everything through.
pub(crate) fn read_dir(
    arena: &mut ByteArena,
    path: &Path,
    _inodes: &InodeFilter,
) -> Result<Vec<FileInfo>, ScanError> {
    arena.reset();

    let iter = std::fs::read_dir(path).map_err(|source| ScanError::ReadDir {
        path: path.to_path_buf(),
        source,
    })?;

    let mut infos = Vec::with_capacity(32);

    for entry in iter {
        let Ok(entry) = entry else {
            continue;
        };

        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        if file_type.is_symlink() {
            continue;
        }

        let Ok(meta) = entry.metadata() else {
            continue;
        };

        let wide: Vec<u16> = entry.file_name().encode_wide().collect();
        let name = utf16_to_str(arena, &wide)?;

        infos.push(FileInfo {
            name: CompactString::new(name),
            is_dir: file_type.is_dir(),
            size: meta.file_size() as i64,
            mtime: filetime_to_unix(meta.last_write_time()),
            ino_key: 0,
        });
    }

    Ok(infos)
}
