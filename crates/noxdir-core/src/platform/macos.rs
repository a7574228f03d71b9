//! macOS adapter: `getfsstat` volume enumeration with system-volume
//! exclusions and the POSIX directory reader with HFS+/APFS metadata
//! name handling.

use crate::error::ScanError;
use crate::platform::{VolumeInfo, VolumeList};
use std::path::{Path, PathBuf};

// Mount flags that mark volumes we never scan: read-only system images,
// APFS snapshots, the synthetic root, and automounted service volumes.
const MNT_RDONLY: u32 = 0x0000_0001;
const MNT_ROOTFS: u32 = 0x0000_4000;
const MNT_AUTOMOUNTED: u32 = 0x0040_0000;
const MNT_SNAPSHOT: u32 = 0x4000_0000;

const EXCLUDED_FLAGS: u32 = MNT_RDONLY | MNT_SNAPSHOT | MNT_ROOTFS | MNT_AUTOMOUNTED;

/// System volume paths that are either virtual or duplicated views of
/// the data volume.
const EXCLUDED_MOUNTS: [&str; 8] = [
    "/dev",
    "/System/Volumes/VM",
    "/System/Volumes/Preboot",
    "/System/Volumes/Update",
    "/System/Volumes/xarts",
    "/System/Volumes/iSCPreboot",
    "/System/Volumes/Hardware",
    "/System/Volumes/Data/home",
];

/// Per-directory skip rule for `read_dir`.
///
/// Firmlink metadata entries start with U+2400 (symbol for NUL) or
/// `.HFS+`; inside the data volume the `Volumes` child is a mirror of
/// `/Volumes` and would double-count every external drive.
pub(crate) fn skip_name(dir: &Path, name: &str) -> bool {
    if name.starts_with('\u{2400}') || name.starts_with(".HFS+") {
        return true;
    }

    dir == Path::new("/System/Volumes/Data") && name == "Volumes"
}

fn c_chars_to_string(chars: &[libc::c_char]) -> String {
    let bytes: Vec<u8> = chars
        .iter()
        .take_while(|&&c| c != 0)
        .map(|&c| c as u8)
        .collect();
    String::from_utf8_lossy(&bytes).into_owned()
}

fn statfs_to_info(stat: &libc::statfs) -> VolumeInfo {
    let block_size = stat.f_bsize as u64;
    let total = stat.f_blocks * block_size;
    let free = stat.f_bfree * block_size;
    let used_blocks = stat.f_blocks - stat.f_bfree;
    let used = used_blocks * block_size;

    VolumeInfo {
        path: PathBuf::from(c_chars_to_string(&stat.f_mntonname)),
        volume_label: String::new(),
        fs_name: c_chars_to_string(&stat.f_fstypename),
        device: c_chars_to_string(&stat.f_mntfromname),
        total_bytes: total,
        free_bytes: free,
        used_bytes: used,
        used_percent: if stat.f_blocks > 0 {
            used_blocks as f64 / stat.f_blocks as f64 * 100.0
        } else {
            0.0
        },
        is_device_row: false,
    }
}

/// Enumerate mounted filesystems via `getfsstat`, dropping read-only,
/// snapshot, rootfs, and automounted volumes plus the fixed system
/// volume list. macOS emits flat rows; there is no device/mount layout.
pub(crate) fn list_volumes() -> Result<VolumeList, ScanError> {
    let count = unsafe { libc::getfsstat(std::ptr::null_mut(), 0, libc::MNT_NOWAIT) };
    if count < 0 {
        return Err(ScanError::Volumes(format!(
            "getfsstat: {}",
            std::io::Error::last_os_error()
        )));
    }

    let mut stats = vec![unsafe { std::mem::zeroed::<libc::statfs>() }; count as usize];
    let buf_size = (stats.len() * std::mem::size_of::<libc::statfs>()) as libc::c_int;

    let filled = unsafe { libc::getfsstat(stats.as_mut_ptr(), buf_size, libc::MNT_NOWAIT) };
    if filled < 0 {
        return Err(ScanError::Volumes(format!(
            "getfsstat: {}",
            std::io::Error::last_os_error()
        )));
    }
    stats.truncate(filled as usize);

    let mut list = VolumeList::default();

    'mounts: for stat in &stats {
        if (stat.f_flags & EXCLUDED_FLAGS) != 0 {
            continue;
        }

        let info = statfs_to_info(stat);
        let mount_path = info.path.to_string_lossy().into_owned();

        for excluded in EXCLUDED_MOUNTS {
            if mount_path.starts_with(excluded) {
                continue 'mounts;
            }
        }

        list.add_totals(&info);
        list.insert(info);
    }

    if list.is_empty() {
        return Err(ScanError::Volumes("no scannable volumes found".into()));
    }

    Ok(list)
}
