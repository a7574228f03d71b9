//! Linux adapter: `/proc/self/mounts` enumeration with pseudo-filesystem
//! exclusion, device/mount grouping, and the POSIX directory reader.

use crate::error::ScanError;
use crate::platform::{VolumeInfo, VolumeList};
use std::collections::HashMap;
use std::ffi::CString;
use std::fs;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

const MOUNT_TABLE: &str = "/proc/self/mounts";

// Superblock magic numbers from linux/magic.h. Mounts with these types
// are pseudo-filesystems and never hold user data worth scanning.
const CGROUP_SUPER_MAGIC: i64 = 0x0027_e0eb;
const CGROUP2_SUPER_MAGIC: i64 = 0x6367_7270;
const SYSFS_MAGIC: i64 = 0x6265_6572;
const OVERLAYFS_SUPER_MAGIC: i64 = 0x794c_7630;
const TMPFS_MAGIC: i64 = 0x0102_1994;
const DEBUGFS_MAGIC: i64 = 0x6462_6720;
const SQUASHFS_MAGIC: i64 = 0x7371_7368;
const PROC_SUPER_MAGIC: i64 = 0x0000_9fa0;
const SECURITYFS_MAGIC: i64 = 0x7363_6673;

const EXCLUDED_FS_MAGIC: [i64; 9] = [
    CGROUP_SUPER_MAGIC,
    CGROUP2_SUPER_MAGIC,
    SYSFS_MAGIC,
    OVERLAYFS_SUPER_MAGIC,
    TMPFS_MAGIC,
    DEBUGFS_MAGIC,
    SQUASHFS_MAGIC,
    PROC_SUPER_MAGIC,
    SECURITYFS_MAGIC,
];

const EXT4_SUPER_MAGIC: i64 = 0xef53;
const XFS_SUPER_MAGIC: i64 = 0x5846_5342;
const BTRFS_SUPER_MAGIC: i64 = 0x9123_683e;
const NFS_SUPER_MAGIC: i64 = 0x6969;
const MSDOS_SUPER_MAGIC: i64 = 0x4d44;
const V9FS_MAGIC: i64 = 0x0102_1997;
const NTFS_SB_MAGIC: i64 = 0x5346_544e;

/// System directories skipped when reading the filesystem root.
const ROOT_EXCLUDED: [&str; 5] = ["mnt", "sys", "lost+found", "boot", "proc"];

fn fs_name(magic: i64) -> &'static str {
    match magic {
        EXT4_SUPER_MAGIC => "ext4",
        XFS_SUPER_MAGIC => "xfs",
        BTRFS_SUPER_MAGIC => "btrfs",
        NFS_SUPER_MAGIC => "nfs",
        MSDOS_SUPER_MAGIC => "msdos",
        V9FS_MAGIC => "v9",
        NTFS_SB_MAGIC => "ntfs",
        _ => "",
    }
}

/// Per-directory skip rule for `read_dir`: hide kernel/system trees when
/// listing `/`.
pub(crate) fn skip_name(dir: &Path, name: &str) -> bool {
    dir == Path::new("/") && ROOT_EXCLUDED.contains(&name)
}

/// Capacity statistics for one mount point, or `None` when the mount is
/// a pseudo-filesystem or cannot be statted.
fn mount_info(source: &str, mount_point: &str) -> Option<VolumeInfo> {
    let cpath = CString::new(Path::new(mount_point).as_os_str().as_bytes()).ok()?;

    let mut stat = unsafe { std::mem::zeroed::<libc::statfs>() };
    let rc = unsafe { libc::statfs(cpath.as_ptr(), &mut stat) };
    if rc != 0 {
        // Mostly permission problems that would need root; skip quietly.
        return None;
    }

    let magic = stat.f_type as i64;
    if EXCLUDED_FS_MAGIC.contains(&magic) || stat.f_blocks == 0 {
        return None;
    }

    let block_size = stat.f_bsize as u64;
    let total = stat.f_blocks as u64 * block_size;
    let free = stat.f_bfree as u64 * block_size;
    let used_blocks = stat.f_blocks as u64 - stat.f_bfree as u64;
    let used = used_blocks * block_size;

    Some(VolumeInfo {
        path: PathBuf::from(mount_point),
        volume_label: String::new(),
        fs_name: fs_name(magic).to_string(),
        device: source.to_string(),
        total_bytes: total,
        free_bytes: free,
        used_bytes: used,
        used_percent: used_blocks as f64 / stat.f_blocks as f64 * 100.0,
        is_device_row: false,
    })
}

/// Unescape the octal sequences mount(8) uses for spaces and friends
/// (`\040` etc.) in `/proc/self/mounts` fields.
fn unescape_mount_field(field: &str) -> String {
    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'\\' {
            if let Some(value) = octal3(&bytes[i + 1..]) {
                out.push(value);
                i += 4;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }

    String::from_utf8_lossy(&out).into_owned()
}

fn octal3(bytes: &[u8]) -> Option<u8> {
    if bytes.len() < 3 {
        return None;
    }
    let mut value: u32 = 0;
    for &b in &bytes[..3] {
        if !(b'0'..=b'7').contains(&b) {
            return None;
        }
        value = value * 8 + u32::from(b - b'0');
    }
    u8::try_from(value).ok()
}

/// Enumerate mounts from the mount table, excluding pseudo-filesystems,
/// then group mounts that share a backing device: a device with a single
/// mount becomes one flat row, a device with several mounts becomes a
/// synthetic device row plus one child row per mount.
pub(crate) fn list_volumes() -> Result<VolumeList, ScanError> {
    let table = fs::read_to_string(MOUNT_TABLE)
        .map_err(|err| ScanError::Volumes(format!("open {MOUNT_TABLE}: {err}")))?;

    // device source -> mount points, preserving table order.
    let mut device_mounts: HashMap<String, Vec<String>> = HashMap::new();
    let mut device_order: Vec<String> = Vec::new();

    for line in table.lines() {
        let mut fields = line.split(' ');
        let (Some(source), Some(mount_point)) = (fields.next(), fields.next()) else {
            continue;
        };

        // Anything not backed by a device node is a special filesystem.
        if !source.starts_with('/') {
            continue;
        }

        let source = unescape_mount_field(source);
        let mount_point = unescape_mount_field(mount_point);

        let mounts = device_mounts.entry(source.clone()).or_default();
        if mounts.is_empty() {
            device_order.push(source);
        }
        mounts.push(mount_point);
    }

    let mut list = VolumeList::default();

    for device in device_order {
        let mounts = &device_mounts[&device];

        let mut infos: Vec<VolumeInfo> = mounts
            .iter()
            .filter_map(|mnt| mount_info(&device, mnt))
            .collect();

        if infos.is_empty() {
            continue;
        }

        if infos.len() == 1 {
            let info = infos.remove(0);
            list.add_totals(&info);
            list.insert(info);
            continue;
        }

        // Several mounts share this device: emit a header row carrying
        // the capacity (counted once) plus the individual mount rows.
        list.mounts_layout = true;

        let mut device_row = infos[0].clone();
        device_row.path = PathBuf::from(&device);
        device_row.is_device_row = true;
        list.add_totals(&device_row);
        list.insert(device_row);

        for info in infos {
            list.insert(info);
        }
    }

    if list.is_empty() {
        return Err(ScanError::Volumes("no scannable volumes found".into()));
    }

    Ok(list)
}
