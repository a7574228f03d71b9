//! Shared POSIX directory reader: `opendir`/`readdir` plus `fstatat`.
//!
//! Used by both the Linux and macOS adapters; each passes its own
//! name-skip rule. Entries are statted relative to the open directory fd
//! with `AT_SYMLINK_NOFOLLOW`, so symlinks are recorded with their own
//! size and never followed.

use crate::arena::ByteArena;
use crate::error::ScanError;
use crate::platform::FileInfo;
use crate::scanner::inode::InodeFilter;
use compact_str::CompactString;
use std::ffi::{CStr, CString};
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

/// RAII wrapper over `DIR *`; closing the stream also closes the fd.
struct DirStream {
    dirp: *mut libc::DIR,
    fd: libc::c_int,
}

impl DirStream {
    fn open(path: &Path) -> io::Result<Self> {
        let cpath = CString::new(path.as_os_str().as_bytes())
            .map_err(|_| io::Error::from(io::ErrorKind::InvalidInput))?;

        let fd = unsafe {
            libc::open(
                cpath.as_ptr(),
                libc::O_RDONLY | libc::O_DIRECTORY | libc::O_CLOEXEC,
            )
        };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }

        let dirp = unsafe { libc::fdopendir(fd) };
        if dirp.is_null() {
            let err = io::Error::last_os_error();
            unsafe { libc::close(fd) };
            return Err(err);
        }

        Ok(Self { dirp, fd })
    }
}

impl Drop for DirStream {
    fn drop(&mut self) {
        unsafe { libc::closedir(self.dirp) };
    }
}

/// Read the immediate children of `path`, applying the device-boundary
/// check, the inode filter, and the OS-specific `skip_name` rule.
pub(crate) fn read_dir_posix(
    arena: &mut ByteArena,
    path: &Path,
    inodes: &InodeFilter,
    skip_name: fn(&Path, &str) -> bool,
) -> Result<Vec<FileInfo>, ScanError> {
    arena.reset();

    let dir = DirStream::open(path).map_err(|source| ScanError::ReadDir {
        path: path.to_path_buf(),
        source,
    })?;

    let mut root_stat = unsafe { std::mem::zeroed::<libc::stat>() };
    let rc = unsafe { libc::fstat(dir.fd, &mut root_stat) };
    if rc != 0 {
        return Err(ScanError::ReadDir {
            path: path.to_path_buf(),
            source: io::Error::last_os_error(),
        });
    }
    let root_dev = root_stat.st_dev as u64;

    let mut infos = Vec::with_capacity(32);

    loop {
        let ent = unsafe { libc::readdir(dir.dirp) };
        if ent.is_null() {
            break;
        }

        let name_ptr = unsafe { (*ent).d_name.as_ptr() };
        let name_bytes = unsafe { CStr::from_ptr(name_ptr) }.to_bytes();

        if name_bytes == b"." || name_bytes == b".." {
            continue;
        }

        // Stage the name in the arena so the skip decision does not cost
        // a heap allocation for entries we end up discarding.
        let staged = arena.alloc(name_bytes.len())?;
        staged.copy_from_slice(name_bytes);
        let name = String::from_utf8_lossy(staged);

        if skip_name(path, &name) {
            continue;
        }

        let mut stat = unsafe { std::mem::zeroed::<libc::stat>() };
        let rc = unsafe {
            libc::fstatat(dir.fd, name_ptr, &mut stat, libc::AT_SYMLINK_NOFOLLOW)
        };
        if rc != 0 {
            // Unstatable child (racing delete, permissions): skip, the
            // directory itself is still fine.
            continue;
        }

        // Single-volume semantics: never descend through a mount point.
        if stat.st_dev as u64 != root_dev {
            continue;
        }

        let ino_key = InodeFilter::key(stat.st_dev as u64, stat.st_ino);
        if !inodes.add(ino_key) {
            continue;
        }

        let is_dir = (stat.st_mode as u32 & libc::S_IFMT as u32) == libc::S_IFDIR as u32;

        infos.push(FileInfo {
            name: CompactString::new(&name),
            is_dir,
            size: stat.st_size as i64,
            mtime: stat.st_mtime as i64,
            ino_key,
        });
    }

    Ok(infos)
}
