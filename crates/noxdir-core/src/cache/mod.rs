//! File-backed scan cache — one compressed, checksummed tree per root
//! path under the application config directory.
//!
//! Read-side failures of any kind (missing file, bad magic, version
//! mismatch, checksum, I/O) surface as errors the scanner treats as a
//! miss. Writes go to a temporary file first and are renamed into place;
//! a failed write removes the target so a poisoned record never
//! survives.

pub mod codec;

use crate::error::CacheError;
use crate::model::DirTree;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Extension of cache record files inside the config directory.
const CACHE_EXT: &str = "nxc";

/// gzip stream magic, used to detect whether a record was compressed.
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Persistent store of serialised trees, keyed by absolute root path.
pub struct Cache {
    dir: PathBuf,
    compress: bool,
}

impl Cache {
    /// Open (and create) the cache under `dir`. With `clear` set, all
    /// existing cache records are removed first; other files in the
    /// directory (settings) are left alone.
    pub fn new(dir: PathBuf, clear: bool, compress: bool) -> Result<Self, CacheError> {
        fs::create_dir_all(&dir)?;

        let cache = Self { dir, compress };
        if clear {
            cache.clear()?;
        }

        Ok(cache)
    }

    /// Remove every cache record file.
    pub fn clear(&self) -> Result<(), CacheError> {
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == CACHE_EXT) {
                debug!(path = %path.display(), "removing cache record");
                fs::remove_file(&path)?;
            }
        }
        Ok(())
    }

    /// Whether a record exists for `key`. Existence only — the record
    /// may still fail to decode, which [`get`](Self::get) reports.
    pub fn has(&self, key: &Path) -> bool {
        self.record_path(key).exists()
    }

    /// Load the record for `key` into `tree`, replacing its contents.
    pub fn get(&self, key: &Path, tree: &mut DirTree) -> Result<(), CacheError> {
        let raw = fs::read(self.record_path(key))?;

        let data = if raw.starts_with(&GZIP_MAGIC) {
            let mut decoded = Vec::with_capacity(raw.len() * 4);
            GzDecoder::new(raw.as_slice()).read_to_end(&mut decoded)?;
            decoded
        } else {
            raw
        };

        let decoded = codec::decode(&data)?;
        if decoded.root_path() != key {
            return Err(CacheError::RootMismatch);
        }

        *tree = decoded;
        Ok(())
    }

    /// Serialise `tree` as the record for `key`.
    pub fn set(&self, key: &Path, tree: &DirTree) -> Result<(), CacheError> {
        let target = self.record_path(key);

        match self.write_record(&target, tree) {
            Ok(()) => Ok(()),
            Err(err) => {
                warn!(key = %key.display(), %err, "cache write failed, removing record");
                let _ = fs::remove_file(&target);
                Err(err)
            }
        }
    }

    fn write_record(&self, target: &Path, tree: &DirTree) -> Result<(), CacheError> {
        let encoded = codec::encode(tree)?;

        let payload = if self.compress {
            let mut encoder = GzEncoder::new(
                Vec::with_capacity(encoded.len() / 2),
                Compression::default(),
            );
            encoder.write_all(&encoded)?;
            encoder.finish()?
        } else {
            encoded
        };

        // Whole-file replacement: write a sibling temp file, then rename
        // over the target so readers never observe a partial record.
        let tmp = target.with_extension("tmp");
        fs::write(&tmp, &payload)?;
        fs::rename(&tmp, target)?;

        Ok(())
    }

    fn record_path(&self, key: &Path) -> PathBuf {
        let hash = crc32fast::hash(key.to_string_lossy().as_bytes());
        self.dir.join(format!("{hash:08x}.{CACHE_EXT}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Entry, EntryKind};
    use tempfile::TempDir;

    fn sample_tree(root: &str) -> DirTree {
        let mut tree = DirTree::with_root(PathBuf::from(root), 0);
        let root_id = tree.root();
        let sub = tree.add_node(Entry::new_dir("sub".into(), 0, None));
        tree.add_child(root_id, sub);
        let f = tree.add_node(Entry::new_file("data.bin".into(), 4096, 9, None));
        tree.add_child(sub, f);
        tree.aggregate();
        tree
    }

    #[test]
    fn set_then_get_round_trips() {
        let dir = TempDir::new().unwrap();
        let cache = Cache::new(dir.path().to_path_buf(), false, true).unwrap();

        let key = PathBuf::from("/scan/root");
        let tree = sample_tree("/scan/root");
        cache.set(&key, &tree).unwrap();
        assert!(cache.has(&key));

        let mut restored = DirTree::with_root(key.clone(), 0);
        cache.get(&key, &mut restored).unwrap();
        restored.aggregate();

        assert_eq!(restored.node(restored.root()).size, 4096);
        assert_eq!(restored.node(restored.root()).total_files, 1);
        assert_eq!(restored.node(restored.root()).total_dirs, 1);
    }

    #[test]
    fn uncompressed_records_also_decode() {
        let dir = TempDir::new().unwrap();
        let cache = Cache::new(dir.path().to_path_buf(), false, false).unwrap();

        let key = PathBuf::from("/plain");
        cache.set(&key, &sample_tree("/plain")).unwrap();

        let mut restored = DirTree::with_root(key.clone(), 0);
        cache.get(&key, &mut restored).unwrap();
        assert!(restored
            .entries(restored.root(), EntryKind::DirsOnly)
            .next()
            .is_some());
    }

    #[test]
    fn missing_record_is_an_error() {
        let dir = TempDir::new().unwrap();
        let cache = Cache::new(dir.path().to_path_buf(), false, true).unwrap();

        let key = PathBuf::from("/never/stored");
        assert!(!cache.has(&key));

        let mut tree = DirTree::with_root(key.clone(), 0);
        assert!(cache.get(&key, &mut tree).is_err());
    }

    #[test]
    fn root_mismatch_is_detected() {
        let dir = TempDir::new().unwrap();
        let cache = Cache::new(dir.path().to_path_buf(), false, true).unwrap();

        // A record whose stored root differs from its key (e.g. a hash
        // collision) must not be transplanted.
        let key = PathBuf::from("/a");
        cache.set(&key, &sample_tree("/b")).unwrap();

        let mut tree = DirTree::with_root(key.clone(), 0);
        assert!(matches!(
            cache.get(&key, &mut tree),
            Err(CacheError::RootMismatch)
        ));
    }

    #[test]
    fn corrupted_record_fails_decode() {
        let dir = TempDir::new().unwrap();
        let cache = Cache::new(dir.path().to_path_buf(), false, false).unwrap();

        let key = PathBuf::from("/x");
        cache.set(&key, &sample_tree("/x")).unwrap();

        let record = cache.record_path(&key);
        let mut bytes = fs::read(&record).unwrap();
        let mid = bytes.len() / 2;
        bytes[mid] ^= 0xFF;
        fs::write(&record, &bytes).unwrap();

        let mut tree = DirTree::with_root(key.clone(), 0);
        assert!(cache.get(&key, &mut tree).is_err());
    }

    #[test]
    fn clear_removes_only_cache_records() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("settings.json"), b"{}").unwrap();

        let cache = Cache::new(dir.path().to_path_buf(), false, true).unwrap();
        cache.set(&PathBuf::from("/x"), &sample_tree("/x")).unwrap();

        let cleared = Cache::new(dir.path().to_path_buf(), true, true).unwrap();
        assert!(!cleared.has(&PathBuf::from("/x")));
        assert!(dir.path().join("settings.json").exists());
    }
}
