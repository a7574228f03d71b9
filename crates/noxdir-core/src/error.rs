//! Error types for the noxdir engine.
//!
//! Per-entry traversal failures are *not* represented here as hard errors:
//! they flow through the scan progress channel and the traversal keeps
//! going. The enums below cover the failures that abort an operation:
//! filter construction, cache encode/decode, configuration, and volume
//! enumeration.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for the engine.
#[derive(Error, Debug)]
pub enum Error {
    #[error("scan error: {0}")]
    Scan(#[from] ScanError),

    #[error("filter error: {0}")]
    Filter(#[from] FilterError),

    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Failures surfaced by the traversal and volume layers.
#[derive(Error, Debug)]
pub enum ScanError {
    /// A single directory could not be read. Recoverable: the traversal
    /// logs it and continues with the rest of the tree.
    #[error("read dir '{}': {source}", path.display())]
    ReadDir { path: PathBuf, source: io::Error },

    /// No volume could be enumerated at all. Fatal for the application.
    #[error("enumerate volumes: {0}")]
    Volumes(String),

    /// A worker arena could not satisfy an allocation. Programming error
    /// (the traversal arenas are dynamic); fails loud instead of skipping.
    #[error("arena exhausted: {0}")]
    Arena(#[from] ArenaError),

    /// Deleting an entry from the scanned filesystem failed.
    #[error("delete '{}': {source}", path.display())]
    Delete { path: PathBuf, source: io::Error },
}

impl ScanError {
    /// Whether the traversal may continue after this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ScanError::ReadDir { .. })
    }
}

/// Fixed-capacity arena overflow.
#[derive(Error, Debug)]
#[error("allocation overflow: requested {requested} bytes, {remaining} remaining")]
pub struct ArenaError {
    pub requested: usize,
    pub remaining: usize,
}

/// Invalid filter expressions, reported once at scan start.
#[derive(Error, Debug)]
pub enum FilterError {
    #[error("invalid size limit '{0}': expected \"<size><unit>:<size><unit>\" with units KB|MB|GB|TB|PB")]
    SizeLimit(String),

    #[error("size limit lower bound exceeds upper bound: '{0}'")]
    SizeLimitInverted(String),

    #[error("invalid name filter expression: {0}")]
    Regex(#[from] regex::Error),
}

/// Cache decode/encode failures. Every read-side variant is treated as a
/// cache miss by the scanner; write-side failures remove the cache file.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("cache I/O: {0}")]
    Io(#[from] io::Error),

    #[error("bad cache magic")]
    BadMagic,

    #[error("unsupported cache version {0}")]
    Version(u16),

    #[error("cache checksum mismatch")]
    Checksum,

    #[error("malformed cache record: {0}")]
    Malformed(&'static str),

    #[error("cache root path mismatch")]
    RootMismatch,

    #[error("entry name too long for cache record: {0} bytes")]
    NameTooLong(usize),
}

/// Configuration and settings failures. Fatal for the application.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot resolve the user config directory")]
    NoConfigDir,

    #[error("create config directory '{}': {source}", path.display())]
    Create { path: PathBuf, source: io::Error },

    #[error("settings file: {0}")]
    Io(#[from] io::Error),

    #[error("cannot parse settings file: {0}")]
    Parse(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
