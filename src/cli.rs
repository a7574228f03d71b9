//! CLI argument surface, parsed with clap derive.
//!
//! The engine knobs pass straight through to `ScanOptions`; the shell
//! subcommands expose the archive/checksum side tool.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "noxdir",
    version,
    about = "Terminal utility for visualizing file system usage",
    long_about = "noxdir scans drives and directory hierarchies, aggregates \
                  per-entry sizes, and prints navigable summaries: volumes, \
                  directory tables, top-N files and directories."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<ShellCommand>,

    /// Exclude directories from scanning. Comma-separated, matched
    /// case-insensitively against any part of the path.
    ///
    /// Example: --exclude="node_modules,Steam\appcache"
    #[arg(short = 'x', long, value_delimiter = ',')]
    pub exclude: Vec<String>,

    /// Scan a single directory instead of selecting a drive. Trailing
    /// separators are stripped and the path is made absolute. Partial
    /// scans are never written to the cache.
    #[arg(short = 'r', long)]
    pub root: Option<PathBuf>,

    /// File size band "<size><unit>:<size><unit>" with units KB|MB|GB|TB|PB;
    /// either bound may be empty, e.g. "1GB:", ":10GB", "3MB:20MB".
    /// Directory sizes then reflect only the files within the band.
    #[arg(short = 'l', long)]
    pub size_limit: Option<String>,

    /// Hide directories without a single file anywhere below them.
    #[arg(short = 'd', long)]
    pub no_empty_dirs: bool,

    /// Skip entries whose name starts with a dot, e.g. ".git".
    #[arg(long)]
    pub no_hidden: bool,

    /// Cache scans under the config directory and reuse them on the
    /// next run.
    #[arg(short = 'c', long)]
    pub use_cache: bool,

    /// Delete all cache records at startup.
    #[arg(long)]
    pub clear_cache: bool,

    /// Custom color schema file (consumed by the rendering frontend).
    #[arg(long)]
    pub color_schema: Option<PathBuf>,

    /// Simplified palette without emojis and glyphs (rendering frontend).
    #[arg(long)]
    pub simple_color: bool,

    /// Verbose logging (RUST_LOG overrides).
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

/// The command-shell side tool: archive and checksum helpers operating
/// on entry lists inside a context directory.
#[derive(Subcommand, Debug)]
pub enum ShellCommand {
    /// Create a .tar[.gz|.zst] archive from entries under the context
    /// directory.
    Pack {
        /// Entry names, comma-separated. Sanitised to base names inside
        /// the context directory.
        #[arg(short = 'e', long, value_delimiter = ',', required = true)]
        entries: Vec<String>,

        /// Archive base name; the .tar[.gz|.zst] suffix is appended.
        #[arg(short = 'o', long, default_value = "archive")]
        output: String,

        /// Compression: "gzip"/"gz", "zstd"/"zst", or none.
        #[arg(short = 'c', long)]
        compression: Option<String>,

        /// Directory the entries live in; the archive lands there too.
        #[arg(long)]
        ctx_path: PathBuf,
    },

    /// Extract a tarball into a directory named after it under the
    /// context directory.
    Unpack {
        /// Archive file name inside the context directory.
        #[arg(short = 'e', long, value_delimiter = ',', required = true)]
        entries: Vec<String>,

        /// Output directory base name.
        #[arg(short = 'o', long, default_value = "unpacked")]
        output: String,

        /// Compression of the archive; inferred from the extension when
        /// omitted.
        #[arg(short = 'c', long)]
        compression: Option<String>,

        #[arg(long)]
        ctx_path: PathBuf,
    },

    /// Print a digest of a regular file under the context directory.
    Hash {
        /// File name inside the context directory; only the first entry
        /// is hashed.
        #[arg(long, value_delimiter = ',', required = true)]
        entries: Vec<String>,

        /// md5, sha1, sha224, sha256, sha384, or sha512.
        #[arg(short = 't', long = "type")]
        hash_type: String,

        /// hex, hex-up, or base64.
        #[arg(short = 'e', long, default_value = "hex")]
        encode: String,

        #[arg(long)]
        ctx_path: PathBuf,
    },
}
