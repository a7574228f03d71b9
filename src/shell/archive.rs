//! Tar archiving with optional gzip/zstd compression.
//!
//! Extraction refuses any entry whose normalized path would escape the
//! output directory.

use anyhow::{bail, Context, Result};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Component, Path, PathBuf};

const TAR_SUFFIX: &str = ".tar";

/// Default buffer size for reading and writing archives.
pub const DEFAULT_BUFFER_SIZE: usize = 5 << 20;

/// Compression wrapping the tar stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Compression {
    None,
    Gzip,
    Zstd,
}

impl Compression {
    /// Resolve from a user-supplied flag; unknown values mean no
    /// compression.
    pub fn from_flag(flag: Option<&str>) -> Self {
        match flag {
            Some("gzip") | Some("gz") => Self::Gzip,
            Some("zstd") | Some("zst") => Self::Zstd,
            _ => Self::None,
        }
    }

    /// Infer from an archive file name.
    pub fn infer(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("gz") => Self::Gzip,
            Some("zst") => Self::Zstd,
            _ => Self::None,
        }
    }

    /// Archive name suffix for this compression.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Gzip => ".gz",
            Self::Zstd => ".zst",
            Self::None => "",
        }
    }
}

/// Tar packer/unpacker with a configurable stream buffer.
pub struct Tar {
    buffer_size: usize,
    compression: Compression,
}

impl Tar {
    pub fn new(buffer_size: usize, compression: Compression) -> Self {
        Self {
            buffer_size: if buffer_size == 0 {
                DEFAULT_BUFFER_SIZE
            } else {
                buffer_size
            },
            compression,
        }
    }

    /// Pack `files` into `<output>.tar[.gz|.zst]` and return the final
    /// path. A failed pack removes the partial archive.
    pub fn pack_to_file(&self, files: &[PathBuf], output: &Path) -> Result<PathBuf> {
        let mut name = output.as_os_str().to_os_string();
        name.push(TAR_SUFFIX);
        name.push(self.compression.extension());
        let archive_path = PathBuf::from(name);

        let file = File::create(&archive_path)
            .with_context(|| format!("create archive {}", archive_path.display()))?;

        if let Err(err) = self.pack(files, file) {
            let _ = fs::remove_file(&archive_path);
            return Err(err);
        }

        Ok(archive_path)
    }

    /// Write a tar stream of `files` (each added under its base name,
    /// directories recursively) into `w`.
    pub fn pack<W: Write>(&self, files: &[PathBuf], w: W) -> Result<()> {
        let buffered = BufWriter::with_capacity(self.buffer_size, w);

        match self.compression {
            Compression::None => {
                write_tar(files, buffered)?.flush()?;
            }
            Compression::Gzip => {
                let encoder = GzEncoder::new(buffered, flate2::Compression::default());
                write_tar(files, encoder)?.finish()?.flush()?;
            }
            Compression::Zstd => {
                let encoder = zstd::Encoder::new(buffered, 0)?;
                write_tar(files, encoder)?.finish()?.flush()?;
            }
        }

        Ok(())
    }

    /// Extract `archive` into the directory `output`, creating it if
    /// needed.
    pub fn unpack_from_file(&self, archive: &Path, output: &Path) -> Result<()> {
        match fs::metadata(output) {
            Ok(meta) if !meta.is_dir() => {
                bail!("output path is not a directory: {}", output.display())
            }
            Ok(_) => {}
            Err(_) => fs::create_dir_all(output)
                .with_context(|| format!("create output dir {}", output.display()))?,
        }

        let file = File::open(archive)
            .with_context(|| format!("open archive {}", archive.display()))?;

        self.unpack(file, output)
    }

    /// Extract a tar stream into `output`, refusing entries that escape
    /// it.
    pub fn unpack<R: Read>(&self, r: R, output: &Path) -> Result<()> {
        let buffered = BufReader::with_capacity(self.buffer_size, r);

        let reader: Box<dyn Read> = match self.compression {
            Compression::None => Box::new(buffered),
            Compression::Gzip => Box::new(GzDecoder::new(buffered)),
            Compression::Zstd => Box::new(zstd::Decoder::new(buffered)?),
        };

        let mut archive = tar::Archive::new(reader);

        for entry in archive.entries()? {
            let mut entry = entry?;
            let entry_path = entry.path()?.into_owned();
            let target = safe_join(output, &entry_path)?;

            if entry.header().entry_type().is_dir() {
                fs::create_dir_all(&target)?;
                continue;
            }

            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            entry.unpack(&target)?;
        }

        Ok(())
    }
}

fn write_tar<W: Write>(files: &[PathBuf], w: W) -> Result<W> {
    let mut builder = tar::Builder::new(w);

    for path in files {
        let Some(name) = path.file_name() else {
            bail!("entry has no base name: {}", path.display());
        };

        let meta = fs::metadata(path)
            .with_context(|| format!("stat archive entry {}", path.display()))?;

        if meta.is_dir() {
            builder.append_dir_all(name, path)?;
        } else {
            builder.append_path_with_name(path, name)?;
        }
    }

    Ok(builder.into_inner()?)
}

/// Join an archive entry path onto `base`, rejecting absolute paths and
/// parent traversal.
fn safe_join(base: &Path, target: &Path) -> Result<PathBuf> {
    let mut joined = base.to_path_buf();

    for component in target.components() {
        match component {
            Component::Normal(part) => joined.push(part),
            Component::CurDir => {}
            _ => bail!("illegal file path in archive: {}", target.display()),
        }
    }

    Ok(joined)
}
