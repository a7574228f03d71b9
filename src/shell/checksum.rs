//! File digests for the shell `hash` verb.

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha224, Sha256, Sha384, Sha512};
use std::fmt::Write as _;
use std::fs::File;
use std::io;
use std::path::Path;

/// Output encoding for a raw digest.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Encoding {
    HexLower,
    HexUpper,
    Base64,
}

impl Encoding {
    pub fn from_flag(flag: &str) -> Result<Self> {
        Ok(match flag {
            "hex" => Self::HexLower,
            "hex-up" => Self::HexUpper,
            "base64" => Self::Base64,
            other => bail!("unknown encoding type: {other}"),
        })
    }
}

/// Encode a raw digest for display.
pub fn format(raw: &[u8], encoding: Encoding) -> String {
    match encoding {
        Encoding::HexLower | Encoding::HexUpper => {
            let mut out = String::with_capacity(raw.len() * 2);
            for byte in raw {
                let _ = write!(out, "{byte:02x}");
            }
            if encoding == Encoding::HexUpper {
                out.make_ascii_uppercase();
            }
            out
        }
        Encoding::Base64 => STANDARD.encode(raw),
    }
}

/// Stream a regular file through the named hash algorithm.
pub fn calculate(hash_type: &str, path: &Path) -> Result<Vec<u8>> {
    let meta = std::fs::metadata(path)
        .with_context(|| format!("stat file {}", path.display()))?;
    if !meta.is_file() {
        bail!("not a regular file: {}", path.display());
    }

    let mut file =
        File::open(path).with_context(|| format!("open file {}", path.display()))?;

    fn digest_into<D: Digest + io::Write>(file: &mut File) -> Result<Vec<u8>> {
        let mut hasher = D::new();
        io::copy(file, &mut hasher)?;
        Ok(hasher.finalize().to_vec())
    }

    match hash_type {
        "md5" => digest_into::<Md5>(&mut file),
        "sha1" => digest_into::<Sha1>(&mut file),
        "sha224" => digest_into::<Sha224>(&mut file),
        "sha256" => digest_into::<Sha256>(&mut file),
        "sha384" => digest_into::<Sha384>(&mut file),
        "sha512" => digest_into::<Sha512>(&mut file),
        other => bail!("unknown hash type: {other}"),
    }
}
