//! The command-shell side tool: pack/unpack/hash verbs over an entry
//! list rooted in a context directory.
//!
//! Every user-supplied name is reduced to its base name and re-joined
//! onto the context path, so the verbs can never be pointed outside the
//! directory the caller was browsing.

pub mod archive;
pub mod checksum;

use crate::cli::ShellCommand;
use anyhow::{bail, Result};
use archive::{Compression, Tar};
use std::path::{Path, PathBuf};

/// Execute one shell verb, printing its result to stdout.
pub fn run(command: ShellCommand) -> Result<()> {
    match command {
        ShellCommand::Pack {
            entries,
            output,
            compression,
            ctx_path,
        } => {
            let files = sanitize_entries(&ctx_path, &entries)?;
            let output = join_base_name(&ctx_path, &output)?;

            let tar = Tar::new(0, Compression::from_flag(compression.as_deref()));
            let archive = tar.pack_to_file(&files, &output)?;
            println!("{}", archive.display());
            Ok(())
        }

        ShellCommand::Unpack {
            entries,
            output,
            compression,
            ctx_path,
        } => {
            let Some(first) = entries.first() else {
                bail!("no archive entry provided");
            };
            let archive = join_base_name(&ctx_path, first)?;
            let output = join_base_name(&ctx_path, &output)?;

            let compression = match compression.as_deref() {
                Some(flag) => Compression::from_flag(Some(flag)),
                None => Compression::infer(&archive),
            };

            Tar::new(0, compression).unpack_from_file(&archive, &output)?;
            println!("{}", output.display());
            Ok(())
        }

        ShellCommand::Hash {
            entries,
            hash_type,
            encode,
            ctx_path,
        } => {
            let Some(first) = entries.first() else {
                bail!("no file entry provided");
            };
            let file = join_base_name(&ctx_path, first)?;

            let encoding = checksum::Encoding::from_flag(&encode)?;
            let raw = checksum::calculate(&hash_type, &file)?;
            println!("{}", checksum::format(&raw, encoding));
            Ok(())
        }
    }
}

/// Reduce `name` to its base name and join it onto the context path.
fn join_base_name(ctx: &Path, name: &str) -> Result<PathBuf> {
    let Some(base) = Path::new(name).file_name() else {
        bail!("invalid entry name: {name}");
    };
    Ok(ctx.join(base))
}

fn sanitize_entries(ctx: &Path, entries: &[String]) -> Result<Vec<PathBuf>> {
    entries
        .iter()
        .map(|entry| join_base_name(ctx, entry))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_names_are_reduced_to_base_names() {
        let ctx = Path::new("/ctx");

        assert_eq!(
            join_base_name(ctx, "../../etc/passwd").unwrap(),
            PathBuf::from("/ctx/passwd")
        );
        assert_eq!(
            join_base_name(ctx, "plain.txt").unwrap(),
            PathBuf::from("/ctx/plain.txt")
        );
        assert!(join_base_name(ctx, "..").is_err());
    }

    #[test]
    fn sanitize_preserves_order() {
        let ctx = Path::new("/ctx");
        let sanitized =
            sanitize_entries(ctx, &["a".to_string(), "sub/b".to_string()]).unwrap();
        assert_eq!(
            sanitized,
            vec![PathBuf::from("/ctx/a"), PathBuf::from("/ctx/b")]
        );
    }
}
