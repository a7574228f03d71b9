//! Versioned binary codec for scanned trees.
//!
//! Layout:
//!
//! ```text
//! magic "NXDR" | version u16 BE | path_len u16 LE + root path UTF-8
//! | preorder records | terminator 0xFFFFFFFF | CRC32 (LE)
//! ```
//!
//! Each record is `is_dir u8 | size i64 LE | mtime i64 LE | name_len u16
//! LE + name UTF-8 | child_count u32 LE`, followed by the child records.
//! The checksum covers every byte before it. Any structural problem —
//! short buffer, bad magic, unknown version, checksum mismatch — decodes
//! to an error the cache layer treats as a miss.

use crate::error::CacheError;
use crate::model::{DirTree, Entry, EntryId};
use compact_str::CompactString;
use std::path::PathBuf;

pub const MAGIC: [u8; 4] = *b"NXDR";
pub const VERSION: u16 = 1;
const TERMINATOR: u32 = 0xFFFF_FFFF;

/// Serialise the tree reachable from the root. Detached subtrees are not
/// encoded.
pub fn encode(tree: &DirTree) -> Result<Vec<u8>, CacheError> {
    let mut out = Vec::with_capacity(tree.len() * 32);

    out.extend_from_slice(&MAGIC);
    out.extend_from_slice(&VERSION.to_be_bytes());

    let path = tree.root_path().to_string_lossy();
    write_str(&mut out, path.as_bytes())?;

    encode_entry(tree, tree.root(), &mut out)?;

    out.extend_from_slice(&TERMINATOR.to_le_bytes());

    let checksum = crc32fast::hash(&out);
    out.extend_from_slice(&checksum.to_le_bytes());

    Ok(out)
}

fn write_str(out: &mut Vec<u8>, bytes: &[u8]) -> Result<(), CacheError> {
    let len =
        u16::try_from(bytes.len()).map_err(|_| CacheError::NameTooLong(bytes.len()))?;
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(bytes);
    Ok(())
}

fn encode_entry(tree: &DirTree, id: EntryId, out: &mut Vec<u8>) -> Result<(), CacheError> {
    let entry = tree.node(id);

    out.push(entry.is_dir as u8);
    out.extend_from_slice(&entry.size.to_le_bytes());
    out.extend_from_slice(&entry.mtime.to_le_bytes());
    write_str(out, entry.name.as_bytes())?;

    let child_count = u32::try_from(entry.children.len())
        .map_err(|_| CacheError::Malformed("child count overflow"))?;
    out.extend_from_slice(&child_count.to_le_bytes());

    for &child in &entry.children {
        encode_entry(tree, child, out)?;
    }

    Ok(())
}

/// Deserialise a tree, verifying magic, version, and checksum.
pub fn decode(data: &[u8]) -> Result<DirTree, CacheError> {
    // Enough for magic, version, and the trailing checksum; the reader
    // bounds-checks the rest.
    if data.len() < MAGIC.len() + 2 + 4 + 4 {
        return Err(CacheError::Malformed("truncated stream"));
    }

    if data[..4] != MAGIC {
        return Err(CacheError::BadMagic);
    }

    let version = u16::from_be_bytes([data[4], data[5]]);
    if version != VERSION {
        return Err(CacheError::Version(version));
    }

    let body_len = data.len() - 4;
    let stored = u32::from_le_bytes(
        data[body_len..]
            .try_into()
            .map_err(|_| CacheError::Malformed("truncated checksum"))?,
    );
    if crc32fast::hash(&data[..body_len]) != stored {
        return Err(CacheError::Checksum);
    }

    let mut reader = Reader {
        data: &data[..body_len],
        pos: 6,
    };

    let path_bytes = reader.read_str()?;
    let root_path = PathBuf::from(
        std::str::from_utf8(path_bytes).map_err(|_| CacheError::Malformed("root path UTF-8"))?,
    );

    // Root record: the tree is created from the stored header, then the
    // children stream fills it in preorder.
    let header = reader.read_header()?;
    if !header.is_dir {
        return Err(CacheError::Malformed("root record is not a directory"));
    }

    let mut tree = DirTree::with_root(root_path, header.mtime);
    {
        let root = tree.root();
        let node = tree.node_mut(root);
        node.name = header.name;
        node.size = header.size;
    }

    let root = tree.root();
    decode_children(&mut reader, &mut tree, root, header.child_count)?;

    if reader.read_u32()? != TERMINATOR {
        return Err(CacheError::Malformed("missing terminator"));
    }
    if reader.pos != reader.data.len() {
        return Err(CacheError::Malformed("trailing bytes"));
    }

    Ok(tree)
}

struct RecordHeader {
    is_dir: bool,
    size: i64,
    mtime: i64,
    name: CompactString,
    child_count: u32,
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl Reader<'_> {
    fn take(&mut self, n: usize) -> Result<&[u8], CacheError> {
        if self.pos + n > self.data.len() {
            return Err(CacheError::Malformed("record past end of stream"));
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_u8(&mut self) -> Result<u8, CacheError> {
        Ok(self.take(1)?[0])
    }

    fn read_u16(&mut self) -> Result<u16, CacheError> {
        let bytes = self.take(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    fn read_u32(&mut self) -> Result<u32, CacheError> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn read_i64(&mut self) -> Result<i64, CacheError> {
        let bytes: [u8; 8] = self
            .take(8)?
            .try_into()
            .map_err(|_| CacheError::Malformed("short i64"))?;
        Ok(i64::from_le_bytes(bytes))
    }

    fn read_str(&mut self) -> Result<&[u8], CacheError> {
        let len = self.read_u16()? as usize;
        self.take(len)
    }

    fn read_header(&mut self) -> Result<RecordHeader, CacheError> {
        let is_dir = match self.read_u8()? {
            0 => false,
            1 => true,
            _ => return Err(CacheError::Malformed("invalid entry kind")),
        };
        let size = self.read_i64()?;
        let mtime = self.read_i64()?;
        let name_bytes = self.read_str()?;
        let name = CompactString::new(
            std::str::from_utf8(name_bytes).map_err(|_| CacheError::Malformed("name UTF-8"))?,
        );
        let child_count = self.read_u32()?;

        Ok(RecordHeader {
            is_dir,
            size,
            mtime,
            name,
            child_count,
        })
    }
}

fn decode_children(
    reader: &mut Reader<'_>,
    tree: &mut DirTree,
    parent: EntryId,
    count: u32,
) -> Result<(), CacheError> {
    for _ in 0..count {
        let header = reader.read_header()?;

        let entry = if header.is_dir {
            Entry::new_dir(header.name, header.mtime, None)
        } else {
            Entry::new_file(header.name, header.size, header.mtime, None)
        };

        let id = tree.add_node(entry);
        tree.add_child(parent, id);

        if header.is_dir {
            tree.node_mut(id).size = header.size;
            decode_children(reader, tree, id, header.child_count)?;
        } else if header.child_count != 0 {
            return Err(CacheError::Malformed("file record with children"));
        }
    }

    Ok(())
}
