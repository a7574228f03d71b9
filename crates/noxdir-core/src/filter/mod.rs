//! Composable entry predicates.
//!
//! Two filter families with different lifetimes:
//!
//! - [`FileInfoFilter`] runs during traversal, before a tree node is
//!   created. Rejected entries never enter the tree and never count
//!   toward directory sizes.
//! - [`EntryFilter`] runs over the built tree when a view is rendered.
//!   Rejected entries stay in the tree; they are only hidden.
//!
//! Filter lists evaluate in order; a single rejection excludes the entry.

use crate::error::FilterError;
use crate::model::{DirTree, EntryId};
use crate::platform::FileInfo;
use regex::Regex;

/// Traversal-time predicate over raw platform entries.
pub trait FileInfoFilter: Send + Sync {
    fn applies(&self, info: &FileInfo) -> bool;
}

/// Render-time predicate over built tree entries.
pub trait EntryFilter {
    fn applies(&self, tree: &DirTree, id: EntryId) -> bool;
}

/// Evaluate an entry against a render filter list.
pub fn entry_passes(tree: &DirTree, id: EntryId, filters: &[Box<dyn EntryFilter>]) -> bool {
    filters.iter().all(|f| f.applies(tree, id))
}

/// Drops entries whose name starts with a dot.
pub struct HiddenFilter;

impl FileInfoFilter for HiddenFilter {
    fn applies(&self, info: &FileInfo) -> bool {
        !info.name.starts_with('.')
    }
}

/// Accepts files whose size falls inside `[min, max]`; directories always
/// pass (the band applies to files, directory sizes follow from what
/// survived).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeBand {
    pub min: Option<i64>,
    pub max: Option<i64>,
}

const SIZE_UNITS: [(&str, i64); 5] = [
    ("KB", 1 << 10),
    ("MB", 1 << 20),
    ("GB", 1 << 30),
    ("TB", 1 << 40),
    ("PB", 1 << 50),
];

fn parse_bound(expr: &str, full: &str) -> Result<Option<i64>, FilterError> {
    let expr = expr.trim();
    if expr.is_empty() {
        return Ok(None);
    }

    let upper = expr.to_ascii_uppercase();
    for (suffix, multiplier) in SIZE_UNITS {
        if let Some(value) = upper.strip_suffix(suffix) {
            let value: i64 = value
                .trim()
                .parse()
                .map_err(|_| FilterError::SizeLimit(full.to_string()))?;
            if value < 0 {
                return Err(FilterError::SizeLimit(full.to_string()));
            }
            return Ok(Some(value.saturating_mul(multiplier)));
        }
    }

    Err(FilterError::SizeLimit(full.to_string()))
}

impl SizeBand {
    /// Parse a `"<size><unit>:<size><unit>"` expression where either
    /// bound may be empty: `"1GB:"`, `":10GB"`, `"3MB:20MB"`.
    pub fn parse(expr: &str) -> Result<Self, FilterError> {
        let Some((low, high)) = expr.split_once(':') else {
            return Err(FilterError::SizeLimit(expr.to_string()));
        };

        let band = Self {
            min: parse_bound(low, expr)?,
            max: parse_bound(high, expr)?,
        };

        if let (Some(min), Some(max)) = (band.min, band.max) {
            if min > max {
                return Err(FilterError::SizeLimitInverted(expr.to_string()));
            }
        }

        if band.min.is_none() && band.max.is_none() {
            return Err(FilterError::SizeLimit(expr.to_string()));
        }

        Ok(band)
    }
}

impl FileInfoFilter for SizeBand {
    fn applies(&self, info: &FileInfo) -> bool {
        if info.is_dir {
            return true;
        }

        self.min.is_none_or(|min| info.size >= min)
            && self.max.is_none_or(|max| info.size <= max)
    }
}

/// Keeps directories only.
pub struct DirsOnlyFilter;

impl EntryFilter for DirsOnlyFilter {
    fn applies(&self, tree: &DirTree, id: EntryId) -> bool {
        tree.node(id).is_dir
    }
}

/// Keeps files only.
pub struct FilesOnlyFilter;

impl EntryFilter for FilesOnlyFilter {
    fn applies(&self, tree: &DirTree, id: EntryId) -> bool {
        !tree.node(id).is_dir
    }
}

/// Drops directories whose recursive file count is zero. Requires an
/// aggregation pass to have populated `total_files`; files always pass.
pub struct EmptyDirFilter;

impl EntryFilter for EmptyDirFilter {
    fn applies(&self, tree: &DirTree, id: EntryId) -> bool {
        let entry = tree.node(id);
        !entry.is_dir || entry.total_files > 0
    }
}

/// Name matcher built once from the user's filter input.
///
/// - plain text: case-insensitive substring match;
/// - `\` prefix: negated case-insensitive substring match;
/// - `:` prefix: the rest is a regular expression, matched as-is.
pub enum NameFilter {
    All,
    Substring(String),
    Negated(String),
    Regex(Regex),
}

impl NameFilter {
    pub fn new(input: &str) -> Result<Self, FilterError> {
        if input.is_empty() {
            return Ok(Self::All);
        }
        if let Some(rest) = input.strip_prefix('\\') {
            return Ok(Self::Negated(rest.to_lowercase()));
        }
        if let Some(rest) = input.strip_prefix(':') {
            return Ok(Self::Regex(Regex::new(rest)?));
        }

        Ok(Self::Substring(input.to_lowercase()))
    }
}

impl EntryFilter for NameFilter {
    fn applies(&self, tree: &DirTree, id: EntryId) -> bool {
        let name = tree.node(id).file_name();

        match self {
            Self::All => true,
            Self::Substring(needle) => name.to_lowercase().contains(needle),
            Self::Negated(needle) => !name.to_lowercase().contains(needle),
            Self::Regex(re) => re.is_match(name),
        }
    }
}
