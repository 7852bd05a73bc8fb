//! Mapping table loader
//!
//! Parses the three STRING mapping files into lookup tables keyed by protein
//! identifier:
//!
//! - display names (`human.name_2_string.tsv`): one name per protein
//! - UniProt accessions (`human.uniprot_2_string.tsv`): a set per protein
//! - Entrez gene ids (`human.entrez_2_string.tsv`): a set per protein
//!
//! # File Format
//!
//! Each line is either two or three fields, tab-separated when the line has a
//! tab and whitespace-separated otherwise:
//!
//! ```text
//! # NCBI taxid    display name    STRING
//! 9606    ANAPC5    9606.ENSP00000261819      <- taxon, value, identifier
//! ANAPC5  9606.ENSP00000261819                <- names: value, identifier
//! 9606.ENSP00000261819  Q9UJX4                <- xrefs: identifier, value
//! ```
//!
//! Lines starting with `#` are headers. Any other shape, or an empty field, is
//! counted as skipped and never aborts the load.

use crate::input::{open_text, split_fields, Line, LineReader};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use stringnet_common::{Result, StringnetError};
use tracing::{debug, info, info_span, warn};

/// Which value survives when the names file lists one protein more than once
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    /// The last line read replaces earlier ones
    #[default]
    #[serde(alias = "last-wins")]
    Last,
    /// The first line read is kept
    #[serde(alias = "first-wins")]
    First,
}

impl std::str::FromStr for DuplicatePolicy {
    type Err = StringnetError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "last" | "last-wins" => Ok(DuplicatePolicy::Last),
            "first" | "first-wins" => Ok(DuplicatePolicy::First),
            _ => Err(StringnetError::config(format!(
                "Invalid duplicate name policy '{}', expected 'first' or 'last'",
                s
            ))),
        }
    }
}

/// Kind of cross-reference file, which decides how a raw value is split
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XrefKind {
    /// `P84085|ARF5_HUMAN`: only the accession before the first `|` is kept
    Uniprot,
    /// `246721|548644`: every `|`-separated gene id is kept
    Entrez,
}

impl XrefKind {
    fn values<'a>(self, raw: &'a str) -> Vec<&'a str> {
        match self {
            XrefKind::Uniprot => raw.split('|').take(1).collect(),
            XrefKind::Entrez => raw.split('|').collect(),
        }
    }
}

impl std::fmt::Display for XrefKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            XrefKind::Uniprot => write!(f, "uniprot"),
            XrefKind::Entrez => write!(f, "entrez"),
        }
    }
}

/// Counters reported by every loader
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadStats {
    /// Lines read, including headers
    pub lines: u64,
    /// Distinct proteins in the finished table
    pub entries: usize,
    /// Malformed lines that were skipped
    pub skipped: u64,
    /// Lines that named a different value for a protein already seen
    pub conflicts: u64,
}

/// Protein identifier -> display name
#[derive(Debug, Clone, Default)]
pub struct NameTable {
    names: HashMap<String, String>,
}

impl NameTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a display-name file from disk
    pub fn load(path: &Path, policy: DuplicatePolicy) -> Result<(Self, LoadStats)> {
        let _span = info_span!("load_names", path = %path.display()).entered();
        let (table, stats) = Self::from_reader(open_text(path)?, path, policy)?;
        report("display names", path, &stats);
        Ok((table, stats))
    }

    /// Load display names from any buffered reader; `source` names it in errors
    pub fn from_reader<R: BufRead>(
        reader: R,
        source: &Path,
        policy: DuplicatePolicy,
    ) -> Result<(Self, LoadStats)> {
        let mut table = Self::new();
        let mut stats = read_pairs(reader, source, name_fields, |id, name| {
            table.insert(id, name, policy)
        })?;
        stats.entries = table.len();
        Ok((table, stats))
    }

    /// Insert a name; returns true when it disagreed with an existing one
    pub fn insert(&mut self, id: &str, name: &str, policy: DuplicatePolicy) -> bool {
        match self.names.get_mut(id) {
            Some(existing) if existing.as_str() == name => false,
            Some(existing) => {
                debug!(protein = id, kept = ?policy, old = %existing, new = name, "Conflicting display name");
                if policy == DuplicatePolicy::Last {
                    *existing = name.to_string();
                }
                true
            },
            None => {
                self.names.insert(id.to_string(), name.to_string());
                false
            },
        }
    }

    pub fn get(&self, id: &str) -> Option<&str> {
        self.names.get(id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for NameTable {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            names: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Protein identifier -> insertion-ordered set of external identifiers
#[derive(Debug, Clone, Default)]
pub struct XrefTable {
    xrefs: HashMap<String, IndexSet<String>>,
}

impl XrefTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a cross-reference file from disk
    pub fn load(path: &Path, kind: XrefKind) -> Result<(Self, LoadStats)> {
        let _span = info_span!("load_xrefs", %kind, path = %path.display()).entered();
        let (table, stats) = Self::from_reader(open_text(path)?, path, kind)?;
        report(&format!("{} cross-references", kind), path, &stats);
        Ok((table, stats))
    }

    /// Load cross-references from any buffered reader
    pub fn from_reader<R: BufRead>(
        reader: R,
        source: &Path,
        kind: XrefKind,
    ) -> Result<(Self, LoadStats)> {
        let mut table = Self::new();
        let mut stats = read_pairs(reader, source, xref_fields, |id, raw| {
            for value in kind.values(raw).into_iter().filter(|v| !v.is_empty()) {
                table.insert(id, value);
            }
            false
        })?;
        stats.entries = table.len();
        Ok((table, stats))
    }

    pub fn insert(&mut self, id: &str, value: &str) {
        match self.xrefs.get_mut(id) {
            Some(set) => {
                if !set.contains(value) {
                    set.insert(value.to_string());
                }
            },
            None => {
                self.xrefs
                    .insert(id.to_string(), IndexSet::from([value.to_string()]));
            },
        }
    }

    pub fn get(&self, id: &str) -> Option<&IndexSet<String>> {
        self.xrefs.get(id)
    }

    pub fn len(&self) -> usize {
        self.xrefs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.xrefs.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for XrefTable {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut table = Self::new();
        for (id, value) in iter {
            table.insert(&id.into(), &value.into());
        }
        table
    }
}

/// Paths of the three mapping files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingSources {
    pub names: PathBuf,
    pub uniprot: PathBuf,
    pub entrez: PathBuf,
}

/// The three lookup tables, built once and read-only afterwards
#[derive(Debug, Clone, Default)]
pub struct MappingTables {
    pub names: NameTable,
    pub uniprot: XrefTable,
    pub entrez: XrefTable,
}

/// Load statistics for each mapping file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MappingStats {
    pub names: LoadStats,
    pub uniprot: LoadStats,
    pub entrez: LoadStats,
}

impl MappingTables {
    /// Load all three tables; any I/O failure aborts
    pub fn load(sources: &MappingSources, policy: DuplicatePolicy) -> Result<(Self, MappingStats)> {
        let (names, name_stats) = NameTable::load(&sources.names, policy)?;
        let (uniprot, uniprot_stats) = XrefTable::load(&sources.uniprot, XrefKind::Uniprot)?;
        let (entrez, entrez_stats) = XrefTable::load(&sources.entrez, XrefKind::Entrez)?;

        Ok((
            Self {
                names,
                uniprot,
                entrez,
            },
            MappingStats {
                names: name_stats,
                uniprot: uniprot_stats,
                entrez: entrez_stats,
            },
        ))
    }
}

/// Names files: `<name> <id>` or `<taxon> <name> <id>`
fn name_fields<'a>(fields: &[&'a str]) -> Option<(&'a str, &'a str)> {
    match *fields {
        [name, id] | [_, name, id] => Some((id, name)),
        _ => None,
    }
}

/// Cross-reference files: `<id> <xref>` or `<taxon> <xref> <id>`
fn xref_fields<'a>(fields: &[&'a str]) -> Option<(&'a str, &'a str)> {
    match *fields {
        [id, xref] | [_, xref, id] => Some((id, xref)),
        _ => None,
    }
}

/// Drive `insert(id, value)` over every well-formed line; `insert` returns
/// true when the line conflicted with an earlier one.
fn read_pairs<R, L, F>(reader: R, source: &Path, layout: L, mut insert: F) -> Result<LoadStats>
where
    R: BufRead,
    L: for<'a> Fn(&[&'a str]) -> Option<(&'a str, &'a str)>,
    F: FnMut(&str, &str) -> bool,
{
    let mut stats = LoadStats::default();
    let mut lines = LineReader::new(reader);

    while let Some(line) = lines
        .next_line()
        .map_err(|e| StringnetError::read(source, e))?
    {
        stats.lines += 1;

        let text = match line {
            Line::Text(text) => text,
            Line::Invalid => {
                stats.skipped += 1;
                continue;
            },
        };

        if text.trim().is_empty() || text.starts_with('#') {
            continue;
        }

        match layout(split_fields(text).as_slice()) {
            Some((id, value)) if !id.is_empty() && !value.is_empty() => {
                if insert(id, value) {
                    stats.conflicts += 1;
                }
            },
            _ => {
                stats.skipped += 1;
            },
        }
    }

    Ok(stats)
}

fn report(what: &str, path: &Path, stats: &LoadStats) {
    info!(
        entries = stats.entries,
        lines = stats.lines,
        "Loaded {} from {}",
        what,
        path.display()
    );
    if stats.skipped > 0 {
        warn!(skipped = stats.skipped, "Skipped malformed lines in {}", path.display());
    }
    if stats.conflicts > 0 {
        warn!(conflicts = stats.conflicts, "Conflicting entries in {}", path.display());
    }
}
