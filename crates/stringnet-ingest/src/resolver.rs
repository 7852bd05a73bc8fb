//! Identifier resolution
//!
//! Turns a STRING protein identifier into the three node columns of an output
//! row: display name, `represents` and aliases. Resolution is total; a protein
//! missing from a table gets that column's fallback instead of an error.
//!
//! | column         | found                               | missing                  |
//! |----------------|-------------------------------------|--------------------------|
//! | display name   | name from the names table           | the raw identifier       |
//! | represents     | `uniprot:<first accession>`         | empty                    |
//! | aliases        | `ncbigene:<id>|...|ensembl:<acc>`   | `ensembl:<acc>`          |

use crate::mapping::{MappingTables, NameTable, XrefTable};
use indexmap::IndexSet;

pub const UNIPROT_PREFIX: &str = "uniprot:";
pub const NCBI_GENE_PREFIX: &str = "ncbigene:";
pub const ENSEMBL_PREFIX: &str = "ensembl:";
pub const ALIAS_SEPARATOR: char = '|';

/// Node columns for one endpoint of an edge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedProtein<'a> {
    pub display_name: &'a str,
    pub represents: String,
    pub aliases: String,
}

/// Accession part of an identifier: `9606.ENSP00000261819` -> `ENSP00000261819`.
/// Identifiers without a taxon prefix are returned unchanged.
pub fn accession(id: &str) -> &str {
    match id.split_once('.') {
        Some((_, rest)) if !rest.is_empty() => rest,
        _ => id,
    }
}

/// Resolve one identifier against the three tables.
///
/// Each table is consulted with the full identifier first and then with its
/// accession, so tables keyed either way resolve the same.
pub fn resolve<'a>(
    id: &'a str,
    names: &'a NameTable,
    uniprot: &XrefTable,
    entrez: &XrefTable,
) -> ResolvedProtein<'a> {
    let acc = accession(id);

    let display_name = names
        .get(id)
        .or_else(|| names.get(acc))
        .unwrap_or(id);

    let represents = lookup(uniprot, id, acc)
        .and_then(|set| set.first())
        .map(|uniprot_id| format!("{}{}", UNIPROT_PREFIX, uniprot_id))
        .unwrap_or_default();

    let mut aliases = String::new();
    for gene_id in lookup(entrez, id, acc).into_iter().flatten() {
        aliases.push_str(NCBI_GENE_PREFIX);
        aliases.push_str(gene_id);
        aliases.push(ALIAS_SEPARATOR);
    }
    aliases.push_str(ENSEMBL_PREFIX);
    aliases.push_str(acc);

    ResolvedProtein {
        display_name,
        represents,
        aliases,
    }
}

fn lookup<'t>(table: &'t XrefTable, id: &str, acc: &str) -> Option<&'t IndexSet<String>> {
    table.get(id).or_else(|| table.get(acc))
}

impl MappingTables {
    /// Resolve `id` against these tables
    pub fn resolve<'a>(&'a self, id: &'a str) -> ResolvedProtein<'a> {
        resolve(id, &self.names, &self.uniprot, &self.entrez)
    }
}
