//! Stringnet Ingest Library
//!
//! Loads a STRING protein-protein interaction network into a flat, delimited
//! edge table. Each edge endpoint is resolved to a display name, a UniProt
//! `represents` identifier, and an alias list built from Entrez gene ids and
//! the Ensembl accession.
//!
//! # Pipeline
//!
//! - [`fetch`]: download and unpack the edge list and mapping files
//! - [`mapping`]: load the name, UniProt and Entrez mapping tables
//! - [`resolver`]: turn a STRING identifier into node columns
//! - [`join`]: stream the edge list, apply cutoffs, write rows
//! - [`writer`]: delimited output staged beside its destination
//! - [`pipeline`]: wire the steps together for one run
//!
//! # Example
//!
//! ```no_run
//! use stringnet_ingest::config::{CutoffOverrides, ProfileSettings};
//! use stringnet_ingest::pipeline;
//! use std::path::Path;
//!
//! fn main() -> stringnet_common::Result<()> {
//!     let settings = ProfileSettings::load(None, "stringnet")?;
//!     let config = settings.pipeline_config(Path::new("./data"), CutoffOverrides::default())?;
//!     let summary = pipeline::run(&config)?;
//!     println!("{} edges written", summary.output.rows);
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod config;
pub mod fetch;
pub mod input;
pub mod join;
pub mod mapping;
pub mod pipeline;
pub mod resolver;
pub mod writer;
