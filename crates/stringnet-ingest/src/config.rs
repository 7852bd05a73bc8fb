//! Loader configuration
//!
//! Settings live in an INI file with one section per profile, by default
//! `~/.stringnet.conf`:
//!
//! ```ini
//! [stringnet]
//! protein_links_url = https://stringdb-static.org/download/protein.links.full.v11.0/9606.protein.links.full.v11.0.txt.gz
//! names_url = https://string-db.org/mapping_files/STRING_display_names/human.name_2_string.tsv.gz
//! entrez_url = https://stringdb-static.org/mapping_files/entrez/human.entrez_2_string.2018.tsv.gz
//! uniprot_url = https://string-db.org/mapping_files/uniprot/human.uniprot_2_string.2018.tsv.gz
//! links_file = 9606.protein.links.full.v11.0.txt
//! names_file = human.name_2_string.tsv
//! entrez_file = human.entrez_2_string.2018.tsv
//! uniprot_file = human.uniprot_2_string.2018.tsv
//! output_file = 9606.protein.links.full.v11.0.tsv.txt
//! hi_conf_output_file = 9606.protein.links.full.v11.0.hi_conf.tsv.txt
//! cutoff_score = 700
//! hi_conf_cutoff_score = 900
//! ```
//!
//! File names are relative to the data directory given on the command line.
//! Any key can be overridden from the environment as
//! `STRINGNET__<PROFILE>__<KEY>`, and a `.env` file is honoured.

use crate::fetch::SourceDownload;
use crate::join::Cutoffs;
use crate::mapping::{DuplicatePolicy, MappingSources};
use crate::pipeline::PipelineConfig;
use crate::writer::OutputOptions;
use config::{Config, Environment, File, FileFormat, Source};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use stringnet_common::{Result, StringnetError};
use tracing::debug;

// ============================================================================
// Configuration Constants
// ============================================================================

/// Profile used when none is given.
pub const DEFAULT_PROFILE: &str = "stringnet";

/// Configuration file looked up in the home directory when `--conf` is unset.
pub const DEFAULT_CONFIG_FILE: &str = ".stringnet.conf";

/// Default primary cutoff, in STRING's 0-1000 combined score scale.
pub const DEFAULT_CUTOFF_SCORE: f64 = 700.0;

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "STRINGNET";

/// One profile section of the configuration file
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProfileSettings {
    #[serde(default)]
    pub protein_links_url: Option<String>,
    #[serde(default)]
    pub names_url: Option<String>,
    #[serde(default)]
    pub entrez_url: Option<String>,
    #[serde(default)]
    pub uniprot_url: Option<String>,

    pub links_file: String,
    pub names_file: String,
    pub entrez_file: String,
    pub uniprot_file: String,
    pub output_file: String,
    #[serde(default)]
    pub hi_conf_output_file: Option<String>,

    #[serde(default = "default_cutoff_score")]
    pub cutoff_score: f64,
    #[serde(default)]
    pub hi_conf_cutoff_score: Option<f64>,

    /// `tab`, `comma`, `space`, or any single ASCII character
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
    #[serde(default)]
    pub write_header: bool,
    #[serde(default)]
    pub duplicate_names: DuplicatePolicy,
    #[serde(default)]
    pub dedupe_reverse_edges: bool,
}

fn default_cutoff_score() -> f64 {
    DEFAULT_CUTOFF_SCORE
}

fn default_delimiter() -> String {
    "tab".to_string()
}

/// Cutoffs given on the command line, which win over the profile
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CutoffOverrides {
    pub cutoff_score: Option<f64>,
    pub hi_conf_cutoff_score: Option<f64>,
}

/// Default configuration file location (`~/.stringnet.conf`)
pub fn default_config_path() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|home| home.join(DEFAULT_CONFIG_FILE))
        .ok_or_else(|| StringnetError::config("Could not determine home directory"))
}

impl ProfileSettings {
    /// Load `profile` from `conf_file` (or the default file), applying
    /// environment overrides.
    pub fn load(conf_file: Option<&Path>, profile: &str) -> Result<Self> {
        dotenvy::dotenv().ok();

        let path = match conf_file {
            Some(path) => path.to_path_buf(),
            None => default_config_path()?,
        };
        if !path.is_file() {
            return Err(StringnetError::config(format!(
                "configuration file {} not found",
                path.display()
            )));
        }
        debug!(path = %path.display(), profile, "Loading configuration");

        let settings = Config::builder()
            .add_source(File::from(path.as_path()).format(FileFormat::Ini))
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()
            .map_err(|e| StringnetError::config(format!("{}: {}", path.display(), e)))?;

        Self::from_config(&settings, profile)
            .map_err(|e| StringnetError::config(format!("{}: {}", path.display(), e)))
    }

    /// Extract one profile from an already built [`Config`].
    ///
    /// Profile names match case-insensitively. An exact match wins when the
    /// file has sections differing only in case.
    pub fn from_config(settings: &Config, profile: &str) -> std::result::Result<Self, String> {
        let sections = settings.collect().map_err(|e| e.to_string())?;
        let section = sections.get(profile).or_else(|| {
            sections
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(profile))
                .map(|(_, value)| value)
        });

        match section {
            Some(value) => value
                .clone()
                .try_deserialize::<Self>()
                .map_err(|e| format!("profile [{}]: {}", profile, e)),
            None => Err(format!("profile [{}] not found", profile)),
        }
    }

    /// Delimiter byte for the output files
    pub fn delimiter_byte(&self) -> Result<u8> {
        parse_delimiter(&self.delimiter)
    }

    /// Build the pipeline configuration for files under `datadir`
    pub fn pipeline_config(
        &self,
        datadir: &Path,
        overrides: CutoffOverrides,
    ) -> Result<PipelineConfig> {
        let cutoff = overrides.cutoff_score.unwrap_or(self.cutoff_score);
        let hi_conf_cutoff = overrides.hi_conf_cutoff_score.or(self.hi_conf_cutoff_score);

        let high_confidence = match (&self.hi_conf_output_file, hi_conf_cutoff) {
            (Some(file), Some(score)) => Some((datadir.join(file), score)),
            (None, None) => None,
            (Some(_), None) => {
                return Err(StringnetError::config(
                    "hi_conf_output_file is set but hi_conf_cutoff_score is not",
                ))
            },
            (None, Some(_)) => {
                return Err(StringnetError::config(
                    "hi_conf_cutoff_score is set but hi_conf_output_file is not",
                ))
            },
        };

        let cutoffs = Cutoffs::new(cutoff, high_confidence.as_ref().map(|(_, score)| *score))?;

        Ok(PipelineConfig {
            links: datadir.join(&self.links_file),
            mappings: MappingSources {
                names: datadir.join(&self.names_file),
                uniprot: datadir.join(&self.uniprot_file),
                entrez: datadir.join(&self.entrez_file),
            },
            output: datadir.join(&self.output_file),
            high_confidence_output: high_confidence.map(|(path, _)| path),
            cutoffs,
            output_options: OutputOptions {
                delimiter: self.delimiter_byte()?,
                header: self.write_header,
            },
            duplicate_names: self.duplicate_names,
            dedupe_reverse_edges: self.dedupe_reverse_edges,
        })
    }

    /// Download jobs for the four source files; every URL must be configured
    pub fn downloads(&self, datadir: &Path) -> Result<Vec<SourceDownload>> {
        let sources = [
            ("protein_links_url", &self.protein_links_url, &self.links_file),
            ("names_url", &self.names_url, &self.names_file),
            ("entrez_url", &self.entrez_url, &self.entrez_file),
            ("uniprot_url", &self.uniprot_url, &self.uniprot_file),
        ];

        sources
            .into_iter()
            .map(|(key, url, file)| {
                let url = url
                    .as_deref()
                    .ok_or_else(|| StringnetError::config(format!("{} is not set", key)))?;
                Ok(SourceDownload {
                    url: url.to_string(),
                    path: datadir.join(file),
                })
            })
            .collect()
    }
}

/// Parse a delimiter setting into a single byte
pub fn parse_delimiter(value: &str) -> Result<u8> {
    match value.to_lowercase().as_str() {
        "tab" | "\\t" => Ok(b'\t'),
        "comma" => Ok(b','),
        "space" => Ok(b' '),
        _ => match value.as_bytes() {
            [byte] if byte.is_ascii() && *byte != b'\n' && *byte != b'\r' => Ok(*byte),
            _ => Err(StringnetError::config(format!(
                "invalid delimiter '{}', expected tab, comma, space or one ASCII character",
                value
            ))),
        },
    }
}
