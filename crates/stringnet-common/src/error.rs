//! Error types for the STRING loader

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for loader operations
pub type Result<T> = std::result::Result<T, StringnetError>;

/// Main error type for the loader
///
/// Every variant is fatal to the run that raised it. Malformed input lines are
/// not errors; they are counted by the component that skipped them.
#[derive(Error, Debug)]
pub enum StringnetError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Duplicate edge {protein1} - {protein2} with different scores: {first} vs {second}")]
    DuplicateEdge {
        protein1: String,
        protein2: String,
        first: String,
        second: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),
}

impl StringnetError {
    /// Wrap an I/O error raised while reading `path`
    pub fn read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Read {
            path: path.into(),
            source,
        }
    }

    /// Wrap an I/O error raised while writing `path`
    pub fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Write {
            path: path.into(),
            source,
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a network error
    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_error_names_the_file() {
        let err = StringnetError::read(
            "/data/human.name_2_string.tsv",
            std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        );
        let msg = err.to_string();
        assert!(msg.contains("/data/human.name_2_string.tsv"));
        assert!(msg.contains("no such file"));
    }

    #[test]
    fn test_duplicate_edge_message() {
        let err = StringnetError::DuplicateEdge {
            protein1: "9606.A".to_string(),
            protein2: "9606.B".to_string(),
            first: "900".to_string(),
            second: "850".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Duplicate edge 9606.A - 9606.B with different scores: 900 vs 850"
        );
    }
}
