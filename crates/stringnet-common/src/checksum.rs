//! Checksum utilities for output verification
//!
//! The join pass is deterministic, so two runs over the same inputs must
//! produce files with the same digest. The pipeline records these digests in
//! its run summary.

use crate::error::{Result, StringnetError};
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::Path;

/// Hex-encoded SHA-256 of a file
pub fn sha256_file(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    let mut file = std::fs::File::open(path).map_err(|e| StringnetError::read(path, e))?;
    sha256_reader(&mut file).map_err(|e| match e {
        StringnetError::Io(source) => StringnetError::read(path, source),
        other => other,
    })
}

/// Hex-encoded SHA-256 of any readable source
pub fn sha256_reader<R: Read>(reader: &mut R) -> Result<String> {
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    const HELLO_SHA256: &str = "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";

    #[test]
    fn test_sha256_reader() {
        let mut cursor = Cursor::new(b"hello world");
        assert_eq!(sha256_reader(&mut cursor).unwrap(), HELLO_SHA256);
    }

    #[test]
    fn test_sha256_file_matches_reader() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"hello world").unwrap();
        file.flush().unwrap();

        assert_eq!(sha256_file(file.path()).unwrap(), HELLO_SHA256);
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = sha256_file("/nonexistent/edges.tsv").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/edges.tsv"));
    }
}
