//! Stringnet Common Library
//!
//! Shared error handling, logging setup, and checksums for the STRING loader
//! workspace.
//!
//! - **Error Handling**: [`StringnetError`] and the [`Result`] alias
//! - **Logging**: `tracing` subscriber setup driven by [`logging::LogConfig`]
//! - **Checksums**: digests used to compare output files across runs
//!
//! # Example
//!
//! ```no_run
//! use stringnet_common::checksum::sha256_file;
//! use stringnet_common::Result;
//!
//! fn digest(path: &str) -> Result<String> {
//!     sha256_file(path)
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod checksum;
pub mod error;
pub mod logging;

pub use error::{Result, StringnetError};
