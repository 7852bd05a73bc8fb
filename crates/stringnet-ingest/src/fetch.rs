//! Source file downloads
//!
//! STRING publishes the edge list and mapping files gzip-compressed. Each
//! download is streamed to `<file>.gz`, unpacked to `<file>`, and the archive
//! is removed. URLs that do not end in `.gz` are saved as they are.
//!
//! Both the download and the unpacked file are written to a temporary file
//! beside the destination and renamed into place only when complete, so a
//! failed fetch never leaves a truncated source behind.

use flate2::read::MultiGzDecoder;
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Client;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use stringnet_common::{Result, StringnetError};
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, info_span, warn, Instrument};

const USER_AGENT: &str = concat!("stringnet-ingest/", env!("CARGO_PKG_VERSION"));

/// One file to fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDownload {
    pub url: String,
    /// Final, uncompressed location
    pub path: PathBuf,
}

impl SourceDownload {
    fn is_gzip(&self) -> bool {
        self.url
            .split(['?', '#'])
            .next()
            .is_some_and(|url| url.ends_with(".gz"))
    }
}

/// Download every source in order; the first failure aborts
pub async fn download_sources(downloads: &[SourceDownload]) -> Result<()> {
    let client = Client::builder()
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| StringnetError::network(e.to_string()))?;

    for download in downloads {
        let span = info_span!("download", url = %download.url);
        fetch_source(&client, download).instrument(span).await?;
    }

    info!(files = downloads.len(), "All sources downloaded");
    Ok(())
}

/// Fetch one source, unpacking it when it is gzip-compressed.
/// Returns the size of the final file in bytes.
pub async fn fetch_source(client: &Client, download: &SourceDownload) -> Result<u64> {
    if !download.is_gzip() {
        return download_file(client, &download.url, &download.path).await;
    }

    let archive = archive_path(&download.path);
    download_file(client, &download.url, &archive).await?;

    let (from, to) = (archive.clone(), download.path.clone());
    let unpacked = tokio::task::spawn_blocking(move || gunzip(&from, &to))
        .await
        .map_err(|e| StringnetError::Io(std::io::Error::other(e)))
        .and_then(|result| result);

    let removed = tokio::fs::remove_file(&archive)
        .await
        .map_err(|e| StringnetError::write(&archive, e));
    let size = match (unpacked, removed) {
        (Ok(size), Ok(())) => size,
        (Err(e), removed) => {
            if let Err(cleanup) = removed {
                warn!(error = %cleanup, "Could not remove archive");
            }
            return Err(e);
        },
        (Ok(_), Err(e)) => return Err(e),
    };

    info!(path = %download.path.display(), bytes = size, "Unpacked source");
    Ok(size)
}

/// Stream `url` into `path` with a progress bar
async fn download_file(client: &Client, url: &str, path: &Path) -> Result<u64> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| StringnetError::network(format!("{}: {}", url, e)))?;

    if !response.status().is_success() {
        return Err(StringnetError::network(format!(
            "failed to download {}: {}",
            url,
            response.status()
        )));
    }

    let total_size = response.content_length().unwrap_or(0);
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| url.to_string());
    let pb = download_progress(total_size, &format!("Downloading {}", name));

    let staged = staging_file(path)?;
    let mut file = tokio::fs::File::from_std(
        staged.reopen().map_err(|e| StringnetError::write(path, e))?,
    );
    let mut downloaded = 0u64;
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| StringnetError::network(format!("{}: {}", url, e)))?;
        file.write_all(&chunk)
            .await
            .map_err(|e| StringnetError::write(path, e))?;
        downloaded += chunk.len() as u64;
        pb.set_position(downloaded);
    }
    file.flush().await.map_err(|e| StringnetError::write(path, e))?;
    drop(file);
    persist(staged, path)?;

    pb.finish_with_message(format!("Downloaded {}", name));
    debug!(path = %path.display(), bytes = downloaded, "Download finished");
    Ok(downloaded)
}

/// Decompress `archive` into `target`
fn gunzip(archive: &Path, target: &Path) -> Result<u64> {
    let input = File::open(archive).map_err(|e| StringnetError::read(archive, e))?;
    let staged = staging_file(target)?;

    let mut decoder = MultiGzDecoder::new(BufReader::new(input));
    let mut writer = BufWriter::new(staged);
    let size = std::io::copy(&mut decoder, &mut writer)
        .map_err(|e| StringnetError::read(archive, e))?;
    let staged = writer
        .into_inner()
        .map_err(|e| StringnetError::write(target, e.into_error()))?;

    persist(staged, target)?;
    Ok(size)
}

/// Temporary file in the directory of `path`, deleted unless persisted
fn staging_file(path: &Path) -> Result<NamedTempFile> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    NamedTempFile::new_in(dir).map_err(|e| StringnetError::write(path, e))
}

fn persist(staged: NamedTempFile, path: &Path) -> Result<()> {
    staged
        .as_file()
        .sync_all()
        .map_err(|e| StringnetError::write(path, e))?;
    staged
        .persist(path)
        .map_err(|e| StringnetError::write(path, e.error))?;
    Ok(())
}

/// `<path>.gz`
fn archive_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".gz");
    PathBuf::from(name)
}

fn download_progress(size: u64, message: &str) -> ProgressBar {
    let pb = ProgressBar::new(size);
    let style = ProgressStyle::default_bar()
        .template("{msg}\n{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({eta})")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    pb.set_style(style);
    pb.set_message(message.to_string());
    pb
}
