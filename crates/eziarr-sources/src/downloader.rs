//! Direct HTTP downloads into the downloads root.
//!
//! Each artifact lands in its own folder named after the file stem:
//! `<root>/<stem>/<filename>`. The sweeper later reclaims these folders.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use futures::StreamExt;
use reqwest::Client;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use eziarr_core::defaults;
use eziarr_core::{Error, Result};

/// Location of a downloaded artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTarget {
    /// Per-artifact folder inside the downloads root.
    pub folder: PathBuf,
    /// Full path of the artifact.
    pub file: PathBuf,
}

/// Replace every character outside `[A-Za-z0-9._-]` with `_`.
pub fn sanitize_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Folder name for a sanitized filename: everything before the last dot.
pub fn folder_name(safe_filename: &str) -> &str {
    match safe_filename.rfind('.') {
        Some(idx) if idx > 0 => &safe_filename[..idx],
        _ => "Unknown",
    }
}

/// Resolve (and create) the target folder for `filename` under `root`.
pub async fn prepare_target(root: &Path, filename: &str) -> Result<DownloadTarget> {
    let safe = sanitize_filename(filename);
    if safe.is_empty() || safe.chars().all(|c| c == '.') {
        return Err(Error::InvalidInput(format!("invalid filename: {filename:?}")));
    }
    let folder = root.join(folder_name(&safe));
    fs::create_dir_all(&folder).await?;
    Ok(DownloadTarget {
        file: folder.join(&safe),
        folder,
    })
}

/// Streams remote files into the downloads root.
#[derive(Clone)]
pub struct HttpDownloader {
    client: Client,
    root: PathBuf,
}

impl HttpDownloader {
    /// Create a downloader writing under `root` with the default timeout.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        Self::with_timeout(root, Duration::from_secs(defaults::DOWNLOAD_TIMEOUT_SECS))
    }

    pub fn with_timeout(root: impl Into<PathBuf>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Internal(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            root: root.into(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Download `url` as `filename`.
    ///
    /// The body is streamed to `<file>.part` and renamed once complete. Any
    /// failure after the transfer starts removes the partial file.
    pub async fn download(&self, url: &str, filename: &str) -> Result<DownloadTarget> {
        let start = Instant::now();
        let target = prepare_target(&self.root, filename).await?;

        info!(
            subsystem = "sources",
            component = "downloader",
            url,
            file = %target.file.display(),
            "Starting HTTP download"
        );

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Request(format!("Download request failed: {}", e)))?;
        if !response.status().is_success() {
            return Err(Error::Request(format!(
                "Download returned {}",
                response.status()
            )));
        }

        let partial = partial_path(&target.file);
        let written = match write_body(response, &partial, &target.file).await {
            Ok(written) => written,
            Err(e) => {
                let _ = fs::remove_file(&partial).await;
                warn!(subsystem = "sources", component = "downloader", error = %e, "Download failed");
                return Err(e);
            }
        };

        info!(
            subsystem = "sources",
            component = "downloader",
            file = %target.file.display(),
            bytes = written,
            duration_ms = start.elapsed().as_millis() as u64,
            "Download complete"
        );
        Ok(target)
    }
}

/// `<file>.part`, next to the final artifact.
pub fn partial_path(file: &Path) -> PathBuf {
    let mut name = file.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

/// Stream `response` into `partial`, then move it to `dest`.
async fn write_body(response: reqwest::Response, partial: &Path, dest: &Path) -> Result<u64> {
    let mut file = fs::File::create(partial).await?;
    let mut stream = response.bytes_stream();
    let mut written: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| Error::Request(format!("Download interrupted: {}", e)))?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.sync_all().await?;
    drop(file);
    fs::rename(partial, dest).await?;
    Ok(written)
}
