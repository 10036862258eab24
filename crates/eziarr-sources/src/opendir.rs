//! Open-directory index scanning.
//!
//! Fetches an auto-generated directory listing (Apache/nginx style) and
//! returns the video files it links to.

use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use eziarr_core::defaults;
use eziarr_core::{Error, Result};

const VIDEO_EXTENSIONS: [&str; 8] = [
    ".mkv", ".mp4", ".avi", ".mov", ".wmv", ".flv", ".webm", ".m4v",
];

/// A video file found in a directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenDirFile {
    pub filename: String,
    pub download_url: String,
    pub ext: String,
}

fn link_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"(?i)<a\s+(?:[^>]*?\s+)?href="([^"]*)""#).expect("link pattern is valid")
    })
}

/// Parse `url`, accepting only http(s) URLs that do not point at this host.
pub fn parse_safe_url(url: &str) -> Result<Url> {
    let parsed = Url::parse(url).map_err(|e| Error::InvalidInput(format!("invalid URL {url}: {e}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(Error::InvalidInput(format!("unsupported URL scheme: {}", parsed.scheme())));
    }
    match parsed.host_str() {
        None => Err(Error::InvalidInput(format!("URL has no host: {url}"))),
        Some("localhost" | "127.0.0.1" | "[::1]") => {
            Err(Error::InvalidInput("local URLs are not allowed".into()))
        }
        Some(_) => Ok(parsed),
    }
}

/// Extract linked video files from an index page served at `base`.
pub fn extract_video_links(html: &str, base: &Url) -> Vec<OpenDirFile> {
    link_pattern()
        .captures_iter(html)
        .filter_map(|caps| {
            let raw = caps.get(1)?.as_str();
            if raw == "../" || raw == "./" || raw.contains('?') {
                return None;
            }
            let absolute = base.join(raw).ok()?;
            let path = absolute.path();
            let ext = path[path.rfind('.')?..].to_ascii_lowercase();
            if !VIDEO_EXTENSIONS.contains(&ext.as_str()) {
                return None;
            }
            let last = raw.rsplit('/').next().filter(|s| !s.is_empty()).unwrap_or("Unknown");
            let filename = urlencoding::decode(last)
                .map(|s| s.into_owned())
                .unwrap_or_else(|_| last.to_string());
            Some(OpenDirFile {
                filename,
                download_url: absolute.to_string(),
                ext,
            })
        })
        .collect()
}

/// Fetches and parses directory listings.
#[derive(Clone)]
pub struct OpenDirScanner {
    client: Client,
}

impl OpenDirScanner {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(defaults::OPENDIR_TIMEOUT_SECS))
            .build()
            .map_err(|e| Error::Internal(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    /// Scan the listing at `url`.
    pub async fn scan(&self, url: &str) -> Result<Vec<OpenDirFile>> {
        let base = parse_safe_url(url)?;

        let html = self
            .client
            .get(base.clone())
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| {
                warn!(subsystem = "sources", component = "opendir", url, error = %e, "Directory fetch failed");
                Error::Request("Failed to scan directory. Is the URL correct?".into())
            })?
            .text()
            .await?;

        let files = extract_video_links(&html, &base);
        debug!(
            subsystem = "sources",
            component = "opendir",
            url,
            file_count = files.len(),
            "Directory scanned"
        );
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INDEX: &str = r#"
        <html><body><h1>Index of /movies/</h1>
        <a href="../">../</a>
        <a href="The%20Matrix%20(1999).mkv">The Matrix (1999).mkv</a>
        <a class="file" href="sub/clip.MP4">clip.MP4</a>
        <a href="notes.txt">notes.txt</a>
        <a href="?C=M;O=A">Last modified</a>
        <a href="http://other.host/abs.webm">abs</a>
        </body></html>
    "#;

    #[test]
    fn test_extract_video_links() {
        let base = Url::parse("http://files.example/movies/").unwrap();
        let files = extract_video_links(INDEX, &base);

        assert_eq!(files.len(), 3);
        assert_eq!(files[0].filename, "The Matrix (1999).mkv");
        assert_eq!(
            files[0].download_url,
            "http://files.example/movies/The%20Matrix%20(1999).mkv"
        );
        assert_eq!(files[1].ext, ".mp4");
        assert_eq!(files[1].download_url, "http://files.example/movies/sub/clip.MP4");
        assert_eq!(files[2].download_url, "http://other.host/abs.webm");
    }

    #[test]
    fn test_first_link_is_not_skipped() {
        let base = Url::parse("http://files.example/").unwrap();
        let files = extract_video_links(r#"<a href="only.mkv">x</a>"#, &base);
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn test_parse_safe_url() {
        assert!(parse_safe_url("https://files.example/a/").is_ok());
        assert!(matches!(parse_safe_url("ftp://files.example/"), Err(Error::InvalidInput(_))));
        assert!(matches!(parse_safe_url("http://localhost:8080/"), Err(Error::InvalidInput(_))));
        assert!(matches!(parse_safe_url("http://127.0.0.1/"), Err(Error::InvalidInput(_))));
        assert!(matches!(parse_safe_url("not a url"), Err(Error::InvalidInput(_))));
    }
}
