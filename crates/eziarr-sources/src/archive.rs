//! Public archive search and file listing.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::time::Duration;
use tracing::debug;

use eziarr_core::defaults;
use eziarr_core::{Error, Result};

/// Video formats the archive reports for playable files.
const VIDEO_FORMATS: [&str; 3] = ["MPEG4", "Matroska", "h.264"];

/// One archive item (an identifier grouping several files).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveItem {
    pub id: String,
    pub title: Option<String>,
    pub year: Option<JsonValue>,
    pub downloads: Option<i64>,
    pub details_url: String,
}

/// A downloadable file of an archive item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveFile {
    pub filename: String,
    pub size: Option<String>,
    pub format: Option<String>,
    pub download_url: String,
}

#[derive(Debug, Deserialize)]
struct SearchEnvelope {
    response: SearchDocs,
}

#[derive(Debug, Deserialize)]
struct SearchDocs {
    #[serde(default)]
    docs: Vec<SearchDoc>,
}

#[derive(Debug, Deserialize)]
struct SearchDoc {
    identifier: String,
    title: Option<JsonValue>,
    year: Option<JsonValue>,
    downloads: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct Metadata {
    #[serde(default)]
    files: Vec<MetadataFile>,
    d1: Option<String>,
    d2: Option<String>,
    #[serde(default)]
    dir: String,
}

#[derive(Debug, Deserialize)]
struct MetadataFile {
    name: String,
    format: Option<String>,
    size: Option<String>,
}

impl MetadataFile {
    fn is_video(&self) -> bool {
        self.format
            .as_deref()
            .is_some_and(|f| VIDEO_FORMATS.contains(&f))
            || self.name.ends_with(".mp4")
            || self.name.ends_with(".mkv")
    }
}

/// Archive titles are usually strings but occasionally arrays of strings.
fn title_text(value: Option<JsonValue>) -> Option<String> {
    match value? {
        JsonValue::String(s) => Some(s),
        JsonValue::Array(items) => items.into_iter().find_map(|v| match v {
            JsonValue::String(s) => Some(s),
            _ => None,
        }),
        other => Some(other.to_string()),
    }
}

/// Client for the archive's advanced search and metadata APIs.
#[derive(Clone)]
pub struct ArchiveClient {
    client: Client,
    base_url: String,
}

impl ArchiveClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(defaults::ARR_TIMEOUT_SECS))
            .build()
            .map_err(|e| Error::Internal(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Create from `ARCHIVE_BASE_URL`, defaulting to the public archive.
    pub fn from_env() -> Result<Self> {
        Self::new(
            std::env::var("ARCHIVE_BASE_URL")
                .unwrap_or_else(|_| defaults::ARCHIVE_BASE_URL.to_string()),
        )
    }

    /// Search movie items whose title matches `query`, most downloaded first.
    pub async fn search(&self, query: &str) -> Result<Vec<ArchiveItem>> {
        let q = format!(
            "title:({query}) AND mediaType:(movies) AND \
             (format:MPEG4 OR format:Matroska OR format:h.264 OR format:Unknown)"
        );
        let rows = defaults::ARCHIVE_SEARCH_ROWS.to_string();
        let params = [
            ("q", q.as_str()),
            ("fl[]", "identifier"),
            ("fl[]", "title"),
            ("fl[]", "year"),
            ("fl[]", "format"),
            ("fl[]", "downloads"),
            ("sort[]", "downloads desc"),
            ("rows", rows.as_str()),
            ("page", "1"),
            ("output", "json"),
        ];

        let response = self
            .client
            .get(format!("{}/advancedsearch.php", self.base_url))
            .query(&params)
            .send()
            .await?
            .error_for_status()?;
        let envelope: SearchEnvelope = response.json().await?;

        debug!(
            subsystem = "sources",
            component = "archive",
            query,
            result_count = envelope.response.docs.len(),
            "Archive search complete"
        );

        Ok(envelope
            .response
            .docs
            .into_iter()
            .map(|doc| ArchiveItem {
                details_url: format!("{}/details/{}", self.base_url, doc.identifier),
                id: doc.identifier,
                title: title_text(doc.title),
                year: doc.year,
                downloads: doc.downloads,
            })
            .collect())
    }

    /// Video files of an item, with direct download URLs.
    pub async fn files(&self, identifier: &str) -> Result<Vec<ArchiveFile>> {
        let response = self
            .client
            .get(format!(
                "{}/metadata/{}",
                self.base_url,
                urlencoding::encode(identifier)
            ))
            .send()
            .await?
            .error_for_status()?;
        let metadata: Metadata = response.json().await?;

        let server = metadata
            .d1
            .or(metadata.d2)
            .ok_or_else(|| Error::NotFound(format!("archive item {identifier} has no server")))?;

        Ok(metadata
            .files
            .into_iter()
            .filter(MetadataFile::is_video)
            .map(|f| ArchiveFile {
                download_url: format!("https://{}{}/{}", server, metadata.dir, f.name),
                filename: f.name,
                size: f.size,
                format: f.format,
            })
            .collect())
    }
}
