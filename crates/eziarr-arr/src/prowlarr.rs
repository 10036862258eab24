//! Indexer aggregator client.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};

use eziarr_core::{Error, MediaType, ReleaseCandidate, ReleaseIndexer, Result};

use crate::config::ServiceConfig;

/// Raw search result. Only the fields surfaced to callers are read.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResult {
    #[serde(default)]
    title: String,
    size: Option<i64>,
    indexer: Option<String>,
    seeders: Option<i64>,
    leechers: Option<i64>,
    age: Option<i64>,
    download_url: Option<String>,
    magnet_url: Option<String>,
    guid: Option<String>,
}

impl From<SearchResult> for ReleaseCandidate {
    fn from(r: SearchResult) -> Self {
        ReleaseCandidate {
            title: r.title,
            size: r.size,
            indexer: r.indexer,
            seeders: r.seeders,
            leechers: r.leechers,
            age: r.age,
            download_url: r.download_url.filter(|u| !u.is_empty()).or(r.magnet_url),
            guid: r.guid,
        }
    }
}

/// Client for the aggregating indexer search API.
pub struct IndexerClient {
    client: Client,
    config: ServiceConfig,
}

impl IndexerClient {
    pub fn new(config: ServiceConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| Error::Internal(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    /// Create from `PROWLARR_URL` / `PROWLARR_API_KEY`.
    pub fn from_env() -> Result<Self> {
        Self::new(ServiceConfig::indexer_from_env())
    }
}

#[async_trait]
impl ReleaseIndexer for IndexerClient {
    async fn search(&self, query: &str, media_type: MediaType) -> Result<Vec<ReleaseCandidate>> {
        let api_key = self.config.require_api_key("prowlarr")?;
        let category = media_type.indexer_category().to_string();

        debug!(
            subsystem = "upstream",
            component = "indexer",
            query,
            category = %category,
            "Searching indexers"
        );

        let response = self
            .client
            .get(format!("{}/api/v1/search", self.config.base_url))
            .header("X-Api-Key", api_key)
            .query(&[("query", query), ("categories", category.as_str()), ("type", "search")])
            .send()
            .await
            .map_err(|e| Error::Request(format!("Indexer search failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Request(format!(
                "Indexer search returned {}: {}",
                status, body
            )));
        }

        let results: Vec<SearchResult> = response
            .json()
            .await
            .map_err(|e| Error::Request(format!("Failed to parse indexer response: {}", e)))?;

        let mut candidates: Vec<ReleaseCandidate> = results.into_iter().map(Into::into).collect();
        candidates.sort_by(|a, b| b.seeders.unwrap_or(0).cmp(&a.seeders.unwrap_or(0)));

        info!(
            subsystem = "upstream",
            component = "indexer",
            result_count = candidates.len(),
            "Indexer search complete"
        );
        Ok(candidates)
    }
}
