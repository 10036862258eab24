//! Core traits for eziarr abstractions.
//!
//! These traits define the interfaces that concrete implementations
//! must satisfy: the record store, the settings store, and the upstream
//! services. The background jobs depend only on these, which keeps them
//! testable against in-memory fakes and mock HTTP servers.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value as JsonValue};

use crate::error::{Error, Result};
use crate::models::*;

// =============================================================================
// RECORD STORE TRAITS
// =============================================================================

/// Durable storage for missing-media records.
#[async_trait]
pub trait MissingRecordRepository: Send + Sync {
    /// Insert a record, or refresh `status`, `poster_url` and `release_date`
    /// of an existing one. `last_searched_at` is never touched.
    async fn upsert(&self, record: &MissingRecord) -> Result<()>;

    /// Ids of every stored record.
    async fn all_ids(&self) -> Result<Vec<String>>;

    /// Delete a record. Deleting an absent id is not an error.
    async fn delete(&self, id: &str) -> Result<()>;

    /// Record an automated search at `timestamp_ms`.
    ///
    /// The timestamp only moves forward; an absent id is a no-op.
    async fn mark_searched(&self, id: &str, timestamp_ms: i64) -> Result<()>;

    /// The released record most recently released among those outside the
    /// search cooldown at `now_ms`, if any.
    async fn next_search_candidate(&self, now_ms: i64) -> Result<Option<MissingRecord>>;

    /// Fetch one record.
    async fn get(&self, id: &str) -> Result<Option<MissingRecord>>;

    /// All records, newest release first, undated records last.
    async fn list(&self) -> Result<Vec<MissingRecord>>;
}

/// Flat key/value settings with JSON-encoded values.
#[async_trait]
pub trait SettingsRepository: Send + Sync {
    /// Read one setting.
    async fn get(&self, key: &str) -> Result<Option<JsonValue>>;

    /// Write one setting.
    async fn set(&self, key: &str, value: &JsonValue) -> Result<()>;

    /// Write several settings at once.
    async fn set_many(&self, values: &Map<String, JsonValue>) -> Result<()>;

    /// Every stored setting.
    async fn all(&self) -> Result<Map<String, JsonValue>>;

    /// Read one setting, substituting `default` when absent.
    async fn get_or(&self, key: &str, default: JsonValue) -> Result<JsonValue> {
        Ok(self.get(key).await?.unwrap_or(default))
    }
}

// =============================================================================
// UPSTREAM SERVICE TRAITS
// =============================================================================

/// Client for one media-management service.
#[async_trait]
pub trait MediaService: Send + Sync {
    /// Which service this client talks to.
    fn service(&self) -> Service;

    /// `Error::Config` when the client lacks what it needs to make requests.
    fn ensure_configured(&self) -> Result<()> {
        Ok(())
    }

    /// First page of the wanted/missing listing, mapped to records.
    async fn wanted_missing(&self) -> Result<Vec<MissingRecord>>;

    /// Every entry of the download queue, completed ones included.
    async fn queue(&self) -> Result<Vec<QueueItem>>;

    /// Remove a queue entry from the download client and blocklist its release.
    async fn remove_from_queue(&self, queue_id: i64) -> Result<()>;

    /// Submit a command payload.
    async fn command(&self, body: &JsonValue) -> Result<()>;

    /// Push a release and return the service's first decision.
    async fn push_release(&self, release: &ReleasePush) -> Result<ReleaseDecision>;

    /// Available quality profiles.
    async fn quality_profiles(&self) -> Result<Vec<QualityProfile>>;

    /// Fetch a full resource object (`movie/3`, `series/9`, ...).
    async fn get_resource(&self, resource: &str, id: i64) -> Result<JsonValue>;

    /// Replace a full resource object.
    async fn put_resource(&self, resource: &str, id: i64, body: &JsonValue) -> Result<()>;
}

/// Search against the indexer aggregator.
#[async_trait]
pub trait ReleaseIndexer: Send + Sync {
    /// Releases matching `query` in the category of `media_type`.
    async fn search(&self, query: &str, media_type: MediaType) -> Result<Vec<ReleaseCandidate>>;
}

/// The set of configured media services, keyed by [`Service`].
#[derive(Clone, Default)]
pub struct MediaServices {
    clients: BTreeMap<Service, Arc<dyn MediaService>>,
}

impl MediaServices {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a client under the service it reports.
    pub fn with(mut self, client: Arc<dyn MediaService>) -> Self {
        self.clients.insert(client.service(), client);
        self
    }

    /// Client for `service`, or a configuration error if none is registered.
    pub fn get(&self, service: Service) -> Result<Arc<dyn MediaService>> {
        self.clients
            .get(&service)
            .cloned()
            .ok_or_else(|| Error::Config(format!("{service} is not configured")))
    }

    /// Registered clients in service order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn MediaService>> {
        self.clients.values()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

impl std::fmt::Debug for MediaServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.clients.keys()).finish()
    }
}
