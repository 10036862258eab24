//! HTTP client for one media-management service.

use std::time::Instant;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use tracing::{debug, warn};

use eziarr_core::defaults::MISSING_PAGE_SIZE;
use eziarr_core::{
    Error, MediaService, MissingRecord, QualityProfile, QueueItem, ReleaseDecision, ReleasePush,
    Result, Service,
};

use crate::config::ServiceConfig;
use crate::wanted::map_record;

/// Client for a movie, episode or album service.
pub struct ArrClient {
    client: Client,
    service: Service,
    config: ServiceConfig,
}

impl ArrClient {
    /// Create a client for `service` with the given connection settings.
    pub fn new(service: Service, config: ServiceConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| Error::Internal(format!("Failed to create HTTP client: {}", e)))?;

        debug!(
            subsystem = "upstream",
            service = %service,
            base_url = %config.base_url,
            timeout_secs = config.timeout_secs,
            "Initializing service client"
        );

        Ok(Self {
            client,
            service,
            config,
        })
    }

    /// Create a client from `{SERVICE}_URL` / `{SERVICE}_API_KEY`.
    pub fn from_env(service: Service) -> Result<Self> {
        Self::new(service, ServiceConfig::for_service(service))
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        let api_key = self.config.require_api_key(self.service.as_str())?;
        let url = format!(
            "{}{}",
            self.config.base_url,
            self.service.spec().api_path(path)
        );
        Ok(self
            .client
            .request(method, url)
            .header("X-Api-Key", api_key))
    }

    /// Send a request, mapping transport failures and non-2xx answers to
    /// [`Error::Upstream`].
    async fn send(&self, op: &'static str, builder: RequestBuilder) -> Result<Response> {
        let start = Instant::now();
        let response = builder.send().await.map_err(|e| {
            warn!(
                subsystem = "upstream",
                service = %self.service,
                op,
                error = %e,
                "Request failed"
            );
            Error::upstream(self.service, format!("{op} request failed: {e}"))
        })?;

        let status = response.status();
        debug!(
            subsystem = "upstream",
            service = %self.service,
            op,
            status = status.as_u16(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Request complete"
        );

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::upstream(
                self.service,
                format!("{op} returned {status}: {body}"),
            ));
        }
        Ok(response)
    }

    async fn json<T: DeserializeOwned>(&self, op: &'static str, builder: RequestBuilder) -> Result<T> {
        self.send(op, builder)
            .await?
            .json::<T>()
            .await
            .map_err(|e| Error::upstream(self.service, format!("{op} returned invalid JSON: {e}")))
    }
}

fn records(body: &JsonValue) -> &[JsonValue] {
    body.get("records")
        .and_then(JsonValue::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

fn queue_item(service: Service, record: &JsonValue) -> Option<QueueItem> {
    let text = |key: &str| {
        record
            .get(key)
            .and_then(JsonValue::as_str)
            .map(str::to_string)
    };
    Some(QueueItem {
        id: record.get("id").and_then(JsonValue::as_i64)?,
        service,
        service_item_id: record
            .get(service.spec().id_key)
            .and_then(JsonValue::as_i64),
        status: text("status"),
        track_status: text("trackedDownloadStatus"),
        quality: record
            .pointer("/quality/quality/name")
            .and_then(JsonValue::as_str)
            .map(str::to_string),
        timeleft: text("timeleft"),
        indexer: text("indexer"),
        title: text("title"),
    })
}

/// Rejections arrive either as plain strings or as `{reason}` / `{message}` objects.
fn rejection_text(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Object(map) => map
            .get("reason")
            .or_else(|| map.get("message"))
            .and_then(JsonValue::as_str)
            .map(str::to_string),
        _ => None,
    }
}

fn decision(service: Service, body: &JsonValue) -> Result<ReleaseDecision> {
    let first = match body {
        JsonValue::Array(items) => items.first(),
        JsonValue::Object(_) => Some(body),
        _ => None,
    }
    .ok_or_else(|| Error::upstream(service, "release push returned no decision"))?;

    Ok(ReleaseDecision {
        rejected: first
            .get("rejected")
            .and_then(JsonValue::as_bool)
            .unwrap_or(false),
        rejections: first
            .get("rejections")
            .and_then(JsonValue::as_array)
            .map(|items| items.iter().filter_map(rejection_text).collect())
            .unwrap_or_default(),
    })
}

#[async_trait]
impl MediaService for ArrClient {
    fn service(&self) -> Service {
        self.service
    }

    fn ensure_configured(&self) -> Result<()> {
        self.config.require_api_key(self.service.as_str()).map(drop)
    }

    async fn wanted_missing(&self) -> Result<Vec<MissingRecord>> {
        let spec = self.service.spec();
        let mut query: Vec<(&str, String)> = vec![
            ("page", "1".to_string()),
            ("pageSize", MISSING_PAGE_SIZE.to_string()),
            ("sortKey", spec.missing_sort_key.to_string()),
            ("sortDirection", "descending".to_string()),
        ];
        if let Some(include) = spec.missing_include {
            query.push((include, "true".to_string()));
        }

        let body: JsonValue = self
            .json("wanted_missing", self.request(Method::GET, "/wanted/missing")?.query(&query))
            .await?;

        Ok(records(&body)
            .iter()
            .filter_map(|entry| map_record(self.service, entry, &self.config))
            .collect())
    }

    async fn queue(&self) -> Result<Vec<QueueItem>> {
        let body: JsonValue = self
            .json("queue", self.request(Method::GET, "/queue")?)
            .await?;
        Ok(records(&body)
            .iter()
            .filter_map(|record| queue_item(self.service, record))
            .collect())
    }

    async fn remove_from_queue(&self, queue_id: i64) -> Result<()> {
        let builder = self
            .request(Method::DELETE, &format!("/queue/{queue_id}"))?
            .query(&[("removeFromClient", "true"), ("blocklist", "true")]);
        self.send("remove_from_queue", builder).await?;
        Ok(())
    }

    async fn command(&self, body: &JsonValue) -> Result<()> {
        let builder = self.request(Method::POST, "/command")?.json(body);
        self.send("command", builder).await?;
        Ok(())
    }

    async fn push_release(&self, release: &ReleasePush) -> Result<ReleaseDecision> {
        let builder = self.request(Method::POST, "/release/push")?.json(release);
        let body: JsonValue = self.json("push_release", builder).await?;
        decision(self.service, &body)
    }

    async fn quality_profiles(&self) -> Result<Vec<QualityProfile>> {
        self.json("quality_profiles", self.request(Method::GET, "/qualityprofile")?)
            .await
    }

    async fn get_resource(&self, resource: &str, id: i64) -> Result<JsonValue> {
        self.json(
            "get_resource",
            self.request(Method::GET, &format!("/{resource}/{id}"))?,
        )
        .await
    }

    async fn put_resource(&self, resource: &str, id: i64, body: &JsonValue) -> Result<()> {
        let builder = self
            .request(Method::PUT, &format!("/{resource}/{id}"))?
            .json(body);
        self.send("put_resource", builder).await?;
        Ok(())
    }
}
