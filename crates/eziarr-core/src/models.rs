//! Domain models for eziarr.
//!
//! The upstream media-management services form a closed set ([`Service`]);
//! everything that differs between them (API version, id field names, command
//! names, which entity owns the quality profile) is described once by a
//! [`ServiceSpec`] instead of being re-derived at every call site.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value as JsonValue};

use crate::defaults;
use crate::error::{Error, Result};

// =============================================================================
// SERVICES
// =============================================================================

/// One of the three upstream media-management services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Service {
    /// Movie service.
    Radarr,
    /// Episode (TV) service.
    Sonarr,
    /// Album (music) service.
    Lidarr,
}

/// Where a service keeps the quality profile of an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileOwner {
    /// The item resource itself carries `qualityProfileId`.
    Item,
    /// A parent resource carries it; the item links to the parent via `parent_key`.
    Parent {
        parent_key: &'static str,
        resource: &'static str,
    },
}

/// Static description of a service's API surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceSpec {
    pub service: Service,
    pub name: &'static str,
    pub api_version: &'static str,
    pub media_type: MediaType,
    /// Field naming the item id in queue records and commands (`movieId`, ...).
    pub id_key: &'static str,
    /// Item resource path segment (`movie`, `episode`, `album`).
    pub item_resource: &'static str,
    pub search_command: &'static str,
    pub scan_command: &'static str,
    /// Sort key for the wanted/missing listing.
    pub missing_sort_key: &'static str,
    /// Extra flag asking the listing to embed the parent entity.
    pub missing_include: Option<&'static str>,
    /// Image `coverType` used as the poster.
    pub cover_type: &'static str,
    pub profile_owner: ProfileOwner,
    /// Environment variable prefix for URL and API key.
    pub env_prefix: &'static str,
    pub default_url: &'static str,
}

const RADARR: ServiceSpec = ServiceSpec {
    service: Service::Radarr,
    name: "radarr",
    api_version: "v3",
    media_type: MediaType::Movie,
    id_key: "movieId",
    item_resource: "movie",
    search_command: "MoviesSearch",
    scan_command: "DownloadedMoviesScan",
    missing_sort_key: "releaseDate",
    missing_include: None,
    cover_type: "poster",
    profile_owner: ProfileOwner::Item,
    env_prefix: "RADARR",
    default_url: defaults::RADARR_URL,
};

const SONARR: ServiceSpec = ServiceSpec {
    service: Service::Sonarr,
    name: "sonarr",
    api_version: "v3",
    media_type: MediaType::Episode,
    id_key: "episodeId",
    item_resource: "episode",
    search_command: "EpisodeSearch",
    scan_command: "DownloadedEpisodesScan",
    missing_sort_key: "airDateUtc",
    missing_include: Some("includeSeries"),
    cover_type: "poster",
    profile_owner: ProfileOwner::Parent {
        parent_key: "seriesId",
        resource: "series",
    },
    env_prefix: "SONARR",
    default_url: defaults::SONARR_URL,
};

const LIDARR: ServiceSpec = ServiceSpec {
    service: Service::Lidarr,
    name: "lidarr",
    api_version: "v1",
    media_type: MediaType::Album,
    id_key: "albumId",
    item_resource: "album",
    search_command: "AlbumSearch",
    scan_command: "DownloadedAlbumsScan",
    missing_sort_key: "releaseDate",
    missing_include: Some("includeArtist"),
    cover_type: "cover",
    profile_owner: ProfileOwner::Parent {
        parent_key: "artistId",
        resource: "artist",
    },
    env_prefix: "LIDARR",
    default_url: defaults::LIDARR_URL,
};

impl Service {
    /// All services, in sync order.
    pub const ALL: [Service; 3] = [Service::Radarr, Service::Sonarr, Service::Lidarr];

    /// Static API description of this service.
    pub fn spec(self) -> &'static ServiceSpec {
        match self {
            Service::Radarr => &RADARR,
            Service::Sonarr => &SONARR,
            Service::Lidarr => &LIDARR,
        }
    }

    pub fn as_str(self) -> &'static str {
        self.spec().name
    }

    pub fn media_type(self) -> MediaType {
        self.spec().media_type
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Service {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "radarr" => Ok(Service::Radarr),
            "sonarr" => Ok(Service::Sonarr),
            "lidarr" => Ok(Service::Lidarr),
            other => Err(Error::InvalidInput(format!("unknown service: {other}"))),
        }
    }
}

impl ServiceSpec {
    /// `/api/{version}{path}` for this service.
    pub fn api_path(&self, path: &str) -> String {
        format!("/api/{}{}", self.api_version, path)
    }

    /// Command payload that asks the service to search for one item.
    pub fn search_command(&self, item_id: i64) -> JsonValue {
        let mut body = Map::new();
        body.insert("name".into(), json!(self.search_command));
        body.insert(format!("{}s", self.id_key), json!([item_id]));
        JsonValue::Object(body)
    }

    /// Command payload that asks the service to import a downloaded path.
    ///
    /// Only the movie service accepts an explicit item id; the others match
    /// the file by name.
    pub fn scan_command(&self, path: &str, item_id: i64) -> JsonValue {
        let mut body = Map::new();
        body.insert("name".into(), json!(self.scan_command));
        body.insert("path".into(), json!(path));
        body.insert("importMode".into(), json!(defaults::IMPORT_MODE));
        if self.service == Service::Radarr {
            body.insert(self.id_key.into(), json!(item_id));
        }
        JsonValue::Object(body)
    }
}

// =============================================================================
// MISSING RECORDS
// =============================================================================

/// Kind of content a record represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Movie,
    Episode,
    Album,
}

impl MediaType {
    pub fn as_str(self) -> &'static str {
        match self {
            MediaType::Movie => "movie",
            MediaType::Episode => "episode",
            MediaType::Album => "album",
        }
    }

    /// Indexer category used when searching the aggregator for this type.
    pub fn indexer_category(self) -> u32 {
        match self {
            MediaType::Movie => 2000,
            MediaType::Episode => 5000,
            MediaType::Album => 3000,
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "movie" => Ok(MediaType::Movie),
            "episode" => Ok(MediaType::Episode),
            "album" => Ok(MediaType::Album),
            other => Err(Error::InvalidInput(format!("unknown media type: {other}"))),
        }
    }
}

/// Composite record id: `{service}-{serviceItemId}`.
pub fn record_id(service: Service, service_item_id: i64) -> String {
    format!("{}-{}", service, service_item_id)
}

/// Split a composite record id back into its service and upstream id.
pub fn parse_record_id(id: &str) -> Result<(Service, i64)> {
    let (service, item) = id
        .split_once('-')
        .ok_or_else(|| Error::InvalidInput(format!("malformed record id: {id}")))?;
    let item_id = item
        .parse::<i64>()
        .map_err(|_| Error::InvalidInput(format!("malformed record id: {id}")))?;
    Ok((service.parse()?, item_id))
}

/// One unit of content absent from the library, mirrored from an upstream service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MissingRecord {
    pub id: String,
    #[serde(rename = "serviceId", alias = "serviceItemId")]
    pub service_item_id: i64,
    pub title: String,
    pub series_title: Option<String>,
    #[serde(rename = "type")]
    pub media_type: MediaType,
    pub service: Service,
    /// ISO-8601 date string as reported upstream.
    pub release_date: Option<String>,
    pub poster_url: Option<String>,
    /// Epoch milliseconds of the last automated search.
    pub last_searched_at: Option<i64>,
    pub status: String,
}

impl MissingRecord {
    /// Create a record with the composite id derived from service and item id.
    pub fn new(service: Service, service_item_id: i64, title: impl Into<String>) -> Self {
        Self {
            id: record_id(service, service_item_id),
            service_item_id,
            title: title.into(),
            series_title: None,
            media_type: service.media_type(),
            service,
            release_date: None,
            poster_url: None,
            last_searched_at: None,
            status: "missing".to_string(),
        }
    }

    pub fn with_release_date(mut self, date: Option<String>) -> Self {
        self.release_date = date;
        self
    }

    pub fn with_series_title(mut self, title: Option<String>) -> Self {
        self.series_title = title;
        self
    }

    pub fn with_poster_url(mut self, url: Option<String>) -> Self {
        self.poster_url = url;
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }
}

// =============================================================================
// QUEUE, PROFILES, RELEASES
// =============================================================================

/// An entry of a service's download queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueItem {
    /// Queue entry id (used for deletion).
    pub id: i64,
    pub service: Service,
    /// Item the entry downloads (`movieId` / `episodeId` / `albumId`).
    #[serde(rename = "serviceId")]
    pub service_item_id: Option<i64>,
    pub status: Option<String>,
    pub track_status: Option<String>,
    pub quality: Option<String>,
    pub timeleft: Option<String>,
    pub indexer: Option<String>,
    pub title: Option<String>,
}

impl QueueItem {
    pub fn is_completed(&self) -> bool {
        self.status.as_deref() == Some("completed")
    }
}

/// A quality profile as listed by a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityProfile {
    pub id: i64,
    pub name: String,
}

/// Release push request body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleasePush {
    pub title: String,
    pub download_url: String,
    pub protocol: String,
    /// ISO-8601 timestamp.
    pub publish_date: String,
}

impl ReleasePush {
    /// Build a push for the fixed protocol tag stamped with the current time.
    pub fn now(title: impl Into<String>, download_url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            download_url: download_url.into(),
            protocol: defaults::RELEASE_PROTOCOL.to_string(),
            publish_date: chrono::Utc::now()
                .format("%Y-%m-%dT%H:%M:%S%.3fZ")
                .to_string(),
        }
    }
}

/// A service's verdict on a pushed release.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseDecision {
    #[serde(default)]
    pub rejected: bool,
    #[serde(default)]
    pub rejections: Vec<String>,
}

/// A release returned by the indexer aggregator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseCandidate {
    pub title: String,
    pub size: Option<i64>,
    pub indexer: Option<String>,
    pub seeders: Option<i64>,
    pub leechers: Option<i64>,
    /// Age in days.
    pub age: Option<i64>,
    pub download_url: Option<String>,
    pub guid: Option<String>,
}

// =============================================================================
// GRAB PROTOCOL
// =============================================================================

/// Request to commit a specific release to a service's download pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrabRequest {
    pub service: Service,
    #[serde(alias = "serviceItemId")]
    pub service_id: i64,
    pub title: String,
    pub download_url: String,
}

/// Structured result of the grab protocol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrabOutcome {
    pub success: bool,
    pub message: String,
}

impl GrabOutcome {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

// =============================================================================
// SETTINGS AND WORKER CONFIG
// =============================================================================

/// Keys of the settings table read by the core.
pub mod setting_keys {
    pub const SYNC_ENABLED: &str = "syncEnabled";
    pub const HUNTER_ENABLED: &str = "hunterEnabled";
    pub const SYNC_INTERVAL: &str = "syncInterval";
    pub const HUNTER_INTERVAL: &str = "hunterInterval";
    pub const TELEGRAM_API_ID: &str = "telegramApiId";
    pub const TELEGRAM_API_HASH: &str = "telegramApiHash";
    pub const TELEGRAM_SESSION: &str = "telegram_session";
    /// Phone-code hash between requesting a login code and signing in.
    pub const TELEGRAM_LOGIN_HASH: &str = "telegram_temp_hash";
    pub const TELEGRAM_LOGIN_PHONE: &str = "telegram_temp_phone";
    pub const PATH_MAP_LOCAL: &str = "pathMapDocker";
    pub const PATH_MAP_REMOTE: &str = "pathMapRemote";
}

/// Values written to a fresh settings table.
pub fn default_settings() -> Vec<(&'static str, JsonValue)> {
    vec![
        (setting_keys::SYNC_ENABLED, json!(true)),
        (setting_keys::HUNTER_ENABLED, json!(true)),
        (
            setting_keys::SYNC_INTERVAL,
            json!(defaults::SYNC_INTERVAL_MINUTES),
        ),
        (
            setting_keys::HUNTER_INTERVAL,
            json!(defaults::HUNTER_INTERVAL_SEED_MINUTES),
        ),
        (setting_keys::TELEGRAM_API_ID, json!("")),
        (setting_keys::TELEGRAM_API_HASH, json!("")),
        (setting_keys::PATH_MAP_LOCAL, json!("")),
        (setting_keys::PATH_MAP_REMOTE, json!("")),
    ]
}

/// Snapshot of the settings that drive the two recurring timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerConfig {
    pub sync_enabled: bool,
    pub hunter_enabled: bool,
    /// Minutes between sync passes.
    pub sync_interval: u64,
    /// Minutes between hunter runs.
    pub hunter_interval: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            sync_enabled: true,
            hunter_enabled: true,
            sync_interval: defaults::SYNC_INTERVAL_MINUTES,
            hunter_interval: defaults::HUNTER_INTERVAL_MINUTES,
        }
    }
}

impl WorkerConfig {
    /// Derive the snapshot from a full settings map.
    pub fn from_settings(settings: &Map<String, JsonValue>) -> Self {
        Self {
            sync_enabled: flag(settings.get(setting_keys::SYNC_ENABLED)),
            hunter_enabled: flag(settings.get(setting_keys::HUNTER_ENABLED)),
            sync_interval: minutes(
                settings.get(setting_keys::SYNC_INTERVAL),
                defaults::SYNC_INTERVAL_MINUTES,
            ),
            hunter_interval: minutes(
                settings.get(setting_keys::HUNTER_INTERVAL),
                defaults::HUNTER_INTERVAL_MINUTES,
            ),
        }
    }

    pub fn sync_period(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.sync_interval.saturating_mul(60))
    }

    pub fn hunter_period(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.hunter_interval.saturating_mul(60))
    }
}

/// Absent or null means enabled; otherwise the value's truthiness.
fn flag(value: Option<&JsonValue>) -> bool {
    match value {
        None | Some(JsonValue::Null) => true,
        Some(JsonValue::Bool(b)) => *b,
        Some(JsonValue::Number(n)) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Some(JsonValue::String(s)) => {
            let s = s.trim();
            !(s.is_empty() || s == "0" || s.eq_ignore_ascii_case("false"))
        }
        Some(_) => true,
    }
}

/// Integer coercion of an interval. Non-positive, unparseable or longer than
/// [`defaults::MAX_INTERVAL_MINUTES`] falls back.
fn minutes(value: Option<&JsonValue>, fallback: u64) -> u64 {
    let parsed = match value {
        Some(JsonValue::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Some(JsonValue::String(s)) => leading_integer(s),
        _ => None,
    };
    match parsed {
        Some(n) if n > 0 && n as u64 <= defaults::MAX_INTERVAL_MINUTES => n as u64,
        _ => fallback,
    }
}

/// Parse the leading decimal integer of a string (`"15m"` -> 15).
fn leading_integer(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let (sign, digits) = match s.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, s.strip_prefix('+').unwrap_or(s)),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    digits[..end].parse::<i64>().ok().map(|n| sign * n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_id_round_trip() {
        let id = record_id(Service::Radarr, 42);
        assert_eq!(id, "radarr-42");
        assert_eq!(parse_record_id(&id).unwrap(), (Service::Radarr, 42));
    }

    #[test]
    fn test_parse_record_id_rejects_garbage() {
        assert!(parse_record_id("radarr").is_err());
        assert!(parse_record_id("plex-1").is_err());
        assert!(parse_record_id("sonarr-abc").is_err());
    }

    #[test]
    fn test_service_from_str() {
        assert_eq!("Sonarr".parse::<Service>().unwrap(), Service::Sonarr);
        assert!(matches!(
            "plex".parse::<Service>(),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_search_command_per_service() {
        assert_eq!(
            Service::Radarr.spec().search_command(7),
            json!({"name": "MoviesSearch", "movieIds": [7]})
        );
        assert_eq!(
            Service::Sonarr.spec().search_command(8),
            json!({"name": "EpisodeSearch", "episodeIds": [8]})
        );
        assert_eq!(
            Service::Lidarr.spec().search_command(9),
            json!({"name": "AlbumSearch", "albumIds": [9]})
        );
    }

    #[test]
    fn test_scan_command_only_movies_carry_id() {
        let movie = Service::Radarr.spec().scan_command("C:\\Imports\\M", 3);
        assert_eq!(movie["movieId"], json!(3));
        assert_eq!(movie["importMode"], json!("Move"));

        let episode = Service::Sonarr.spec().scan_command("/imports/E", 4);
        assert_eq!(episode["name"], json!("DownloadedEpisodesScan"));
        assert!(episode.get("episodeId").is_none());
    }

    #[test]
    fn test_api_path_uses_service_version() {
        assert_eq!(Service::Radarr.spec().api_path("/queue"), "/api/v3/queue");
        assert_eq!(Service::Lidarr.spec().api_path("/queue"), "/api/v1/queue");
    }

    #[test]
    fn test_missing_record_serializes_camel_case() {
        let record = MissingRecord::new(Service::Sonarr, 5, "Show - S01E02")
            .with_series_title(Some("Show".into()));
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["id"], json!("sonarr-5"));
        assert_eq!(value["serviceId"], json!(5));
        assert_eq!(value["type"], json!("episode"));
        assert_eq!(value["seriesTitle"], json!("Show"));
    }

    #[test]
    fn test_worker_config_defaults_when_empty() {
        let config = WorkerConfig::from_settings(&Map::new());
        assert_eq!(config, WorkerConfig::default());
        assert_eq!(config.sync_interval, 10);
        assert_eq!(config.hunter_interval, 1);
    }

    #[test]
    fn test_worker_config_coerces_values() {
        let mut settings = Map::new();
        settings.insert("syncEnabled".into(), json!(false));
        settings.insert("hunterEnabled".into(), json!("false"));
        settings.insert("syncInterval".into(), json!("30"));
        settings.insert("hunterInterval".into(), json!(2.9));
        let config = WorkerConfig::from_settings(&settings);
        assert!(!config.sync_enabled);
        assert!(!config.hunter_enabled);
        assert_eq!(config.sync_interval, 30);
        assert_eq!(config.hunter_interval, 2);
    }

    #[test]
    fn test_worker_config_invalid_intervals_fall_back() {
        let mut settings = Map::new();
        settings.insert("syncInterval".into(), json!("soon"));
        settings.insert("hunterInterval".into(), json!(0));
        let config = WorkerConfig::from_settings(&settings);
        assert_eq!(config.sync_interval, 10);
        assert_eq!(config.hunter_interval, 1);
    }

    #[test]
    fn test_worker_config_huge_interval_falls_back() {
        let mut settings = Map::new();
        settings.insert("syncInterval".into(), json!(1_000_000_000_000_000_000_i64));
        settings.insert("hunterInterval".into(), json!(1e300));
        let config = WorkerConfig::from_settings(&settings);
        assert_eq!(config.sync_interval, 10);
        assert_eq!(config.hunter_interval, 1);
        assert_eq!(config.sync_period(), std::time::Duration::from_secs(600));

        settings.insert("syncInterval".into(), json!(7 * 24 * 60));
        let config = WorkerConfig::from_settings(&settings);
        assert_eq!(config.sync_interval, 7 * 24 * 60);
    }

    #[test]
    fn test_period_saturates() {
        let config = WorkerConfig {
            hunter_interval: u64::MAX,
            ..WorkerConfig::default()
        };
        assert_eq!(config.hunter_period(), std::time::Duration::from_secs(u64::MAX));
    }

    #[test]
    fn test_leading_integer() {
        assert_eq!(leading_integer("15m"), Some(15));
        assert_eq!(leading_integer("  -3"), Some(-3));
        assert_eq!(leading_integer("x1"), None);
    }

    #[test]
    fn test_worker_config_equality_is_structural() {
        let a = WorkerConfig::default();
        let b = WorkerConfig {
            hunter_interval: 1,
            ..WorkerConfig::default()
        };
        assert_eq!(a, b);
        assert_ne!(
            a,
            WorkerConfig {
                sync_enabled: false,
                ..a
            }
        );
    }
}
