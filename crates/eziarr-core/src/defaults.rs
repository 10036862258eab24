//! Centralized default constants for eziarr.
//!
//! **This module is the single source of truth** for shared default values.
//! Crates reference these constants instead of defining their own magic
//! numbers. Organized by domain area.

// =============================================================================
// UPSTREAM SERVICES
// =============================================================================

/// Default Radarr base URL.
pub const RADARR_URL: &str = "http://localhost:7878";

/// Default Sonarr base URL.
pub const SONARR_URL: &str = "http://localhost:8989";

/// Default Lidarr base URL.
pub const LIDARR_URL: &str = "http://localhost:8686";

/// Default Prowlarr base URL.
pub const PROWLARR_URL: &str = "http://localhost:9696";

/// Per-request timeout for upstream service calls in seconds.
pub const ARR_TIMEOUT_SECS: u64 = 30;

/// Page size for the wanted/missing listing. Only the first page is read.
pub const MISSING_PAGE_SIZE: u32 = 100;

/// Protocol tag sent with every release push.
pub const RELEASE_PROTOCOL: &str = "Torrent";

/// Name of the permissive quality profile the grab protocol switches to.
pub const ANY_PROFILE_NAME: &str = "any";

/// Delay between a corrective action and the second release push (ms).
pub const GRAB_SETTLE_DELAY_MS: u64 = 1_000;

/// Import mode used for downloaded-scan commands.
pub const IMPORT_MODE: &str = "Move";

// =============================================================================
// HUNTER
// =============================================================================

/// Minimum time between two automated searches of the same record (24 hours).
pub const SEARCH_COOLDOWN_MS: i64 = 24 * 60 * 60 * 1000;

// =============================================================================
// SCHEDULER
// =============================================================================

/// Sync interval in minutes when the setting is absent or invalid.
pub const SYNC_INTERVAL_MINUTES: u64 = 10;

/// Hunter interval in minutes when the setting is absent or invalid.
pub const HUNTER_INTERVAL_MINUTES: u64 = 1;

/// Hunter interval seeded into a fresh settings table.
pub const HUNTER_INTERVAL_SEED_MINUTES: u64 = 15;

/// Longest accepted sync or hunter interval (one week); anything above falls back.
pub const MAX_INTERVAL_MINUTES: u64 = 7 * 24 * 60;

/// How often settings are re-read for changes, in seconds.
pub const SETTINGS_POLL_INTERVAL_SECS: u64 = 10;

/// Event broadcast channel capacity.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

// =============================================================================
// HOUSEKEEPING
// =============================================================================

/// Interval between download sweeps in seconds (1 hour).
pub const SWEEP_INTERVAL_SECS: u64 = 60 * 60;

/// Age after which downloaded artifacts are deleted in seconds (24 hours).
pub const DOWNLOAD_RETENTION_SECS: u64 = 24 * 60 * 60;

/// Default downloads root, relative to the working directory.
pub const DOWNLOAD_DIR: &str = "downloads";

// =============================================================================
// SOURCES
// =============================================================================

/// Timeout for HTTP file downloads in seconds.
pub const DOWNLOAD_TIMEOUT_SECS: u64 = 30;

/// Timeout for open-directory index fetches in seconds.
pub const OPENDIR_TIMEOUT_SECS: u64 = 15;

/// Default public archive base URL.
pub const ARCHIVE_BASE_URL: &str = "https://archive.org";

/// Rows requested from the public archive search.
pub const ARCHIVE_SEARCH_ROWS: u32 = 50;

/// Dialogs fetched when listing messaging channels.
pub const MESSAGING_DIALOG_LIMIT: usize = 150;

/// Messages returned by a messaging channel search.
pub const MESSAGING_SEARCH_LIMIT: usize = 50;

// =============================================================================
// SERVER
// =============================================================================

/// Default HTTP server port.
pub const SERVER_PORT: u16 = 5000;

/// Default SQLite database URL.
pub const DATABASE_URL: &str = "sqlite://media.sqlite?mode=rwc";
