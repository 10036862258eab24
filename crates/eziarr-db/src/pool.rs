//! SQLite connection pool.
//!
//! File databases run in WAL mode with a busy timeout so the scheduler's
//! writes and the API's reads do not trip over each other. In-memory
//! databases exist once per connection, so their pool is pinned to a single
//! connection that is never recycled.

use std::str::FromStr;
use std::time::{Duration, Instant};

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tracing::info;

use eziarr_core::{Error, Result};

/// URL of a private in-memory database.
pub const IN_MEMORY_URL: &str = "sqlite::memory:";

/// Pool settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    pub max_connections: u32,
    /// How long to wait for a free connection.
    pub acquire_timeout: Duration,
    /// How long a statement waits on a locked database before failing.
    pub busy_timeout: Duration,
    /// Recycle connections; off for in-memory databases.
    pub recycle: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 5,
            acquire_timeout: Duration::from_secs(30),
            busy_timeout: Duration::from_secs(5),
            recycle: true,
        }
    }
}

impl PoolConfig {
    /// Single, permanent connection for `sqlite::memory:`.
    pub fn in_memory() -> Self {
        Self {
            max_connections: 1,
            recycle: false,
            ..Self::default()
        }
    }

    /// Defaults overridden by `DATABASE_MAX_CONNECTIONS` when set.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(n) = std::env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .filter(|n| *n > 0)
        {
            config.max_connections = n;
        }
        config
    }

    pub fn with_max_connections(mut self, n: u32) -> Self {
        self.max_connections = n;
        self
    }

    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }
}

fn is_in_memory(url: &str) -> bool {
    url.contains(":memory:") || url.contains("mode=memory")
}

/// Open a pool for `database_url`, sized from the environment.
pub async fn create_pool(database_url: &str) -> Result<SqlitePool> {
    let config = if is_in_memory(database_url) {
        PoolConfig::in_memory()
    } else {
        PoolConfig::from_env()
    };
    create_pool_with_config(database_url, config).await
}

/// Open a pool for `database_url`. Missing database files are created.
pub async fn create_pool_with_config(database_url: &str, config: PoolConfig) -> Result<SqlitePool> {
    let start = Instant::now();

    let mut options = SqliteConnectOptions::from_str(database_url)
        .map_err(Error::Database)?
        .create_if_missing(true)
        .busy_timeout(config.busy_timeout)
        .foreign_keys(true);
    if !is_in_memory(database_url) {
        options = options.journal_mode(SqliteJournalMode::Wal);
    }

    let (idle_timeout, max_lifetime) = if config.recycle {
        (Some(Duration::from_secs(600)), Some(Duration::from_secs(1800)))
    } else {
        (None, None)
    };

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(1)
        .acquire_timeout(config.acquire_timeout)
        .idle_timeout(idle_timeout)
        .max_lifetime(max_lifetime)
        .connect_with(options)
        .await
        .map_err(Error::Database)?;

    info!(
        subsystem = "database",
        component = "pool",
        op = "open",
        max_connections = config.max_connections,
        in_memory = is_in_memory(database_url),
        duration_ms = start.elapsed().as_millis() as u64,
        "SQLite pool open"
    );
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_config_pins_one_connection() {
        let config = PoolConfig::in_memory();
        assert_eq!(config.max_connections, 1);
        assert!(!config.recycle);
    }

    #[test]
    fn test_in_memory_detection() {
        assert!(is_in_memory(IN_MEMORY_URL));
        assert!(is_in_memory("sqlite://file:shared?mode=memory&cache=shared"));
        assert!(!is_in_memory("sqlite://media.sqlite?mode=rwc"));
    }

    #[tokio::test]
    async fn test_file_pool_uses_wal() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("media.sqlite").display());
        let pool = create_pool_with_config(&url, PoolConfig::default().with_max_connections(2))
            .await
            .unwrap();

        let mode: String = sqlx::query_scalar("PRAGMA journal_mode")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");
    }
}
