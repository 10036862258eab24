//! # eziarr-db
//!
//! SQLite storage for eziarr: the local mirror of every upstream "missing"
//! listing plus the flat settings table the scheduler watches for changes.
//!
//! ```rust,ignore
//! let db = eziarr_db::Database::connect("sqlite://media.sqlite?mode=rwc").await?;
//! db.migrate().await?;
//! db.settings.seed_defaults().await?;
//! let records = db.missing.list().await?;
//! ```
pub mod missing;
pub mod pool;
pub mod settings;

#[cfg(feature = "migrations")]
pub mod test_fixtures;

pub use eziarr_core::*;

pub use missing::SqliteMissingRepository;
pub use pool::{create_pool, create_pool_with_config, PoolConfig, IN_MEMORY_URL};
pub use settings::SqliteSettingsRepository;

use sqlx::SqlitePool;

/// Open store: one pool shared by both repositories.
#[derive(Clone)]
pub struct Database {
    pub pool: SqlitePool,
    pub missing: SqliteMissingRepository,
    pub settings: SqliteSettingsRepository,
}

impl Database {
    pub fn new(pool: SqlitePool) -> Self {
        let missing = SqliteMissingRepository::new(pool.clone());
        let settings = SqliteSettingsRepository::new(pool.clone());
        Self {
            pool,
            missing,
            settings,
        }
    }

    /// Open (creating if needed) the database at `url`.
    pub async fn connect(url: &str) -> Result<Self> {
        create_pool(url).await.map(Self::new)
    }

    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        create_pool_with_config(url, config).await.map(Self::new)
    }

    /// Private in-memory store, gone when the last clone drops.
    pub async fn connect_in_memory() -> Result<Self> {
        Self::connect_with_config(IN_MEMORY_URL, PoolConfig::in_memory()).await
    }

    /// Apply the embedded schema migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))
    }
}
