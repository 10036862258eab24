//! Test fixtures for database tests.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use eziarr_db::test_fixtures::{record, TestDatabase};
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let test_db = TestDatabase::new().await;
//!     test_db.insert(record(Service::Radarr, 1, Some("2024-01-01"))).await;
//! }
//! ```

use eziarr_core::{MissingRecord, MissingRecordRepository, Service};

use crate::Database;

/// Migrated in-memory database.
pub struct TestDatabase {
    pub db: Database,
}

impl TestDatabase {
    /// Open and migrate a fresh in-memory database.
    ///
    /// Panics on failure; only meant for tests.
    pub async fn new() -> Self {
        let db = Database::connect_in_memory()
            .await
            .expect("in-memory database should open");
        db.migrate().await.expect("migrations should apply");
        Self { db }
    }

    /// Same as [`TestDatabase::new`] with the default settings table written.
    pub async fn seeded() -> Self {
        let test_db = Self::new().await;
        test_db
            .db
            .settings
            .seed_defaults()
            .await
            .expect("default settings should seed");
        test_db
    }

    /// Upsert a record, panicking on failure.
    pub async fn insert(&self, record: MissingRecord) {
        self.db
            .missing
            .upsert(&record)
            .await
            .expect("upsert should succeed");
    }
}

/// Build a record with a title derived from its id.
pub fn record(service: Service, service_item_id: i64, release_date: Option<&str>) -> MissingRecord {
    MissingRecord::new(service, service_item_id, format!("{service} item {service_item_id}"))
        .with_release_date(release_date.map(str::to_string))
}
