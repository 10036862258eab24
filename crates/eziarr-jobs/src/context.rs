//! Shared dependencies of the background jobs.

use std::sync::Arc;

use eziarr_core::{MediaServices, MissingRecordRepository, SettingsRepository};
use eziarr_db::Database;

/// Stores and upstream clients every job operates on.
#[derive(Clone)]
pub struct JobContext {
    pub records: Arc<dyn MissingRecordRepository>,
    pub settings: Arc<dyn SettingsRepository>,
    pub services: MediaServices,
}

impl JobContext {
    pub fn new(
        records: Arc<dyn MissingRecordRepository>,
        settings: Arc<dyn SettingsRepository>,
        services: MediaServices,
    ) -> Self {
        Self {
            records,
            settings,
            services,
        }
    }

    /// Context backed by the SQLite repositories of `db`.
    pub fn from_database(db: &Database, services: MediaServices) -> Self {
        Self::new(
            Arc::new(db.missing.clone()),
            Arc::new(db.settings.clone()),
            services,
        )
    }
}
