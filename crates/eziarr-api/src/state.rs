//! Shared handler state.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use eziarr_arr::IndexerClient;
use eziarr_core::{ReleaseIndexer, Result};
use eziarr_db::Database;
use eziarr_jobs::{GrabProtocol, JobContext};
use eziarr_sources::{ArchiveClient, HttpDownloader, MessagingSession, OpenDirScanner};

/// Everything the handlers reach for, cloned into each request.
#[derive(Clone)]
pub struct AppState {
    pub jobs: JobContext,
    pub grab: GrabProtocol,
    pub indexer: Arc<dyn ReleaseIndexer>,
    pub downloader: HttpDownloader,
    pub archive: ArchiveClient,
    pub opendir: OpenDirScanner,
    pub messaging: Arc<MessagingSession>,
}

impl AppState {
    pub fn new(
        jobs: JobContext,
        indexer: Arc<dyn ReleaseIndexer>,
        downloader: HttpDownloader,
        archive: ArchiveClient,
        messaging: Arc<MessagingSession>,
    ) -> Result<Self> {
        Ok(Self {
            grab: GrabProtocol::new(jobs.services.clone()),
            opendir: OpenDirScanner::new()?,
            jobs,
            indexer,
            downloader,
            archive,
            messaging,
        })
    }

    /// Build the state from the environment around an open database.
    ///
    /// No messaging connector is installed, so the messaging endpoints
    /// report themselves as unconfigured.
    pub fn from_env(db: &Database, jobs: JobContext, download_dir: impl Into<PathBuf>) -> Result<Self> {
        let messaging = MessagingSession::new(Arc::new(db.settings.clone()), None);
        Self::new(
            jobs,
            Arc::new(IndexerClient::from_env()?),
            HttpDownloader::new(download_dir)?,
            ArchiveClient::from_env()?,
            Arc::new(messaging),
        )
    }

    pub fn download_root(&self) -> &Path {
        self.downloader.root()
    }
}
