//! Housekeeping of the downloads root.
//!
//! Every download lives in its own folder directly under the root. Files
//! older than the retention window are deleted, then folders left empty are
//! removed. Failures are counted and logged per entry.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use serde::Serialize;
use tokio::fs;
use tracing::{debug, info, warn};

use eziarr_core::defaults;

/// Summary of one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    pub files_deleted: usize,
    pub folders_removed: usize,
    pub errors: usize,
}

/// Deletes expired downloads.
#[derive(Debug, Clone)]
pub struct Sweeper {
    root: PathBuf,
    retention: Duration,
}

impl Sweeper {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            retention: Duration::from_secs(defaults::DOWNLOAD_RETENTION_SECS),
        }
    }

    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn sweep(&self) -> SweepReport {
        self.sweep_at(SystemTime::now()).await
    }

    /// Sweep as of `now`.
    pub async fn sweep_at(&self, now: SystemTime) -> SweepReport {
        let mut report = SweepReport::default();

        let mut folders = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(subsystem = "jobs", component = "sweeper", root = %self.root.display(), "Downloads root does not exist");
                return report;
            }
            Err(e) => {
                warn!(subsystem = "jobs", component = "sweeper", root = %self.root.display(), error = %e, "Cannot read downloads root");
                report.errors += 1;
                return report;
            }
        };

        loop {
            let entry = match folders.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    warn!(subsystem = "jobs", component = "sweeper", error = %e, "Failed to read downloads root entry");
                    report.errors += 1;
                    break;
                }
            };
            let path = entry.path();
            match entry.file_type().await {
                Ok(t) if t.is_dir() => self.sweep_folder(&path, now, &mut report).await,
                Ok(_) => {}
                Err(e) => {
                    warn!(subsystem = "jobs", component = "sweeper", path = %path.display(), error = %e, "Failed to stat entry");
                    report.errors += 1;
                }
            }
        }

        info!(
            subsystem = "jobs",
            component = "sweeper",
            files_deleted = report.files_deleted,
            folders_removed = report.folders_removed,
            errors = report.errors,
            "Sweep complete"
        );
        report
    }

    async fn sweep_folder(&self, folder: &Path, now: SystemTime, report: &mut SweepReport) {
        let mut entries = match fs::read_dir(folder).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(subsystem = "jobs", component = "sweeper", path = %folder.display(), error = %e, "Cannot read folder");
                report.errors += 1;
                return;
            }
        };

        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    warn!(subsystem = "jobs", component = "sweeper", path = %folder.display(), error = %e, "Failed to read folder entry");
                    report.errors += 1;
                    break;
                }
            };
            let path = entry.path();
            let expired = match entry.metadata().await {
                Ok(meta) if meta.is_file() => meta
                    .modified()
                    .ok()
                    .and_then(|modified| now.duration_since(modified).ok())
                    .is_some_and(|age| age > self.retention),
                Ok(_) => false,
                Err(e) => {
                    warn!(subsystem = "jobs", component = "sweeper", path = %path.display(), error = %e, "Failed to stat file");
                    report.errors += 1;
                    false
                }
            };
            if !expired {
                continue;
            }
            match fs::remove_file(&path).await {
                Ok(()) => {
                    info!(subsystem = "jobs", component = "sweeper", path = %path.display(), "Deleted expired download");
                    report.files_deleted += 1;
                }
                Err(e) => {
                    warn!(subsystem = "jobs", component = "sweeper", path = %path.display(), error = %e, "Failed to delete file");
                    report.errors += 1;
                }
            }
        }

        match is_empty_dir(folder).await {
            Ok(true) => match fs::remove_dir(folder).await {
                Ok(()) => report.folders_removed += 1,
                Err(e) => {
                    warn!(subsystem = "jobs", component = "sweeper", path = %folder.display(), error = %e, "Failed to remove folder");
                    report.errors += 1;
                }
            },
            Ok(false) => {}
            Err(e) => {
                warn!(subsystem = "jobs", component = "sweeper", path = %folder.display(), error = %e, "Cannot read folder");
                report.errors += 1;
            }
        }
    }
}

async fn is_empty_dir(path: &Path) -> std::io::Result<bool> {
    Ok(fs::read_dir(path).await?.next_entry().await?.is_none())
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAY: Duration = Duration::from_secs(24 * 60 * 60);

    fn touch(path: &Path, modified: SystemTime) {
        let file = std::fs::File::create(path).unwrap();
        file.set_modified(modified).unwrap();
    }

    #[tokio::test]
    async fn test_sweep_deletes_expired_files_and_empty_folders() {
        let dir = tempfile::tempdir().unwrap();
        let now = SystemTime::now();

        let stale = dir.path().join("Old_Movie");
        std::fs::create_dir(&stale).unwrap();
        touch(&stale.join("Old_Movie.mkv"), now - 2 * DAY);

        let mixed = dir.path().join("Show");
        std::fs::create_dir(&mixed).unwrap();
        touch(&mixed.join("old.mkv"), now - 2 * DAY);
        touch(&mixed.join("new.mkv"), now - Duration::from_secs(60));

        std::fs::create_dir(dir.path().join("Empty")).unwrap();
        touch(&dir.path().join("loose.mkv"), now - 2 * DAY);

        let report = Sweeper::new(dir.path()).sweep_at(now).await;

        assert_eq!(report.files_deleted, 2);
        assert_eq!(report.folders_removed, 2);
        assert_eq!(report.errors, 0);
        assert!(!stale.exists());
        assert!(mixed.join("new.mkv").exists());
        assert!(!mixed.join("old.mkv").exists());
        assert!(!dir.path().join("Empty").exists());
        // Only folders are swept.
        assert!(dir.path().join("loose.mkv").exists());
    }

    #[tokio::test]
    async fn test_sweep_of_missing_root_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let report = Sweeper::new(dir.path().join("absent")).sweep().await;
        assert_eq!(report, SweepReport::default());
    }

    #[tokio::test]
    async fn test_custom_retention() {
        let dir = tempfile::tempdir().unwrap();
        let now = SystemTime::now();
        let folder = dir.path().join("clip");
        std::fs::create_dir(&folder).unwrap();
        touch(&folder.join("clip.mp4"), now - Duration::from_secs(120));

        let report = Sweeper::new(dir.path())
            .with_retention(Duration::from_secs(60))
            .sweep_at(now)
            .await;

        assert_eq!(report.files_deleted, 1);
        assert!(!folder.exists());
    }
}
