//! User-initiated library actions: searching, unmonitoring, queue view and
//! importing downloaded files.

use std::path::Path;

use futures::future::join_all;
use serde_json::Value as JsonValue;
use tracing::{info, warn};

use eziarr_core::{
    record_id, Error, MediaServices, MediaType, PathMapping, QueueItem, ReleaseCandidate,
    ReleaseIndexer, Result, Service,
};
use eziarr_sources::{DownloadTarget, HttpDownloader, MessagingSession};

use crate::JobContext;

/// Ask a service to search for one of its items.
pub async fn trigger_search(services: &MediaServices, service: Service, item_id: i64) -> Result<()> {
    let client = services.get(service)?;
    client
        .command(&service.spec().search_command(item_id))
        .await?;
    info!(subsystem = "jobs", component = "actions", service = %service, item_id, "Manual search triggered");
    Ok(())
}

/// Stop monitoring an item upstream and drop its local record.
pub async fn unmonitor(ctx: &JobContext, service: Service, item_id: i64) -> Result<()> {
    let client = ctx.services.get(service)?;
    let resource = service.spec().item_resource;

    let mut item = client.get_resource(resource, item_id).await?;
    item.as_object_mut()
        .ok_or_else(|| Error::upstream(service, format!("{resource} {item_id} is not an object")))?
        .insert("monitored".into(), JsonValue::Bool(false));
    client.put_resource(resource, item_id, &item).await?;

    ctx.records.delete(&record_id(service, item_id)).await?;
    info!(subsystem = "jobs", component = "actions", service = %service, item_id, "Item unmonitored");
    Ok(())
}

/// Active download queue entries of every service, fetched concurrently.
///
/// A service whose queue cannot be read contributes nothing.
pub async fn active_queue(services: &MediaServices) -> Vec<QueueItem> {
    let fetches = Service::ALL.into_iter().map(|service| async move {
        let result = match services.get(service) {
            Ok(client) => client.queue().await,
            Err(e) => Err(e),
        };
        match result {
            Ok(items) => items.into_iter().filter(|q| !q.is_completed()).collect(),
            Err(e) => {
                warn!(subsystem = "jobs", component = "actions", service = %service, error = %e, "Queue unavailable");
                Vec::new()
            }
        }
    });
    join_all(fetches).await.into_iter().flatten().collect()
}

/// Indexer search for `query`, best seeded first. Failures yield no results.
pub async fn deep_search(
    indexer: &dyn ReleaseIndexer,
    media_type: MediaType,
    query: &str,
) -> Vec<ReleaseCandidate> {
    match indexer.search(query, media_type).await {
        Ok(results) => results,
        Err(e) => {
            warn!(subsystem = "jobs", component = "actions", query, error = %e, "Indexer search failed");
            Vec::new()
        }
    }
}

/// Hand a downloaded folder to a service for import.
///
/// The local path is translated with the path mapping from settings before
/// it is sent. Returns the path the service was given.
pub async fn request_import(
    ctx: &JobContext,
    service: Service,
    item_id: i64,
    folder: &Path,
) -> Result<String> {
    let client = ctx.services.get(service)?;
    let mapping = PathMapping::from_settings(&ctx.settings.all().await?);
    let local = folder.to_string_lossy();
    let remote = mapping.translate(&local);

    info!(
        subsystem = "jobs",
        component = "import",
        service = %service,
        item_id,
        local = %local,
        remote = %remote,
        "Requesting import"
    );
    client
        .command(&service.spec().scan_command(&remote, item_id))
        .await?;
    Ok(remote)
}

/// Download `url` into the downloads root and request its import.
pub async fn import_http(
    ctx: &JobContext,
    downloader: &HttpDownloader,
    service: Service,
    item_id: i64,
    url: &str,
    filename: &str,
) -> Result<DownloadTarget> {
    ctx.services.get(service)?.ensure_configured()?;
    let target = downloader.download(url, filename).await?;
    request_import(ctx, service, item_id, &target.folder).await?;
    Ok(target)
}

/// Download a message's media into the downloads root and request its import.
#[allow(clippy::too_many_arguments)]
pub async fn import_message(
    ctx: &JobContext,
    session: &MessagingSession,
    root: &Path,
    service: Service,
    item_id: i64,
    channel: &str,
    message_id: i64,
    filename: &str,
) -> Result<DownloadTarget> {
    ctx.services.get(service)?.ensure_configured()?;
    let target = session.download(root, channel, message_id, filename).await?;
    request_import(ctx, service, item_id, &target.folder).await?;
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;
    use async_trait::async_trait;
    use serde_json::json;
    use eziarr_core::{MissingRecordRepository, SettingsRepository};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_trigger_search_uses_service_command() {
        let lidarr = Arc::new(FakeService::new(Service::Lidarr));
        let (ctx, _, _) = context(vec![lidarr.clone()]);

        trigger_search(&ctx.services, Service::Lidarr, 12).await.unwrap();

        let calls = lidarr.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].contains(r#""albumIds":[12]"#));
        assert!(calls[0].contains("AlbumSearch"));
    }

    #[tokio::test]
    async fn test_unmonitor_updates_item_and_drops_record() {
        let sonarr = Arc::new(
            FakeService::new(Service::Sonarr)
                .with_resource("episode", 4, json!({"id": 4, "monitored": true, "title": "Pilot"})),
        );
        let (ctx, records, _) = context(vec![sonarr.clone()]);
        records.insert(released(Service::Sonarr, 4, "2024-01-01"));
        records.insert(released(Service::Radarr, 4, "2024-01-01"));

        unmonitor(&ctx, Service::Sonarr, 4).await.unwrap();

        let item = sonarr.resource("episode/4").unwrap();
        assert_eq!(item["monitored"], false);
        assert_eq!(item["title"], "Pilot");
        assert!(records.get("sonarr-4").await.unwrap().is_none());
        assert!(records.get("radarr-4").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_active_queue_skips_completed_and_failures() {
        let radarr = Arc::new(FakeService::new(Service::Radarr));
        let mut done = queue_item(Service::Radarr, 2, 20);
        done.status = Some("completed".into());
        *radarr.queue.lock().unwrap() = vec![queue_item(Service::Radarr, 1, 10), done];
        let (ctx, _, _) = context(vec![radarr]);

        let queue = active_queue(&ctx.services).await;

        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].id, 1);
    }

    struct BrokenIndexer;

    #[async_trait]
    impl ReleaseIndexer for BrokenIndexer {
        async fn search(&self, _query: &str, _media_type: MediaType) -> Result<Vec<ReleaseCandidate>> {
            Err(Error::Request("indexer down".into()))
        }
    }

    #[tokio::test]
    async fn test_deep_search_failure_is_empty() {
        assert!(deep_search(&BrokenIndexer, MediaType::Movie, "dune").await.is_empty());
    }

    #[tokio::test]
    async fn test_request_import_translates_path() {
        let radarr = Arc::new(FakeService::new(Service::Radarr));
        let (ctx, _, settings) = context(vec![radarr.clone()]);
        settings.set("pathMapDocker", &json!("/app/downloads")).await.unwrap();
        settings.set("pathMapRemote", &json!("C:\\Imports")).await.unwrap();

        let remote = request_import(&ctx, Service::Radarr, 7, Path::new("/app/downloads/Movie"))
            .await
            .unwrap();

        assert_eq!(remote, "C:\\Imports\\Movie");
        let calls = radarr.calls();
        assert!(calls[0].contains("DownloadedMoviesScan"));
        assert!(calls[0].contains(r#""movieId":7"#));
        assert!(calls[0].contains(r#""importMode":"Move""#));
    }

    #[tokio::test]
    async fn test_import_for_unconfigured_service_downloads_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, _, _) = context(vec![]);
        let downloader = HttpDownloader::new(dir.path()).unwrap();

        let err = import_http(&ctx, &downloader, Service::Radarr, 1, "http://127.0.0.1:1/x.mkv", "x.mkv")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Config(_)));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
