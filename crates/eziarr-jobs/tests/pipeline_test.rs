//! Sync, hunter and grab protocol against the SQLite store and mock services.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use eziarr_arr::{ArrClient, ServiceConfig};
use eziarr_core::{Error, GrabRequest, MediaServices, MissingRecordRepository, Service};
use eziarr_db::test_fixtures::{record, TestDatabase};
use eziarr_sources::HttpDownloader;
use eziarr_jobs::actions::import_http;
use eziarr_jobs::{hunt_at, sync_missing, GrabProtocol, HuntOutcome, JobContext};

// 2023-11-14T22:13:20Z
const NOW: i64 = 1_700_000_000_000;

fn radarr(server: &MockServer) -> MediaServices {
    let client = ArrClient::new(Service::Radarr, ServiceConfig::new(server.uri(), "key")).unwrap();
    MediaServices::new().with(Arc::new(client))
}

#[tokio::test]
async fn test_sync_deletes_records_no_longer_missing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/wanted/missing"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "records": [{"id": 1, "title": "Heat", "inCinemas": "1995-12-15T00:00:00Z"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let test_db = TestDatabase::new().await;
    test_db.insert(record(Service::Radarr, 1, None)).await;
    test_db.insert(record(Service::Radarr, 2, None)).await;
    let ctx = JobContext::from_database(&test_db.db, radarr(&server));

    let report = sync_missing(&ctx).await;

    assert_eq!(report.deleted, 1);
    assert_eq!(test_db.db.missing.all_ids().await.unwrap(), vec!["radarr-1".to_string()]);
    let kept = test_db.db.missing.get("radarr-1").await.unwrap().unwrap();
    assert_eq!(kept.release_date.as_deref(), Some("1995-12-15T00:00:00Z"));
}

#[tokio::test]
async fn test_sync_keeps_records_when_service_fails() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/wanted/missing"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let test_db = TestDatabase::new().await;
    test_db.insert(record(Service::Radarr, 1, None)).await;
    test_db.insert(record(Service::Radarr, 2, None)).await;
    let ctx = JobContext::from_database(&test_db.db, radarr(&server));

    let report = sync_missing(&ctx).await;

    assert_eq!(report.deleted, 0);
    assert!(report.failed_services.contains(&Service::Radarr));
    assert_eq!(test_db.db.missing.all_ids().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_hunter_searches_once_within_cooldown() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v3/command"))
        .and(body_partial_json(json!({"name": "MoviesSearch", "movieIds": [7]})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 1})))
        .expect(1)
        .mount(&server)
        .await;

    let test_db = TestDatabase::new().await;
    test_db
        .insert(record(Service::Radarr, 7, Some("2023-11-13T00:00:00Z")))
        .await;
    let ctx = JobContext::from_database(&test_db.db, radarr(&server));

    assert_eq!(
        hunt_at(&ctx, NOW).await,
        HuntOutcome::Searched {
            record_id: "radarr-7".into()
        }
    );
    assert_eq!(hunt_at(&ctx, NOW).await, HuntOutcome::Idle);
}

#[tokio::test]
async fn test_grab_switches_profile_and_retries() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v3/release/push"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "rejected": true,
            "rejections": ["Not a Custom Format upgrade for existing QualityProfile"]
        }])))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v3/release/push"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"rejected": false}])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v3/qualityprofile"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 2, "name": "HD-1080p"},
            {"id": 5, "name": "Any"}
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v3/movie/3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 3, "title": "Heat", "qualityProfileId": 2
        })))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/api/v3/movie/3"))
        .and(body_partial_json(json!({"id": 3, "qualityProfileId": 5})))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    let protocol = GrabProtocol::new(radarr(&server)).with_settle_delay(Duration::from_millis(10));
    let outcome = protocol
        .grab(&GrabRequest {
            service: Service::Radarr,
            service_id: 3,
            title: "Heat.1995.1080p".into(),
            download_url: "magnet:?xt=urn:btih:abc".into(),
        })
        .await;

    assert!(outcome.success, "{}", outcome.message);
    assert_eq!(outcome.message, "Grabbed! (Overrode Profile/Queue)");
}

#[tokio::test]
async fn test_http_import_without_api_key_downloads_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/files/Heat.mkv"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"video".to_vec()))
        .expect(0)
        .mount(&server)
        .await;

    let test_db = TestDatabase::seeded().await;
    let client = ArrClient::new(Service::Radarr, ServiceConfig::new(server.uri(), "")).unwrap();
    let ctx = JobContext::from_database(&test_db.db, MediaServices::new().with(Arc::new(client)));
    let dir = tempfile::tempdir().unwrap();
    let downloader = HttpDownloader::new(dir.path()).unwrap();

    let err = import_http(
        &ctx,
        &downloader,
        Service::Radarr,
        3,
        &format!("{}/files/Heat.mkv", server.uri()),
        "Heat.mkv",
    )
    .await
    .unwrap_err();

    assert!(matches!(err, Error::Config(_)));
    assert!(!dir.path().join("Heat").exists());
}
