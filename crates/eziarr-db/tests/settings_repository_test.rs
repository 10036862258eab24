//! Settings storage, seeding and change notification.

use std::time::Duration;

use serde_json::{json, Map};

use eziarr_core::{SettingsRepository, WorkerConfig};
use eziarr_db::test_fixtures::TestDatabase;

#[tokio::test]
async fn test_seed_defaults_populates_table() {
    let test_db = TestDatabase::seeded().await;
    let all = test_db.db.settings.all().await.unwrap();

    assert_eq!(all.get("syncEnabled"), Some(&json!(true)));
    assert_eq!(all.get("hunterInterval"), Some(&json!(15)));
    assert_eq!(all.get("pathMapRemote"), Some(&json!("")));
    assert_eq!(all.len(), 8);

    let config = WorkerConfig::from_settings(&all);
    assert_eq!(config.sync_interval, 10);
    assert_eq!(config.hunter_interval, 15);
}

#[tokio::test]
async fn test_seed_defaults_keeps_existing_values() {
    let test_db = TestDatabase::new().await;
    test_db
        .db
        .settings
        .set("syncInterval", &json!(45))
        .await
        .unwrap();
    test_db.db.settings.seed_defaults().await.unwrap();

    let value = test_db.db.settings.get("syncInterval").await.unwrap();
    assert_eq!(value, Some(json!(45)));
}

#[tokio::test]
async fn test_get_or_default() {
    let test_db = TestDatabase::new().await;
    let value = test_db
        .db
        .settings
        .get_or("missing", json!("fallback"))
        .await
        .unwrap();
    assert_eq!(value, json!("fallback"));
}

#[tokio::test]
async fn test_undecodable_value_falls_back_to_raw() {
    let test_db = TestDatabase::new().await;
    sqlx::query("INSERT INTO settings (key, value) VALUES ('legacy', 'plain text')")
        .execute(&test_db.db.pool)
        .await
        .unwrap();

    let value = test_db.db.settings.get("legacy").await.unwrap();
    assert_eq!(value, Some(json!("plain text")));
}

#[tokio::test]
async fn test_set_many_writes_every_key() {
    let test_db = TestDatabase::seeded().await;
    let mut batch = Map::new();
    batch.insert("syncEnabled".into(), json!(false));
    batch.insert("pathMapDocker".into(), json!("/app/downloads"));
    test_db.db.settings.set_many(&batch).await.unwrap();

    let all = test_db.db.settings.all().await.unwrap();
    assert_eq!(all.get("syncEnabled"), Some(&json!(false)));
    assert_eq!(all.get("pathMapDocker"), Some(&json!("/app/downloads")));
}

#[tokio::test]
async fn test_write_wakes_listeners() {
    let test_db = TestDatabase::new().await;
    let notify = test_db.db.settings.change_notify();
    let notified = notify.notified();
    tokio::pin!(notified);
    notified.as_mut().enable();

    test_db
        .db
        .settings
        .set("hunterEnabled", &json!(false))
        .await
        .unwrap();

    tokio::time::timeout(Duration::from_secs(1), notified)
        .await
        .expect("write should notify");
}
