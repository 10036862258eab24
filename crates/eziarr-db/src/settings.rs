//! Settings repository.
//!
//! Values are stored as their JSON encoding. Rows written by hand (or by an
//! older release) that fail to decode are returned as plain strings.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value as JsonValue};
use sqlx::{Pool, Sqlite};
use tokio::sync::Notify;
use tracing::{debug, warn};

use eziarr_core::{default_settings, Error, Result, SettingsRepository};

/// SQLite settings repository.
#[derive(Clone)]
pub struct SqliteSettingsRepository {
    pool: Pool<Sqlite>,
    /// Woken after every successful write.
    notify: Arc<Notify>,
}

impl SqliteSettingsRepository {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self {
            pool,
            notify: Arc::new(Notify::new()),
        }
    }

    /// Handle woken whenever a setting is written.
    pub fn change_notify(&self) -> Arc<Notify> {
        self.notify.clone()
    }

    /// Write the default table for keys that are not stored yet.
    ///
    /// Existing values are never overwritten.
    pub async fn seed_defaults(&self) -> Result<()> {
        let mut seeded = 0u64;
        for (key, value) in default_settings() {
            let result = sqlx::query("INSERT OR IGNORE INTO settings (key, value) VALUES (?, ?)")
                .bind(key)
                .bind(encode(&value)?)
                .execute(&self.pool)
                .await
                .map_err(Error::Database)?;
            seeded += result.rows_affected();
        }
        debug!(
            subsystem = "database",
            component = "settings",
            op = "seed",
            seeded,
            "Default settings applied"
        );
        Ok(())
    }
}

fn encode(value: &JsonValue) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

fn decode(key: &str, raw: String) -> JsonValue {
    match serde_json::from_str(&raw) {
        Ok(value) => value,
        Err(e) => {
            warn!(
                subsystem = "database",
                component = "settings",
                key,
                error = %e,
                "Setting is not valid JSON, using raw string"
            );
            JsonValue::String(raw)
        }
    }
}

#[async_trait]
impl SettingsRepository for SqliteSettingsRepository {
    async fn get(&self, key: &str) -> Result<Option<JsonValue>> {
        let raw: Option<String> = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(raw.map(|raw| decode(key, raw)))
    }

    async fn set(&self, key: &str, value: &JsonValue) -> Result<()> {
        sqlx::query(
            "INSERT INTO settings (key, value) VALUES (?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(key)
        .bind(encode(value)?)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        self.notify.notify_waiters();
        Ok(())
    }

    async fn set_many(&self, values: &Map<String, JsonValue>) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        for (key, value) in values {
            sqlx::query(
                "INSERT INTO settings (key, value) VALUES (?, ?)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            )
            .bind(key)
            .bind(encode(value)?)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
        }
        tx.commit().await.map_err(Error::Database)?;
        self.notify.notify_waiters();
        Ok(())
    }

    async fn all(&self) -> Result<Map<String, JsonValue>> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT key, value FROM settings ORDER BY key")
                .fetch_all(&self.pool)
                .await
                .map_err(Error::Database)?;
        Ok(rows
            .into_iter()
            .map(|(key, raw)| {
                let value = decode(&key, raw);
                (key, value)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_json_values() {
        assert_eq!(decode("k", "true".into()), json!(true));
        assert_eq!(decode("k", "15".into()), json!(15));
        assert_eq!(decode("k", "\"C:\\\\Imports\"".into()), json!("C:\\Imports"));
    }

    #[test]
    fn test_decode_falls_back_to_raw_string() {
        assert_eq!(decode("k", "not json".into()), json!("not json"));
    }
}
