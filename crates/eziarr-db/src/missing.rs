//! Missing-media record repository.

use async_trait::async_trait;
use chrono::DateTime;
use sqlx::sqlite::SqliteRow;
use sqlx::{Pool, Row, Sqlite};

use eziarr_core::defaults::SEARCH_COOLDOWN_MS;
use eziarr_core::{Error, MissingRecord, MissingRecordRepository, Result};

const RECORD_COLUMNS: &str = "id, service_item_id, title, series_title, media_type, service, \
     release_date, poster_url, last_searched_at, status";

/// SQLite missing-record repository.
#[derive(Clone)]
pub struct SqliteMissingRepository {
    pool: Pool<Sqlite>,
}

impl SqliteMissingRepository {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    fn parse_row(row: &SqliteRow) -> Result<MissingRecord> {
        let media_type: String = row.get("media_type");
        let service: String = row.get("service");
        Ok(MissingRecord {
            id: row.get("id"),
            service_item_id: row.get("service_item_id"),
            title: row.get("title"),
            series_title: row.get("series_title"),
            media_type: media_type
                .parse()
                .map_err(|e: Error| Error::Serialization(e.to_string()))?,
            service: service
                .parse()
                .map_err(|e: Error| Error::Serialization(e.to_string()))?,
            release_date: row.get("release_date"),
            poster_url: row.get("poster_url"),
            last_searched_at: row.get("last_searched_at"),
            status: row.get("status"),
        })
    }
}

/// Render epoch milliseconds the way upstream release dates are written.
fn iso_millis(timestamp_ms: i64) -> Result<String> {
    DateTime::from_timestamp_millis(timestamp_ms)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string())
        .ok_or_else(|| Error::InvalidInput(format!("timestamp out of range: {timestamp_ms}")))
}

#[async_trait]
impl MissingRecordRepository for SqliteMissingRepository {
    async fn upsert(&self, record: &MissingRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO missing_items
                (id, service_item_id, title, series_title, media_type, service,
                 release_date, poster_url, status)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                status = excluded.status,
                poster_url = excluded.poster_url,
                release_date = excluded.release_date",
        )
        .bind(&record.id)
        .bind(record.service_item_id)
        .bind(&record.title)
        .bind(&record.series_title)
        .bind(record.media_type.as_str())
        .bind(record.service.as_str())
        .bind(&record.release_date)
        .bind(&record.poster_url)
        .bind(&record.status)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn all_ids(&self) -> Result<Vec<String>> {
        sqlx::query_scalar("SELECT id FROM missing_items")
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        sqlx::query("DELETE FROM missing_items WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }

    async fn mark_searched(&self, id: &str, timestamp_ms: i64) -> Result<()> {
        sqlx::query(
            "UPDATE missing_items SET last_searched_at = ?
             WHERE id = ? AND (last_searched_at IS NULL OR last_searched_at < ?)",
        )
        .bind(timestamp_ms)
        .bind(id)
        .bind(timestamp_ms)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn next_search_candidate(&self, now_ms: i64) -> Result<Option<MissingRecord>> {
        let now_iso = iso_millis(now_ms)?;
        let row = sqlx::query(&format!(
            "SELECT {RECORD_COLUMNS} FROM missing_items
             WHERE (last_searched_at IS NULL OR last_searched_at <= ?)
               AND release_date IS NOT NULL
               AND release_date <= ?
             ORDER BY release_date DESC
             LIMIT 1"
        ))
        .bind(now_ms - SEARCH_COOLDOWN_MS)
        .bind(now_iso)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.as_ref().map(Self::parse_row).transpose()
    }

    async fn get(&self, id: &str) -> Result<Option<MissingRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {RECORD_COLUMNS} FROM missing_items WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.as_ref().map(Self::parse_row).transpose()
    }

    async fn list(&self) -> Result<Vec<MissingRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {RECORD_COLUMNS} FROM missing_items
             ORDER BY release_date IS NULL, release_date DESC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.iter().map(Self::parse_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iso_millis_matches_upstream_format() {
        assert_eq!(iso_millis(0).unwrap(), "1970-01-01T00:00:00.000Z");
        assert_eq!(
            iso_millis(1_700_000_000_123).unwrap(),
            "2023-11-14T22:13:20.123Z"
        );
    }

    #[test]
    fn test_iso_millis_rejects_out_of_range() {
        assert!(matches!(iso_millis(i64::MAX), Err(Error::InvalidInput(_))));
    }
}
