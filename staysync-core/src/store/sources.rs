//! Feed source persistence.
//!
//! The sync engine only ever writes the last_synced_at / last_error
//! columns; sources themselves are administered elsewhere.

use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use super::Store;
use crate::error::{SyncError, SyncResult};
use crate::source::Source;

/// Optional narrowing of a sync run to one source or one property.
#[derive(Debug, Clone, Default)]
pub struct SourceFilter {
    pub source_id: Option<i64>,
    pub property_id: Option<i64>,
}

fn source_from_row(row: &SqliteRow) -> SyncResult<Source> {
    let last_synced_at = row
        .get::<Option<String>, _>("last_synced_at")
        .map(|s| parse_timestamp(&s))
        .transpose()?;

    Ok(Source {
        id: row.get("id"),
        unit_id: row.get("unit_id"),
        url: row.get("url"),
        enabled: row.get::<i64, _>("enabled") != 0,
        last_synced_at,
        last_error: row.get("last_error"),
    })
}

fn parse_timestamp(s: &str) -> SyncResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| SyncError::Serialization(format!("bad timestamp '{s}': {e}")))
}

impl Store {
    pub async fn insert_source(&self, source: &Source) -> SyncResult<i64> {
        let result = sqlx::query(
            "INSERT INTO sources (unit_id, url, enabled, last_synced_at, last_error)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(source.unit_id)
        .bind(&source.url)
        .bind(source.enabled as i64)
        .bind(source.last_synced_at.map(|dt| dt.to_rfc3339()))
        .bind(&source.last_error)
        .execute(self.pool())
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Enabled sources matching the filter, in id order.
    pub async fn sources(&self, filter: &SourceFilter) -> SyncResult<Vec<Source>> {
        let rows = sqlx::query(
            "SELECT s.* FROM sources s
             JOIN units u ON u.id = s.unit_id
             WHERE s.enabled = 1
               AND (? IS NULL OR s.id = ?)
               AND (? IS NULL OR u.property_id = ?)
             ORDER BY s.id",
        )
        .bind(filter.source_id)
        .bind(filter.source_id)
        .bind(filter.property_id)
        .bind(filter.property_id)
        .fetch_all(self.pool())
        .await?;

        rows.iter().map(source_from_row).collect()
    }

    /// Every source, including disabled ones, for operator listings.
    pub async fn all_sources(&self) -> SyncResult<Vec<Source>> {
        let rows = sqlx::query("SELECT * FROM sources ORDER BY id")
            .fetch_all(self.pool())
            .await?;
        rows.iter().map(source_from_row).collect()
    }

    pub async fn mark_source_synced(&self, id: i64, at: DateTime<Utc>) -> SyncResult<()> {
        sqlx::query("UPDATE sources SET last_synced_at = ?, last_error = NULL WHERE id = ?")
            .bind(at.to_rfc3339())
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    pub async fn mark_source_error(&self, id: i64, message: &str) -> SyncResult<()> {
        sqlx::query("UPDATE sources SET last_error = ? WHERE id = ?")
            .bind(message)
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(())
    }
}
