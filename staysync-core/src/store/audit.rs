//! Audit trail of sync decisions.
//!
//! Applied remote changes and held-back merge conflicts both land here,
//! so the operator can see what sync did and what it refused to do.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use super::Store;
use crate::error::SyncResult;

#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub booking_id: i64,
    pub source_key: String,
    pub field: String,
    pub old_value: Value,
    pub new_value: Value,
    pub baseline: Option<Value>,
    /// True when the remote value was written; false for a conflict
    /// diff left for the operator.
    pub applied: bool,
    pub created_at: DateTime<Utc>,
}

fn entry_from_row(row: &SqliteRow) -> AuditEntry {
    fn value_col(row: &SqliteRow, col: &str) -> Value {
        row.get::<Option<String>, _>(col)
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or(Value::Null)
    }

    AuditEntry {
        booking_id: row.get("booking_id"),
        source_key: row.get("source_key"),
        field: row.get("field"),
        old_value: value_col(row, "old_value"),
        new_value: value_col(row, "new_value"),
        baseline: row
            .get::<Option<String>, _>("baseline")
            .and_then(|s| serde_json::from_str(&s).ok()),
        applied: row.get::<i64, _>("applied") != 0,
        created_at: row
            .get::<String, _>("created_at")
            .parse::<DateTime<Utc>>()
            .unwrap_or_else(|_| Utc::now()),
    }
}

impl Store {
    pub async fn append_audit(&self, entry: &AuditEntry) -> SyncResult<()> {
        sqlx::query(
            "INSERT INTO sync_audit
                 (booking_id, source_key, field, old_value, new_value, baseline, applied, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(entry.booking_id)
        .bind(&entry.source_key)
        .bind(&entry.field)
        .bind(serde_json::to_string(&entry.old_value)?)
        .bind(serde_json::to_string(&entry.new_value)?)
        .bind(
            entry
                .baseline
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?,
        )
        .bind(entry.applied as i64)
        .bind(entry.created_at.to_rfc3339())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    pub async fn audit_for_booking(&self, booking_id: i64) -> SyncResult<Vec<AuditEntry>> {
        let rows = sqlx::query("SELECT * FROM sync_audit WHERE booking_id = ? ORDER BY id")
            .bind(booking_id)
            .fetch_all(self.pool())
            .await?;
        Ok(rows.iter().map(entry_from_row).collect())
    }
}
