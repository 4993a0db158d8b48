//! Control-string mapping persistence.

use sqlx::Row;

use super::Store;
use crate::error::SyncResult;

impl Store {
    pub async fn mapping_booking_id(&self, control: &str) -> SyncResult<Option<i64>> {
        let row = sqlx::query("SELECT booking_id FROM source_mappings WHERE control = ?")
            .bind(control)
            .fetch_optional(self.pool())
            .await?;
        Ok(row.map(|r| r.get::<i64, _>("booking_id")))
    }

    pub async fn upsert_mapping(&self, control: &str, booking_id: i64) -> SyncResult<()> {
        sqlx::query(
            "INSERT INTO source_mappings (control, booking_id) VALUES (?, ?)
             ON CONFLICT(control) DO UPDATE SET booking_id = excluded.booking_id",
        )
        .bind(control)
        .bind(booking_id)
        .execute(self.pool())
        .await?;
        Ok(())
    }
}
