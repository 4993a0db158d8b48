//! Unit persistence.

use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use super::Store;
use crate::error::SyncResult;
use crate::unit::Unit;

fn unit_from_row(row: &SqliteRow) -> Unit {
    Unit {
        id: row.get("id"),
        property_id: row.get("property_id"),
        name: row.get("name"),
        rate_formula: row.get("rate_formula"),
    }
}

impl Store {
    pub async fn insert_unit(&self, unit: &Unit) -> SyncResult<i64> {
        let result = sqlx::query(
            "INSERT INTO units (property_id, name, rate_formula) VALUES (?, ?, ?)",
        )
        .bind(unit.property_id)
        .bind(&unit.name)
        .bind(&unit.rate_formula)
        .execute(self.pool())
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn unit(&self, id: i64) -> SyncResult<Option<Unit>> {
        let row = sqlx::query("SELECT * FROM units WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        Ok(row.as_ref().map(unit_from_row))
    }
}
