//! Booking persistence.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use super::Store;
use crate::booking::{Booking, BookingStatus, LedgerEntry};
use crate::error::{SyncError, SyncResult};

fn booking_from_row(row: &SqliteRow) -> SyncResult<Booking> {
    let metadata: BTreeMap<String, serde_json::Value> =
        serde_json::from_str(&row.get::<String, _>("metadata"))?;
    let ledger: BTreeMap<String, LedgerEntry> =
        serde_json::from_str(&row.get::<String, _>("ledger"))?;

    let deleted_at = row
        .get::<Option<String>, _>("deleted_at")
        .map(|s| {
            DateTime::parse_from_rfc3339(&s)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| SyncError::Serialization(format!("bad timestamp '{s}': {e}")))
        })
        .transpose()?;

    Ok(Booking {
        id: row.get("id"),
        unit_id: row.get("unit_id"),
        uid: row.get("uid"),
        guest_name: row.get("guest_name"),
        check_in: parse_date(&row.get::<String, _>("check_in"))?,
        check_out: parse_date(&row.get::<String, _>("check_out"))?,
        status: BookingStatus::parse(&row.get::<String, _>("status")),
        adults: row.get("adults"),
        children: row.get("children"),
        group_id: row.get("group_id"),
        notes: row.get("notes"),
        price: row.get("price"),
        commission: row.get("commission"),
        is_manual: row.get::<i64, _>("is_manual") != 0,
        metadata,
        ledger,
        deleted_at,
    })
}

fn parse_date(s: &str) -> SyncResult<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| SyncError::Serialization(format!("bad date '{s}': {e}")))
}

fn date_text(d: NaiveDate) -> String {
    d.format("%Y-%m-%d").to_string()
}

impl Store {
    /// Insert a new booking and fill in its assigned id.
    pub async fn insert_booking(&self, booking: &mut Booking) -> SyncResult<()> {
        let result = sqlx::query(
            "INSERT INTO bookings
                 (unit_id, uid, guest_name, check_in, check_out, status, adults, children,
                  group_id, notes, price, commission, is_manual, metadata, ledger, deleted_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(booking.unit_id)
        .bind(&booking.uid)
        .bind(&booking.guest_name)
        .bind(date_text(booking.check_in))
        .bind(date_text(booking.check_out))
        .bind(booking.status.as_str())
        .bind(booking.adults)
        .bind(booking.children)
        .bind(&booking.group_id)
        .bind(&booking.notes)
        .bind(booking.price)
        .bind(booking.commission)
        .bind(booking.is_manual as i64)
        .bind(serde_json::to_string(&booking.metadata)?)
        .bind(serde_json::to_string(&booking.ledger)?)
        .bind(booking.deleted_at.map(|dt| dt.to_rfc3339()))
        .execute(self.pool())
        .await?;

        booking.id = result.last_insert_rowid();
        Ok(())
    }

    pub async fn update_booking(&self, booking: &Booking) -> SyncResult<()> {
        sqlx::query(
            "UPDATE bookings SET
                 guest_name = ?, check_in = ?, check_out = ?, status = ?, adults = ?,
                 children = ?, group_id = ?, notes = ?, price = ?, commission = ?,
                 is_manual = ?, metadata = ?, ledger = ?, deleted_at = ?
             WHERE id = ?",
        )
        .bind(&booking.guest_name)
        .bind(date_text(booking.check_in))
        .bind(date_text(booking.check_out))
        .bind(booking.status.as_str())
        .bind(booking.adults)
        .bind(booking.children)
        .bind(&booking.group_id)
        .bind(&booking.notes)
        .bind(booking.price)
        .bind(booking.commission)
        .bind(booking.is_manual as i64)
        .bind(serde_json::to_string(&booking.metadata)?)
        .bind(serde_json::to_string(&booking.ledger)?)
        .bind(booking.deleted_at.map(|dt| dt.to_rfc3339()))
        .bind(booking.id)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Persist only the sync ledger. The merge resolver replaces the
    /// baseline snapshot unconditionally, even when every remote change
    /// was held back and the booking row itself stays untouched.
    pub async fn update_booking_ledger(
        &self,
        booking_id: i64,
        ledger: &BTreeMap<String, LedgerEntry>,
    ) -> SyncResult<()> {
        sqlx::query("UPDATE bookings SET ledger = ? WHERE id = ?")
            .bind(serde_json::to_string(ledger)?)
            .bind(booking_id)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    pub async fn booking(&self, id: i64) -> SyncResult<Option<Booking>> {
        let row = sqlx::query("SELECT * FROM bookings WHERE id = ? AND deleted_at IS NULL")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        row.as_ref().map(booking_from_row).transpose()
    }

    pub async fn booking_by_uid(&self, unit_id: i64, uid: &str) -> SyncResult<Option<Booking>> {
        let row = sqlx::query(
            "SELECT * FROM bookings WHERE unit_id = ? AND uid = ? AND deleted_at IS NULL",
        )
        .bind(unit_id)
        .bind(uid)
        .fetch_optional(self.pool())
        .await?;
        row.as_ref().map(booking_from_row).transpose()
    }

    /// Identity lookup including tombstoned rows. The sync engine must
    /// see a soft-deleted booking so it neither resurrects it nor tries
    /// to insert a duplicate (uid, unit) row.
    pub async fn booking_any(&self, id: i64) -> SyncResult<Option<Booking>> {
        let row = sqlx::query("SELECT * FROM bookings WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        row.as_ref().map(booking_from_row).transpose()
    }

    /// See [`Store::booking_any`].
    pub async fn booking_by_uid_any(&self, unit_id: i64, uid: &str) -> SyncResult<Option<Booking>> {
        let row = sqlx::query("SELECT * FROM bookings WHERE unit_id = ? AND uid = ?")
            .bind(unit_id)
            .bind(uid)
            .fetch_optional(self.pool())
            .await?;
        row.as_ref().map(booking_from_row).transpose()
    }

    /// Tombstone a superseded booking.
    pub async fn soft_delete_booking(&self, id: i64, at: DateTime<Utc>) -> SyncResult<()> {
        sqlx::query("UPDATE bookings SET deleted_at = ?, status = ? WHERE id = ?")
            .bind(at.to_rfc3339())
            .bind(BookingStatus::Deleted.as_str())
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    /// Remove a booking outright, along with its control-string
    /// mappings. Reserved for synthetic "unavailable" placeholders.
    pub async fn hard_delete_booking(&self, id: i64) -> SyncResult<()> {
        sqlx::query("DELETE FROM source_mappings WHERE booking_id = ?")
            .bind(id)
            .execute(self.pool())
            .await?;
        sqlx::query("DELETE FROM bookings WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    /// Live bookings of a unit that the vanished sweep may consider:
    /// departure today or later, status not already terminal, not manual.
    /// The caller still filters by seen-UID set and owning source.
    pub async fn vanished_candidates(
        &self,
        unit_id: i64,
        today: NaiveDate,
    ) -> SyncResult<Vec<Booking>> {
        let rows = sqlx::query(
            "SELECT * FROM bookings
             WHERE unit_id = ? AND deleted_at IS NULL AND is_manual = 0
               AND check_out >= ?
               AND status NOT IN (?, ?, ?, ?, ?)
             ORDER BY id",
        )
        .bind(unit_id)
        .bind(date_text(today))
        .bind(BookingStatus::Cancelled.as_str())
        .bind(BookingStatus::CancelledByOwner.as_str())
        .bind(BookingStatus::CancelledByGuest.as_str())
        .bind(BookingStatus::Vanished.as_str())
        .bind(BookingStatus::Deleted.as_str())
        .fetch_all(self.pool())
        .await?;

        rows.iter().map(booking_from_row).collect()
    }

    /// Live bookings departing on `from` or later, for operator listings.
    pub async fn upcoming_bookings(
        &self,
        unit_id: Option<i64>,
        from: NaiveDate,
    ) -> SyncResult<Vec<Booking>> {
        let rows = sqlx::query(
            "SELECT * FROM bookings
             WHERE deleted_at IS NULL AND check_out >= ?
               AND (? IS NULL OR unit_id = ?)
             ORDER BY check_in, id",
        )
        .bind(date_text(from))
        .bind(unit_id)
        .bind(unit_id)
        .fetch_all(self.pool())
        .await?;

        rows.iter().map(booking_from_row).collect()
    }
}
