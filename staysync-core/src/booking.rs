//! Booking model and the per-source sync ledger.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lifecycle status of a booking.
///
/// Unknown status strings from a feed decode to `Undefined` rather than
/// failing the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Undefined,
    New,
    Confirmed,
    Request,
    Inquiry,
    Cancelled,
    CancelledByOwner,
    CancelledByGuest,
    Vanished,
    Deleted,
    Blocked,
    Unavailable,
}

impl BookingStatus {
    pub fn parse(s: &str) -> BookingStatus {
        match s.trim().to_lowercase().as_str() {
            "new" => BookingStatus::New,
            "confirmed" => BookingStatus::Confirmed,
            "request" => BookingStatus::Request,
            "inquiry" => BookingStatus::Inquiry,
            "cancelled" => BookingStatus::Cancelled,
            "cancelled_by_owner" => BookingStatus::CancelledByOwner,
            "cancelled_by_guest" => BookingStatus::CancelledByGuest,
            "vanished" => BookingStatus::Vanished,
            "deleted" => BookingStatus::Deleted,
            "blocked" => BookingStatus::Blocked,
            "unavailable" => BookingStatus::Unavailable,
            _ => BookingStatus::Undefined,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Undefined => "undefined",
            BookingStatus::New => "new",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Request => "request",
            BookingStatus::Inquiry => "inquiry",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::CancelledByOwner => "cancelled_by_owner",
            BookingStatus::CancelledByGuest => "cancelled_by_guest",
            BookingStatus::Vanished => "vanished",
            BookingStatus::Deleted => "deleted",
            BookingStatus::Blocked => "blocked",
            BookingStatus::Unavailable => "unavailable",
        }
    }

    /// Terminal states are never re-marked by the vanished sweep.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BookingStatus::Cancelled
                | BookingStatus::CancelledByOwner
                | BookingStatus::CancelledByGuest
                | BookingStatus::Vanished
                | BookingStatus::Deleted
        )
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-source sync record stored on the booking.
///
/// `processed` is the baseline for three-way merges; `checksum` is the
/// change-detection fingerprint of that snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub raw: BTreeMap<String, String>,
    pub processed: BTreeMap<String, Value>,
    pub checksum: String,
    pub synced_at: DateTime<Utc>,
}

/// A booking, unique per (uid, unit).
///
/// `check_out` is the real departure date (iCal DTEND), not "last night".
#[derive(Debug, Clone)]
pub struct Booking {
    pub id: i64,
    pub unit_id: i64,
    pub uid: String,
    pub guest_name: Option<String>,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub status: BookingStatus,
    pub adults: Option<i64>,
    pub children: Option<i64>,
    pub group_id: Option<String>,
    pub notes: Option<String>,
    pub price: Option<f64>,
    pub commission: Option<f64>,
    pub is_manual: bool,
    pub metadata: BTreeMap<String, Value>,
    pub ledger: BTreeMap<String, LedgerEntry>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Booking {
    pub fn new(unit_id: i64, uid: &str, check_in: NaiveDate, check_out: NaiveDate) -> Self {
        Booking {
            id: 0,
            unit_id,
            uid: uid.to_string(),
            guest_name: None,
            check_in,
            check_out,
            status: BookingStatus::New,
            adults: None,
            children: None,
            group_id: None,
            notes: None,
            price: None,
            commission: None,
            is_manual: false,
            metadata: BTreeMap::new(),
            ledger: BTreeMap::new(),
            deleted_at: None,
        }
    }

    pub fn nights(&self) -> i64 {
        (self.check_out - self.check_in).num_days()
    }

    /// Read a named field as a JSON value, for merge comparisons.
    pub fn field_value(&self, field: &str) -> Value {
        fn opt_str(v: &Option<String>) -> Value {
            v.as_ref().map_or(Value::Null, |s| Value::String(s.clone()))
        }

        match field {
            "guest_name" => opt_str(&self.guest_name),
            "check_in" => Value::String(self.check_in.format("%Y-%m-%d").to_string()),
            "check_out" => Value::String(self.check_out.format("%Y-%m-%d").to_string()),
            "status" => Value::String(self.status.as_str().to_string()),
            "adults" => self.adults.map_or(Value::Null, Value::from),
            "children" => self.children.map_or(Value::Null, Value::from),
            "group_id" => opt_str(&self.group_id),
            "notes" => opt_str(&self.notes),
            "price" => self.price.map_or(Value::Null, Value::from),
            "commission" => self.commission.map_or(Value::Null, Value::from),
            "metadata" => Value::Object(self.metadata.clone().into_iter().collect()),
            _ => Value::Null,
        }
    }

    /// Write a named field from a JSON value. Returns false for unknown
    /// fields or values of the wrong shape, which are left untouched.
    pub fn set_field(&mut self, field: &str, value: &Value) -> bool {
        fn as_opt_string(v: &Value) -> Option<String> {
            match v {
                Value::String(s) => Some(s.clone()),
                Value::Null => None,
                other => Some(other.to_string()),
            }
        }

        match field {
            "guest_name" => self.guest_name = as_opt_string(value),
            "check_in" => match value.as_str().and_then(parse_date) {
                Some(d) => self.check_in = d,
                None => return false,
            },
            "check_out" => match value.as_str().and_then(parse_date) {
                Some(d) => self.check_out = d,
                None => return false,
            },
            "status" => match value.as_str() {
                Some(s) => self.status = BookingStatus::parse(s),
                None => return false,
            },
            "adults" => self.adults = value.as_i64(),
            "children" => self.children = value.as_i64(),
            "group_id" => self.group_id = as_opt_string(value),
            "notes" => self.notes = as_opt_string(value),
            "price" => self.price = value.as_f64(),
            "commission" => self.commission = value.as_f64(),
            "metadata" => match value {
                Value::Object(map) => {
                    self.metadata = map.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
                }
                Value::Null => self.metadata = BTreeMap::new(),
                _ => return false,
            },
            _ => return false,
        }
        true
    }
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn booking() -> Booking {
        Booking::new(
            1,
            "uid-1",
            NaiveDate::from_ymd_opt(2025, 6, 15).unwrap(),
            NaiveDate::from_ymd_opt(2025, 6, 20).unwrap(),
        )
    }

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            BookingStatus::New,
            BookingStatus::CancelledByOwner,
            BookingStatus::Unavailable,
        ] {
            assert_eq!(BookingStatus::parse(status.as_str()), status);
        }
        assert_eq!(BookingStatus::parse("something else"), BookingStatus::Undefined);
    }

    #[test]
    fn terminal_states() {
        assert!(BookingStatus::Cancelled.is_terminal());
        assert!(BookingStatus::Vanished.is_terminal());
        assert!(!BookingStatus::Confirmed.is_terminal());
        assert!(!BookingStatus::Unavailable.is_terminal());
    }

    #[test]
    fn field_round_trip_through_values() {
        let mut b = booking();
        assert!(b.set_field("guest_name", &Value::String("Ada".into())));
        assert!(b.set_field("adults", &Value::from(2)));
        assert!(b.set_field("check_out", &Value::String("2025-06-22".into())));

        assert_eq!(b.field_value("guest_name"), Value::String("Ada".into()));
        assert_eq!(b.field_value("adults"), Value::from(2));
        assert_eq!(
            b.field_value("check_out"),
            Value::String("2025-06-22".into())
        );
    }

    #[test]
    fn set_field_rejects_bad_dates_and_unknown_fields() {
        let mut b = booking();
        assert!(!b.set_field("check_in", &Value::String("not a date".into())));
        assert!(!b.set_field("flux_capacitor", &Value::Bool(true)));
        assert_eq!(b.check_in, NaiveDate::from_ymd_opt(2025, 6, 15).unwrap());
    }

    #[test]
    fn nights_is_departure_minus_arrival() {
        assert_eq!(booking().nights(), 5);
    }
}
