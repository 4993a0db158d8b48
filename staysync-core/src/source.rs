//! External feed configuration attached to a unit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Source-type tag for iCal feeds, used when building control strings.
pub const SOURCE_TYPE_ICAL: &str = "ical";

/// One external calendar feed. Created by administrators; the sync engine
/// only ever writes the `last_synced_at` / `last_error` columns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub id: i64,
    pub unit_id: i64,
    pub url: String,
    pub enabled: bool,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl Source {
    /// Key under which this source's snapshots live in a booking's ledger.
    pub fn ledger_key(&self) -> String {
        format!("{}-{}", SOURCE_TYPE_ICAL, self.id)
    }
}
