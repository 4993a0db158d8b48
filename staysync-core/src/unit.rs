//! Rentable unit owned by a property.

use serde::{Deserialize, Serialize};

/// A rentable unit. `rate_formula` is the rate-lookup contract surface:
/// an arithmetic formula string evaluated over a fixed variable set when
/// quoting the price of a newly synced booking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Unit {
    pub id: i64,
    pub property_id: i64,
    pub name: String,
    pub rate_formula: Option<String>,
}
