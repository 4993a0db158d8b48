//! Three-way merge of remote event data against local bookings.
//!
//! The baseline is the processed snapshot recorded in the booking's
//! ledger on the previous sync. A field whose live value still matches
//! the baseline accepts the remote value; a field edited locally since
//! then is left alone and the disagreement is surfaced as a diff.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::booking::Booking;

/// A remote change accepted onto the booking.
#[derive(Debug, Clone)]
pub struct AppliedChange {
    pub field: String,
    pub old: Value,
    pub new: Value,
}

/// A remote change held back because the field was edited locally since
/// the last sync. Not an error; both values stay visible to the operator.
#[derive(Debug, Clone)]
pub struct FieldDiff {
    pub field: String,
    pub local: Value,
    pub remote: Value,
    pub baseline: Value,
}

#[derive(Debug, Clone, Default)]
pub struct MergeOutcome {
    pub updated: Vec<AppliedChange>,
    pub diffs: Vec<FieldDiff>,
}

impl MergeOutcome {
    pub fn changed(&self) -> bool {
        !self.updated.is_empty()
    }
}

/// Apply remote field data to a booking using the ledger baseline for
/// `source_key`.
///
/// The caller is responsible for replacing the ledger snapshot afterwards
/// and for persisting the booking when `outcome.changed()`.
pub fn apply(
    booking: &mut Booking,
    new_data: &BTreeMap<String, Value>,
    source_key: &str,
) -> MergeOutcome {
    let mut outcome = MergeOutcome::default();

    for (field, remote) in new_data {
        let current = booking.field_value(field);
        if value_eq(&current, remote) {
            continue;
        }

        let baseline = booking
            .ledger
            .get(source_key)
            .and_then(|entry| entry.processed.get(field))
            .cloned()
            .unwrap_or(Value::Null);

        if value_eq(&current, &baseline) {
            // No local edit since last sync: the remote value wins.
            if booking.set_field(field, remote) {
                outcome.updated.push(AppliedChange {
                    field: field.clone(),
                    old: current,
                    new: remote.clone(),
                });
            }
        } else {
            outcome.diffs.push(FieldDiff {
                field: field.clone(),
                local: current,
                remote: remote.clone(),
                baseline,
            });
        }
    }

    outcome
}

/// Equality with null ≡ empty-value semantics; otherwise strict type and
/// value equality.
pub fn value_eq(a: &Value, b: &Value) -> bool {
    if is_empty(a) && is_empty(b) {
        return true;
    }
    a == b
}

fn is_empty(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::booking::LedgerEntry;
    use chrono::{NaiveDate, Utc};

    const SOURCE: &str = "ical-1";

    fn booking_with_baseline(pairs: &[(&str, Value)]) -> Booking {
        let mut booking = Booking::new(
            1,
            "uid-1",
            NaiveDate::from_ymd_opt(2025, 6, 15).unwrap(),
            NaiveDate::from_ymd_opt(2025, 6, 20).unwrap(),
        );
        let processed: BTreeMap<String, Value> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        for (field, value) in &processed {
            booking.set_field(field, value);
        }
        booking.ledger.insert(
            SOURCE.to_string(),
            LedgerEntry {
                raw: BTreeMap::new(),
                checksum: crate::checksum::fingerprint(&processed),
                processed,
                synced_at: Utc::now(),
            },
        );
        booking
    }

    fn data(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn clean_remote_change_is_accepted_and_logged() {
        let mut booking =
            booking_with_baseline(&[("guest_name", Value::String("Ada Lovelace".into()))]);

        let outcome = apply(
            &mut booking,
            &data(&[("guest_name", Value::String("Ada King".into()))]),
            SOURCE,
        );

        assert_eq!(booking.guest_name.as_deref(), Some("Ada King"));
        assert_eq!(outcome.updated.len(), 1);
        assert_eq!(outcome.updated[0].old, Value::String("Ada Lovelace".into()));
        assert!(outcome.diffs.is_empty());
    }

    #[test]
    fn local_edit_is_preserved_and_surfaced_as_diff() {
        let mut booking =
            booking_with_baseline(&[("guest_name", Value::String("Ada Lovelace".into()))]);
        // Manual correction after the last sync.
        booking.guest_name = Some("Ada Byron".to_string());

        let outcome = apply(
            &mut booking,
            &data(&[("guest_name", Value::String("Ada King".into()))]),
            SOURCE,
        );

        assert_eq!(booking.guest_name.as_deref(), Some("Ada Byron"));
        assert!(outcome.updated.is_empty());
        assert_eq!(outcome.diffs.len(), 1);
        let diff = &outcome.diffs[0];
        assert_eq!(diff.local, Value::String("Ada Byron".into()));
        assert_eq!(diff.remote, Value::String("Ada King".into()));
        assert_eq!(diff.baseline, Value::String("Ada Lovelace".into()));
    }

    #[test]
    fn identical_remote_value_is_a_no_op() {
        let mut booking =
            booking_with_baseline(&[("guest_name", Value::String("Ada Lovelace".into()))]);

        let outcome = apply(
            &mut booking,
            &data(&[("guest_name", Value::String("Ada Lovelace".into()))]),
            SOURCE,
        );

        assert!(outcome.updated.is_empty());
        assert!(outcome.diffs.is_empty());
    }

    #[test]
    fn null_and_empty_string_compare_equal() {
        assert!(value_eq(&Value::Null, &Value::String(String::new())));
        assert!(value_eq(&Value::Null, &Value::Null));
        assert!(!value_eq(&Value::Null, &Value::String("x".into())));
        // Otherwise strict: no cross-type coercion.
        assert!(!value_eq(&Value::from(2), &Value::String("2".into())));
    }

    #[test]
    fn missing_baseline_field_counts_as_empty() {
        // Field never seen from this source; live value empty too.
        let mut booking = booking_with_baseline(&[]);
        let outcome = apply(
            &mut booking,
            &data(&[("notes", Value::String("bring firewood".into()))]),
            SOURCE,
        );
        assert_eq!(booking.notes.as_deref(), Some("bring firewood"));
        assert_eq!(outcome.updated.len(), 1);
    }

    #[test]
    fn date_shift_applies_when_untouched_locally() {
        let mut booking =
            booking_with_baseline(&[("check_out", Value::String("2025-06-20".into()))]);

        let outcome = apply(
            &mut booking,
            &data(&[("check_out", Value::String("2025-06-22".into()))]),
            SOURCE,
        );

        assert!(outcome.changed());
        assert_eq!(
            booking.check_out,
            NaiveDate::from_ymd_opt(2025, 6, 22).unwrap()
        );
    }
}
