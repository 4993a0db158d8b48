//! Stable identity mapping for external events.
//!
//! UIDs are only unique within one feed, and some OTAs recycle them.
//! The control string folds source type, source id, external event id
//! and property id into one deterministic join key, so the same logical
//! event maps to the same local booking across syncs.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Link from a control string to a local booking.
#[derive(Debug, Clone)]
pub struct SourceMapping {
    pub control: String,
    pub booking_id: i64,
}

/// Build the control string for an iCal feed event.
pub fn booking_control(
    source_type: &str,
    source_id: i64,
    event_uid: &str,
    property_id: i64,
) -> String {
    control_string(&[
        Value::String(source_type.to_string()),
        Value::from(source_id),
        Value::String(event_uid.to_string()),
        Value::from(property_id),
    ])
}

/// Join normalized parts with `:`.
pub fn control_string(parts: &[Value]) -> String {
    parts
        .iter()
        .map(normalize_part)
        .collect::<Vec<_>>()
        .join(":")
}

/// Normalize one part to text: numbers as decimal, booleans as "1"/"0",
/// compound values via a stable hash of their canonical serialized form.
fn normalize_part(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(true) => "1".to_string(),
        Value::Bool(false) => "0".to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        compound => {
            let canonical = serde_json::to_string(compound).unwrap_or_default();
            let hash = Sha256::digest(canonical.as_bytes());
            format!("{hash:x}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn control_string_is_deterministic() {
        let a = booking_control("ical", 3, "abc123", 7);
        let b = booking_control("ical", 3, "abc123", 7);
        assert_eq!(a, b);
        assert_eq!(a, "ical:3:abc123:7");
    }

    #[test]
    fn any_differing_part_changes_the_key() {
        let base = booking_control("ical", 3, "abc123", 7);
        assert_ne!(base, booking_control("ical", 4, "abc123", 7));
        assert_ne!(base, booking_control("ical", 3, "abc124", 7));
        assert_ne!(base, booking_control("ical", 3, "abc123", 8));
    }

    #[test]
    fn scalar_parts_normalize_to_text() {
        let s = control_string(&[
            json!(true),
            json!(false),
            json!(1.5),
            json!("x"),
            Value::Null,
        ]);
        assert_eq!(s, "1:0:1.5:x:");
    }

    #[test]
    fn compound_parts_hash_stably() {
        let a = control_string(&[json!({"b": 2, "a": 1})]);
        let b = control_string(&[json!({"a": 1, "b": 2})]);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_ne!(a, control_string(&[json!({"a": 1, "b": 3})]));
    }
}
