//! Structured metadata extraction from free-text event descriptions.
//!
//! OTA feeds smuggle booking details into DESCRIPTION as `KEY: value`
//! lines. This decoder recognizes the known keys, keeps unknown keyed
//! lines verbatim, and degrades anything else to free-text notes.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

static KEY_VALUE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z][A-Za-z0-9]*)\s*:\s*(.*)$").unwrap());

/// Matches a phone number with no leading zero and no `+` prefix, which
/// the fixup below assumes is an international number missing its `+`.
/// Known-lossy heuristic, kept as-is.
static BARE_INTL_NUMBER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[1-9][0-9]+$").unwrap());

/// Decoded keys that map onto first-class booking columns. Everything
/// else the grammar recognizes rides along as auxiliary metadata.
pub const BOOKING_FIELD_KEYS: &[&str] = &["status", "group_id", "adults", "children", "notes"];

/// Result of decoding one DESCRIPTION.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedMetadata {
    /// Values destined for booking columns.
    pub fields: BTreeMap<String, Value>,
    /// Auxiliary values stored as an opaque blob on the booking.
    pub metadata: BTreeMap<String, Value>,
}

impl DecodedMetadata {
    pub fn status(&self) -> Option<&str> {
        self.fields.get("status").and_then(Value::as_str)
    }
}

/// Decode a DESCRIPTION string (already unescaped) into booking fields,
/// auxiliary metadata, and free-text notes.
pub fn decode(description: &str) -> DecodedMetadata {
    let mut decoded: BTreeMap<String, Value> = BTreeMap::new();
    let mut free_text: Vec<&str> = Vec::new();
    let mut explicit_notes = false;

    for line in description.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let Some(caps) = KEY_VALUE.captures(line) else {
            free_text.push(line);
            continue;
        };

        let key = caps[1].to_lowercase();
        let value = caps[2].trim();
        if value.is_empty() {
            continue;
        }

        match key.as_str() {
            "status" => {
                let mut parts = value.split('/');
                set_str(&mut decoded, "status", parts.next());
                set_str(&mut decoded, "group_id", parts.next());
            }
            "guests" => {
                let mut parts = value.split('/');
                set_int(&mut decoded, "guests", parts.next());
                set_int(&mut decoded, "adults", parts.next());
                set_int(&mut decoded, "children", parts.next());
            }
            "adult" | "adults" => set_int(&mut decoded, "adults", Some(value)),
            "child" | "children" => set_int(&mut decoded, "children", Some(value)),
            "time" => set_str(&mut decoded, "arrival_time", Some(value)),
            "phone" => {
                let mut parts = value.split('/');
                set_str(&mut decoded, "phone", parts.next());
                set_str(&mut decoded, "mobile", parts.next());
            }
            "mobile" => set_str(&mut decoded, "mobile", Some(value)),
            "email" => set_str(&mut decoded, "email", Some(value)),
            "ctry" | "country" | "country2" => set_str(&mut decoded, "country", Some(value)),
            "comments" => set_str(&mut decoded, "guest_comments", Some(value)),
            "notes" => {
                set_str(&mut decoded, "notes", Some(value));
                explicit_notes = true;
            }
            "ota" => {
                // OTA:VRBO 123456 and OTA:VRBO/123456 are equivalent.
                let normalized = if value.contains('/') {
                    value.to_string()
                } else {
                    value.replacen(' ', "/", 1)
                };
                let mut parts = normalized.splitn(2, '/');
                set_str(&mut decoded, "api_source", parts.next());
                set_str(&mut decoded, "api_ref", parts.next());
            }
            other => {
                decoded.insert(other.to_string(), Value::String(value.to_string()));
            }
        }

        fix_phone_prefix(&mut decoded, "phone");
        fix_phone_prefix(&mut decoded, "mobile");
    }

    if !explicit_notes && !free_text.is_empty() {
        decoded.insert("notes".to_string(), Value::String(free_text.join("\n")));
    }

    let mut out = DecodedMetadata::default();
    for (key, value) in decoded {
        if BOOKING_FIELD_KEYS.contains(&key.as_str()) {
            out.fields.insert(key, value);
        } else {
            out.metadata.insert(key, value);
        }
    }
    out
}

fn set_str(decoded: &mut BTreeMap<String, Value>, key: &str, value: Option<&str>) {
    if let Some(v) = value {
        let v = v.trim();
        if !v.is_empty() {
            decoded.insert(key.to_string(), Value::String(v.to_string()));
        }
    }
}

fn set_int(decoded: &mut BTreeMap<String, Value>, key: &str, value: Option<&str>) {
    if let Some(v) = value {
        decoded.insert(key.to_string(), Value::from(int_cast(v)));
    }
}

/// Integer cast with leading-prefix semantics: "4 adults" is 4, junk is 0.
fn int_cast(value: &str) -> i64 {
    let trimmed = value.trim();
    let digits: String = trimmed
        .chars()
        .enumerate()
        .take_while(|(i, c)| c.is_ascii_digit() || (*i == 0 && *c == '-'))
        .map(|(_, c)| c)
        .collect();
    digits.parse().unwrap_or(0)
}

fn fix_phone_prefix(decoded: &mut BTreeMap<String, Value>, key: &str) {
    let Some(Value::String(number)) = decoded.get(key) else {
        return;
    };
    if BARE_INTL_NUMBER.is_match(number) {
        let fixed = format!("+{number}");
        decoded.insert(key.to_string(), Value::String(fixed));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn str_of<'a>(map: &'a BTreeMap<String, Value>, key: &str) -> Option<&'a str> {
        map.get(key).and_then(Value::as_str)
    }

    #[test]
    fn status_line_splits_into_status_and_group() {
        let d = decode("STATUS:confirmed/g1");
        assert_eq!(str_of(&d.fields, "status"), Some("confirmed"));
        assert_eq!(str_of(&d.fields, "group_id"), Some("g1"));
    }

    #[test]
    fn guests_line_splits_into_counts() {
        let d = decode("GUESTS:4/2/2");
        assert_eq!(d.metadata.get("guests"), Some(&Value::from(4)));
        assert_eq!(d.fields.get("adults"), Some(&Value::from(2)));
        assert_eq!(d.fields.get("children"), Some(&Value::from(2)));
    }

    #[test]
    fn ota_space_and_slash_forms_decode_identically() {
        let spaced = decode("OTA:VRBO 123456");
        let slashed = decode("OTA:VRBO/123456");
        assert_eq!(spaced, slashed);
        assert_eq!(str_of(&spaced.metadata, "api_source"), Some("VRBO"));
        assert_eq!(str_of(&spaced.metadata, "api_ref"), Some("123456"));
    }

    #[test]
    fn phone_gains_plus_prefix_when_it_looks_international() {
        let d = decode("PHONE:4915112345678");
        assert_eq!(str_of(&d.metadata, "phone"), Some("+4915112345678"));
    }

    #[test]
    fn phone_with_plus_or_leading_zero_is_left_alone() {
        let d = decode("PHONE:+4915112345678\nMOBILE:017612345678");
        assert_eq!(str_of(&d.metadata, "phone"), Some("+4915112345678"));
        assert_eq!(str_of(&d.metadata, "mobile"), Some("017612345678"));
    }

    #[test]
    fn phone_slash_splits_phone_and_mobile() {
        let d = decode("PHONE:4930123456/4915198765");
        assert_eq!(str_of(&d.metadata, "phone"), Some("+4930123456"));
        assert_eq!(str_of(&d.metadata, "mobile"), Some("+4915198765"));
    }

    #[test]
    fn unknown_keyed_lines_are_retained_as_metadata() {
        let d = decode("FLIGHTNO: LH123");
        assert_eq!(str_of(&d.metadata, "flightno"), Some("LH123"));
    }

    #[test]
    fn unmatched_lines_become_notes() {
        let d = decode("Late arrival expected\nPlease prepare the crib");
        assert_eq!(
            str_of(&d.fields, "notes"),
            Some("Late arrival expected\nPlease prepare the crib")
        );
    }

    #[test]
    fn explicit_notes_key_wins_over_free_text() {
        let d = decode("NOTES:from the key\nsome stray line");
        assert_eq!(str_of(&d.fields, "notes"), Some("from the key"));
    }

    #[test]
    fn country_aliases_collapse_to_country() {
        for line in ["CTRY:DE", "COUNTRY:DE", "COUNTRY2:DE"] {
            let d = decode(line);
            assert_eq!(str_of(&d.metadata, "country"), Some("DE"), "line {line}");
        }
    }

    #[test]
    fn int_cast_matches_loose_numeric_semantics() {
        assert_eq!(int_cast("4"), 4);
        assert_eq!(int_cast("4 adults"), 4);
        assert_eq!(int_cast("adults"), 0);
        assert_eq!(int_cast(""), 0);
    }

    #[test]
    fn every_decoded_key_lands_in_exactly_one_bucket() {
        let d = decode("STATUS:confirmed/g1\nGUESTS:4/2/2\nEMAIL:a@b.com\nTIME:14:30");
        for key in d.fields.keys() {
            assert!(!d.metadata.contains_key(key), "{key} in both buckets");
        }
        assert_eq!(str_of(&d.metadata, "arrival_time"), Some("14:30"));
        assert_eq!(str_of(&d.metadata, "email"), Some("a@b.com"));
    }
}
