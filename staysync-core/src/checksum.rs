//! Change-detection fingerprints for processed event data.
//!
//! Feeds re-deliver hundreds of unchanged events every cycle; comparing
//! fingerprints lets the orchestrator skip them without touching the
//! store. Collision resistance is not a security requirement here, only
//! stability.

use std::collections::BTreeMap;

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Fingerprint a processed field map.
///
/// Keys are already sorted by the BTreeMap; serde_json keeps Unicode
/// unescaped, so two logically identical maps serialize identically
/// regardless of input order.
pub fn fingerprint(fields: &BTreeMap<String, Value>) -> String {
    let canonical = serde_json::to_string(fields).unwrap_or_default();
    let hash = Sha256::digest(canonical.as_bytes());
    format!("{hash:x}")
}
