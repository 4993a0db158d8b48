//! Sync orchestration.
//!
//! Drives fetch → parse → decode → merge → persist per source, then the
//! vanished-booking sweep against the feed's UID set. Sources are
//! processed one at a time; a failing source is recorded and contained,
//! never allowed to abort the rest of the run.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::booking::{Booking, BookingStatus, LedgerEntry};
use crate::checksum;
use crate::config::Config;
use crate::error::{SyncError, SyncResult};
use crate::fetch;
use crate::ics::{self, RawEvent};
use crate::mapping;
use crate::merge;
use crate::metadata::{self, DecodedMetadata};
use crate::rates;
use crate::source::{SOURCE_TYPE_ICAL, Source};
use crate::store::{AuditEntry, SourceFilter, Store};
use crate::unit::Unit;

const GUARD_KEY: &str = "last_sync_started_at";

/// Per-source sync result.
#[derive(Debug, Clone, Default)]
pub struct SyncOutcome {
    pub source_id: i64,
    pub unit_id: i64,
    /// Events found in the feed.
    pub total: usize,
    pub created: usize,
    pub updated: usize,
    /// Checksum matches, skipped without a store write.
    pub unchanged: usize,
    /// Events without UID/DTSTART/DTEND, plus manual bookings left alone.
    pub skipped: usize,
    /// Remote changes held back because of local edits.
    pub conflicts: usize,
    /// Hard-deleted "unavailable" placeholders.
    pub deleted: usize,
    pub vanished: usize,
    pub error: Option<String>,
}

pub struct Syncer {
    store: Store,
    config: Config,
    client: reqwest::Client,
}

impl Syncer {
    pub fn new(store: Store, config: Config) -> SyncResult<Syncer> {
        let client = fetch::build_client(&config)?;
        Ok(Syncer {
            store,
            config,
            client,
        })
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Sync every enabled source matching the filter, sequentially.
    ///
    /// Returns `None` when a run already started inside the debounce
    /// window and `force` is false. The guard is cooperative and
    /// best-effort; syncs are idempotent, so an overlap is wasteful but
    /// harmless.
    pub async fn sync_all(
        &self,
        filter: &SourceFilter,
        force: bool,
    ) -> SyncResult<Option<Vec<SyncOutcome>>> {
        if !self.acquire_guard(force).await? {
            info!("sync debounced: a run started inside the guard window");
            return Ok(None);
        }

        let sources = self.store.sources(filter).await?;
        let mut outcomes = Vec::with_capacity(sources.len());
        for source in &sources {
            outcomes.push(self.sync_source(source).await);
        }
        Ok(Some(outcomes))
    }

    /// Claim the cooperative debounce guard. Returns false when a run
    /// already started inside the TTL window and `force` is false.
    pub async fn acquire_guard(&self, force: bool) -> SyncResult<bool> {
        if !force {
            if let Some(raw) = self.store.meta_get(GUARD_KEY).await? {
                if let Ok(started) = raw.parse::<DateTime<Utc>>() {
                    let ttl = chrono::Duration::minutes(self.config.sync_guard_ttl_mins);
                    if Utc::now() - started < ttl {
                        return Ok(false);
                    }
                }
            }
        }
        self.store.meta_set(GUARD_KEY, &Utc::now().to_rfc3339()).await?;
        Ok(true)
    }

    /// Sync one source. All failures are recorded on the source and in
    /// the outcome; nothing propagates past this boundary.
    pub async fn sync_source(&self, source: &Source) -> SyncOutcome {
        let mut outcome = SyncOutcome {
            source_id: source.id,
            unit_id: source.unit_id,
            ..Default::default()
        };

        if self.config.inter_request_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.config.inter_request_delay_ms)).await;
        }

        let result = self.fetch_and_process(source, &mut outcome).await;

        match result {
            Ok(()) => {
                if let Err(e) = self.store.mark_source_synced(source.id, Utc::now()).await {
                    warn!(source = source.id, error = %e, "failed to record sync timestamp");
                }
            }
            Err(e) => {
                warn!(
                    source = source.id,
                    unit = source.unit_id,
                    url = %source.url,
                    error = %e,
                    "source sync failed"
                );
                outcome.error = Some(e.to_string());
                if let Err(store_err) = self.store.mark_source_error(source.id, &e.to_string()).await
                {
                    warn!(source = source.id, error = %store_err, "failed to record sync error");
                }
            }
        }

        outcome
    }

    async fn fetch_and_process(
        &self,
        source: &Source,
        outcome: &mut SyncOutcome,
    ) -> SyncResult<()> {
        let unit = self
            .store
            .unit(source.unit_id)
            .await?
            .ok_or(SyncError::UnitNotFound(source.unit_id))?;

        let text = fetch::fetch_feed(&self.client, &source.url).await?;
        self.process_feed(source, &unit, &text, outcome).await
    }

    /// Reconcile already-fetched feed text against the store.
    ///
    /// Split out from the fetch so feeds can be processed from any
    /// transport (and driven directly in tests).
    pub async fn process_feed(
        &self,
        source: &Source,
        unit: &Unit,
        text: &str,
        outcome: &mut SyncOutcome,
    ) -> SyncResult<()> {
        let events = ics::parse_feed(text);
        outcome.total = events.len();

        let ledger_key = source.ledger_key();
        let mut seen: HashSet<String> = HashSet::new();

        for event in &events {
            let (Some(uid), Some(check_in), Some(check_out)) = (
                event.get("UID").map(str::trim).filter(|s| !s.is_empty()),
                event.get("DTSTART").and_then(ics::parse_ical_date),
                event.get("DTEND").and_then(ics::parse_ical_date),
            ) else {
                debug!(
                    source = source.id,
                    unit = unit.id,
                    "skipping event without UID/DTSTART/DTEND"
                );
                outcome.skipped += 1;
                continue;
            };

            seen.insert(uid.to_string());
            self.process_event(source, unit, &ledger_key, event, uid, check_in, check_out, outcome)
                .await?;
        }

        self.sweep_vanished(source, unit, &ledger_key, &seen, outcome)
            .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn process_event(
        &self,
        source: &Source,
        unit: &Unit,
        ledger_key: &str,
        event: &RawEvent,
        uid: &str,
        check_in: chrono::NaiveDate,
        check_out: chrono::NaiveDate,
        outcome: &mut SyncOutcome,
    ) -> SyncResult<()> {
        let summary = ics::unescape_text(event.get("SUMMARY").unwrap_or_default());
        let description = ics::unescape_text(event.get("DESCRIPTION").unwrap_or_default());
        let decoded = metadata::decode(&description);
        let status = derive_status(&summary, &decoded);
        let processed = build_processed(&summary, check_in, check_out, status, &decoded);
        let checksum = checksum::fingerprint(&processed);

        // Control string first; (uid, unit) only as a fallback.
        let control =
            mapping::booking_control(SOURCE_TYPE_ICAL, source.id, uid, unit.property_id);
        let existing = match self.store.mapping_booking_id(&control).await? {
            Some(id) => self.store.booking_any(id).await?,
            None => self.store.booking_by_uid_any(unit.id, uid).await?,
        };

        if let Some(booking) = &existing {
            if booking.deleted_at.is_some() {
                // Tombstoned by the operator; neither resurrect nor
                // recreate while the feed still lists it.
                debug!(booking = booking.id, uid, "tombstoned booking left untouched");
                outcome.skipped += 1;
                return Ok(());
            }
        }

        let Some(mut booking) = existing else {
            let mut booking = Booking::new(unit.id, uid, check_in, check_out);
            apply_processed(&mut booking, &processed);
            if booking.price.is_none() {
                booking.price = quote_price(unit, &booking);
            }
            booking.ledger.insert(
                ledger_key.to_string(),
                ledger_entry(event, &processed, &checksum),
            );
            self.store.insert_booking(&mut booking).await?;
            self.store.upsert_mapping(&control, booking.id).await?;
            info!(
                booking = booking.id,
                uid,
                unit = unit.id,
                status = %booking.status,
                "created booking"
            );
            outcome.created += 1;
            return Ok(());
        };

        if booking.is_manual {
            debug!(booking = booking.id, uid, "manual booking left untouched");
            outcome.skipped += 1;
            return Ok(());
        }

        match booking.ledger.get(ledger_key) {
            Some(entry) if entry.checksum == checksum => {
                // Nothing changed upstream; no store write at all.
                outcome.unchanged += 1;
            }
            Some(_) => {
                let merged = merge::apply(&mut booking, &processed, ledger_key);
                booking.ledger.insert(
                    ledger_key.to_string(),
                    ledger_entry(event, &processed, &checksum),
                );

                if merged.changed() {
                    self.store.update_booking(&booking).await?;
                    outcome.updated += 1;
                } else {
                    self.store
                        .update_booking_ledger(booking.id, &booking.ledger)
                        .await?;
                }
                self.store.upsert_mapping(&control, booking.id).await?;

                let now = Utc::now();
                for change in &merged.updated {
                    info!(
                        booking = booking.id,
                        field = %change.field,
                        "applied remote change"
                    );
                    self.store
                        .append_audit(&AuditEntry {
                            booking_id: booking.id,
                            source_key: ledger_key.to_string(),
                            field: change.field.clone(),
                            old_value: change.old.clone(),
                            new_value: change.new.clone(),
                            baseline: None,
                            applied: true,
                            created_at: now,
                        })
                        .await?;
                }
                for diff in &merged.diffs {
                    warn!(
                        booking = booking.id,
                        unit = unit.id,
                        property = unit.property_id,
                        source = source.id,
                        field = %diff.field,
                        "local edit preserved over remote change"
                    );
                    self.store
                        .append_audit(&AuditEntry {
                            booking_id: booking.id,
                            source_key: ledger_key.to_string(),
                            field: diff.field.clone(),
                            old_value: diff.local.clone(),
                            new_value: diff.remote.clone(),
                            baseline: Some(diff.baseline.clone()),
                            applied: false,
                            created_at: now,
                        })
                        .await?;
                }
                outcome.conflicts += merged.diffs.len();
            }
            None => {
                // Known booking with no ledger for this source yet: a
                // migration/backfill case, take the feed wholesale.
                apply_processed(&mut booking, &processed);
                booking.ledger.insert(
                    ledger_key.to_string(),
                    ledger_entry(event, &processed, &checksum),
                );
                self.store.update_booking(&booking).await?;
                self.store.upsert_mapping(&control, booking.id).await?;
                debug!(booking = booking.id, uid, "backfilled ledger from feed");
                outcome.updated += 1;
            }
        }

        Ok(())
    }

    /// Bookings that a previous sync saw but this feed no longer lists.
    /// Only forward-looking bookings are touched; feeds rarely cover the
    /// past, so historical rows must stay as they are.
    async fn sweep_vanished(
        &self,
        source: &Source,
        unit: &Unit,
        ledger_key: &str,
        seen: &HashSet<String>,
        outcome: &mut SyncOutcome,
    ) -> SyncResult<()> {
        let today = Utc::now().date_naive();
        let candidates = self.store.vanished_candidates(unit.id, today).await?;

        for mut booking in candidates {
            if seen.contains(&booking.uid) || !booking.ledger.contains_key(ledger_key) {
                continue;
            }

            if booking.status == BookingStatus::Unavailable {
                // Synthetic availability block, not a real reservation.
                self.store.hard_delete_booking(booking.id).await?;
                info!(
                    booking = booking.id,
                    uid = %booking.uid,
                    unit = unit.id,
                    source = source.id,
                    "deleted unavailable placeholder gone from feed"
                );
                outcome.deleted += 1;
            } else {
                booking.status = BookingStatus::Vanished;
                self.store.update_booking(&booking).await?;
                info!(
                    booking = booking.id,
                    uid = %booking.uid,
                    unit = unit.id,
                    source = source.id,
                    "booking vanished from feed"
                );
                outcome.vanished += 1;
            }
        }

        Ok(())
    }
}

/// Explicit STATUS metadata wins; otherwise known literal summaries map
/// to a status, and anything else leaves the status alone.
fn derive_status(summary: &str, decoded: &DecodedMetadata) -> Option<BookingStatus> {
    if let Some(s) = decoded.status() {
        return Some(BookingStatus::parse(s));
    }
    match summary.trim() {
        "Unavailable" | "Airbnb (Not available)" => Some(BookingStatus::Unavailable),
        "Reserved" => Some(BookingStatus::Confirmed),
        _ => None,
    }
}

/// Normalized field map for one event: the merge input, the checksum
/// input, and the ledger baseline, all in one shape.
fn build_processed(
    summary: &str,
    check_in: chrono::NaiveDate,
    check_out: chrono::NaiveDate,
    status: Option<BookingStatus>,
    decoded: &DecodedMetadata,
) -> BTreeMap<String, Value> {
    let mut processed = BTreeMap::new();

    let guest_name = summary.trim();
    if !guest_name.is_empty() {
        processed.insert(
            "guest_name".to_string(),
            Value::String(guest_name.to_string()),
        );
    }
    processed.insert(
        "check_in".to_string(),
        Value::String(check_in.format("%Y-%m-%d").to_string()),
    );
    processed.insert(
        "check_out".to_string(),
        Value::String(check_out.format("%Y-%m-%d").to_string()),
    );
    if let Some(status) = status {
        processed.insert(
            "status".to_string(),
            Value::String(status.as_str().to_string()),
        );
    }
    for (key, value) in &decoded.fields {
        if key != "status" {
            processed.insert(key.clone(), value.clone());
        }
    }
    processed.insert(
        "metadata".to_string(),
        Value::Object(decoded.metadata.clone().into_iter().collect()),
    );

    processed
}

fn apply_processed(booking: &mut Booking, processed: &BTreeMap<String, Value>) {
    for (field, value) in processed {
        booking.set_field(field, value);
    }
}

fn ledger_entry(
    event: &RawEvent,
    processed: &BTreeMap<String, Value>,
    checksum: &str,
) -> LedgerEntry {
    LedgerEntry {
        raw: event.to_map(),
        processed: processed.clone(),
        checksum: checksum.to_string(),
        synced_at: Utc::now(),
    }
}

/// Quote a price for a freshly created booking when the unit carries a
/// rate formula and the feed priced nothing.
fn quote_price(unit: &Unit, booking: &Booking) -> Option<f64> {
    let formula = unit.rate_formula.as_deref()?.trim();
    if formula.is_empty() {
        return None;
    }

    let adults = booking.adults.unwrap_or(0);
    let children = booking.children.unwrap_or(0);
    let guests = booking
        .metadata
        .get("guests")
        .and_then(Value::as_i64)
        .unwrap_or(adults + children);

    let vars: HashMap<String, f64> = [
        ("nights".to_string(), booking.nights() as f64),
        ("guests".to_string(), guests as f64),
        ("adults".to_string(), adults as f64),
        ("children".to_string(), children as f64),
    ]
    .into();

    match rates::evaluate(formula, &vars) {
        Ok(price) => Some(price),
        Err(e) => {
            warn!(unit = unit.id, error = %e, "rate formula failed, booking left unpriced");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn explicit_status_metadata_wins_over_summary() {
        let decoded = metadata::decode("STATUS:request");
        assert_eq!(
            derive_status("Reserved", &decoded),
            Some(BookingStatus::Request)
        );
    }

    #[test]
    fn known_summaries_derive_a_status() {
        let empty = metadata::decode("");
        assert_eq!(
            derive_status("Unavailable", &empty),
            Some(BookingStatus::Unavailable)
        );
        assert_eq!(
            derive_status("Airbnb (Not available)", &empty),
            Some(BookingStatus::Unavailable)
        );
        assert_eq!(
            derive_status("Reserved", &empty),
            Some(BookingStatus::Confirmed)
        );
        assert_eq!(derive_status("Ada Lovelace", &empty), None);
    }

    #[test]
    fn processed_map_carries_dates_fields_and_metadata() {
        let decoded = metadata::decode("STATUS:confirmed/g1\nGUESTS:4/2/2\nEMAIL:a@b.com");
        let status = derive_status("Ada", &decoded);
        let processed =
            build_processed("Ada", date(2025, 6, 15), date(2025, 6, 20), status, &decoded);

        assert_eq!(processed["check_in"], Value::String("2025-06-15".into()));
        assert_eq!(processed["check_out"], Value::String("2025-06-20".into()));
        assert_eq!(processed["status"], Value::String("confirmed".into()));
        assert_eq!(processed["group_id"], Value::String("g1".into()));
        assert_eq!(processed["adults"], Value::from(2));
        assert_eq!(processed["children"], Value::from(2));
        assert_eq!(processed["metadata"]["guests"], Value::from(4));
        assert_eq!(processed["metadata"]["email"], Value::String("a@b.com".into()));
    }

    #[test]
    fn quote_price_uses_the_unit_formula() {
        let unit = Unit {
            id: 1,
            property_id: 1,
            name: "Seaview".to_string(),
            rate_formula: Some("nights * 100 + guests * 10".to_string()),
        };
        let mut booking = Booking::new(1, "u", date(2025, 6, 15), date(2025, 6, 20));
        booking.adults = Some(2);
        booking.children = Some(1);

        assert_eq!(quote_price(&unit, &booking), Some(530.0));
    }

    #[test]
    fn broken_formula_leaves_the_booking_unpriced() {
        let unit = Unit {
            id: 1,
            property_id: 1,
            name: "Seaview".to_string(),
            rate_formula: Some("nights * rate".to_string()),
        };
        let booking = Booking::new(1, "u", date(2025, 6, 15), date(2025, 6, 20));
        assert_eq!(quote_price(&unit, &booking), None);
    }
}
