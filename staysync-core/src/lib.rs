//! Booking synchronization engine for vacation-rental iCal feeds.
//!
//! This crate pulls external calendar feeds, decodes the semi-structured
//! metadata OTAs pack into event descriptions, and reconciles the result
//! against a local booking store:
//! - `ics` tokenizes raw feed text into events
//! - `metadata` extracts structured fields from DESCRIPTION lines
//! - `checksum` fingerprints processed events to skip unchanged ones
//! - `merge` three-way-merges remote updates against local edits
//! - `sync` orchestrates the whole run, including vanished detection
//! - `mapping` keeps stable event identity across UID reuse

pub mod booking;
pub mod checksum;
pub mod config;
pub mod error;
pub mod fetch;
pub mod ics;
pub mod mapping;
pub mod merge;
pub mod metadata;
pub mod rates;
pub mod source;
pub mod store;
pub mod sync;
pub mod unit;

pub use booking::{Booking, BookingStatus, LedgerEntry};
pub use config::Config;
pub use error::{SyncError, SyncResult};
pub use source::Source;
pub use store::{SourceFilter, Store};
pub use sync::{SyncOutcome, Syncer};
pub use unit::Unit;
