//! Tolerant iCal feed parsing.
//!
//! Feed quality varies wildly between OTAs, so this module deliberately
//! skips RFC 5545 validation: no VERSION/PRODID checks, malformed lines
//! are dropped, incomplete events are discarded silently.

mod parse;

pub use parse::{RawEvent, parse_feed, parse_ical_date, unescape_text};
