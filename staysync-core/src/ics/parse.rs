//! Line-oriented iCal feed parser.

use std::collections::BTreeMap;

use chrono::NaiveDate;

/// One VEVENT as an ordered property-name → raw-value mapping.
///
/// Duplicate property names overwrite in place, keeping the position of
/// the first occurrence.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawEvent {
    props: Vec<(String, String)>,
}

impl RawEvent {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.props
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn set(&mut self, name: &str, value: &str) {
        match self.props.iter_mut().find(|(k, _)| k == name) {
            Some((_, v)) => *v = value.to_string(),
            None => self.props.push((name.to_string(), value.to_string())),
        }
    }

    /// Append folded-line content to an existing property's value.
    fn append(&mut self, name: &str, text: &str) {
        if let Some((_, v)) = self.props.iter_mut().find(|(k, _)| k == name) {
            v.push_str(text);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.props.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.props.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Snapshot for the booking ledger.
    pub fn to_map(&self) -> BTreeMap<String, String> {
        self.props.iter().cloned().collect()
    }
}

/// Parse raw calendar text into a sequence of events.
///
/// Tolerant by design: lines without a colon are dropped, properties
/// outside BEGIN:VEVENT/END:VEVENT are dropped, and an event still open
/// at end of input is discarded silently.
pub fn parse_feed(text: &str) -> Vec<RawEvent> {
    let mut events = Vec::new();
    let mut current: Option<RawEvent> = None;
    let mut last_field: Option<String> = None;

    for raw_line in text.split('\n') {
        let line = raw_line.strip_suffix('\r').unwrap_or(raw_line);

        // Folded continuation: append to the field the previous line set.
        if line.starts_with(' ') || line.starts_with('\t') {
            if let (Some(event), Some(field)) = (current.as_mut(), last_field.as_deref()) {
                event.append(field, line.trim_start());
            }
            continue;
        }

        let Some((name, value)) = line.split_once(':') else {
            continue;
        };

        match (name, value) {
            ("BEGIN", "VEVENT") => {
                current = Some(RawEvent::default());
                last_field = None;
            }
            ("END", "VEVENT") => {
                if let Some(event) = current.take() {
                    events.push(event);
                }
                last_field = None;
            }
            _ => {
                if let Some(event) = current.as_mut() {
                    // Strip ;param=value suffixes, e.g. DTSTART;VALUE=DATE.
                    let field = name.split(';').next().unwrap_or(name);
                    event.set(field, value);
                    last_field = Some(field.to_string());
                }
            }
        }
    }

    events
}

/// Decode iCal TEXT escapes: `\n`/`\N` become newlines, `\,` `\;` `\\`
/// become their literal character.
pub fn unescape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') | Some('N') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// Parse the date part of a DTSTART/DTEND value.
///
/// Accepts both `20250615` and `20250615T140000Z` shapes by reading the
/// leading eight digits.
pub fn parse_ical_date(value: &str) -> Option<NaiveDate> {
    let head = value.trim().get(..8)?;
    NaiveDate::parse_from_str(head, "%Y%m%d").ok()
}
