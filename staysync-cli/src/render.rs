//! Terminal rendering for staysync types.
//!
//! Extension traits that add colored output to core types using
//! owo_colors, keeping the core crate free of presentation concerns.

use owo_colors::OwoColorize;
use staysync_core::booking::{Booking, BookingStatus};
use staysync_core::source::Source;
use staysync_core::sync::SyncOutcome;

/// Extension trait for colored terminal rendering.
pub trait Render {
    fn render(&self) -> String;
}

impl Render for SyncOutcome {
    fn render(&self) -> String {
        if let Some(error) = &self.error {
            return format!("source #{}: {}", self.source_id, error.red());
        }

        let mut parts = Vec::new();
        if self.created > 0 {
            parts.push(format!("{} created", self.created).green().to_string());
        }
        if self.updated > 0 {
            parts.push(format!("{} updated", self.updated).yellow().to_string());
        }
        if self.deleted > 0 {
            parts.push(format!("{} deleted", self.deleted).red().to_string());
        }
        if self.vanished > 0 {
            parts.push(format!("{} vanished", self.vanished).red().to_string());
        }
        if self.conflicts > 0 {
            parts.push(format!("{} conflicts", self.conflicts).yellow().to_string());
        }
        if parts.is_empty() {
            parts.push("up to date".dimmed().to_string());
        }

        format!(
            "source #{}: {} events, {}",
            self.source_id,
            self.total,
            parts.join(", ")
        )
    }
}

impl Render for Source {
    fn render(&self) -> String {
        let state = if !self.enabled {
            "disabled".dimmed().to_string()
        } else if let Some(error) = &self.last_error {
            error.red().to_string()
        } else if let Some(at) = self.last_synced_at {
            format!("synced {}", at.format("%Y-%m-%d %H:%M UTC")).green().to_string()
        } else {
            "never synced".dimmed().to_string()
        };

        format!("#{} unit {} {} - {}", self.id, self.unit_id, self.url, state)
    }
}

impl Render for BookingStatus {
    fn render(&self) -> String {
        let label = self.as_str();
        match self {
            BookingStatus::Confirmed => label.green().to_string(),
            BookingStatus::New | BookingStatus::Request | BookingStatus::Inquiry => {
                label.yellow().to_string()
            }
            BookingStatus::Cancelled
            | BookingStatus::CancelledByOwner
            | BookingStatus::CancelledByGuest
            | BookingStatus::Vanished
            | BookingStatus::Deleted => label.red().to_string(),
            _ => label.dimmed().to_string(),
        }
    }
}

impl Render for Booking {
    fn render(&self) -> String {
        let guest = self.guest_name.as_deref().unwrap_or("(no name)");
        format!(
            "{} → {}  {} [{}] unit {}",
            self.check_in,
            self.check_out,
            guest,
            self.status.render(),
            self.unit_id
        )
    }
}
