//! Canonical event model.
//!
//! Every provider payload, whatever its shape, is normalized into an
//! [`Event`] before deduplication. The `id` is the dedup key: it must be
//! deterministic for the same logical update so that a push delivery and a
//! poll delivery of that update collapse into a single notification.

use time::OffsetDateTime;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;

/// Display format for notification timestamps.
const TIMESTAMP_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

/// How an event was derived from its payload.
///
/// The kind disambiguates identical raw text across categories: a fallback
/// message and a raw dump with the same characters hash to different ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// An update attached to an incident.
    IncidentUpdate,
    /// A component transitioned to a new status.
    ComponentStatusChange,
    /// A bare `message`/`text` payload with no recognizable structure.
    FallbackMessage,
    /// An unrecognizable payload, carried as a truncated serialization.
    FallbackRaw,
}

/// A normalized status notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Stable dedup id. Derived from provider identifiers or a content hash;
    /// never random.
    pub id: String,
    /// Display name of the affected component or product.
    pub subject: String,
    /// Human-readable status text.
    pub message: String,
    /// Best-effort provider timestamp, or the ingestion time.
    pub timestamp: OffsetDateTime,
    pub kind: EventKind,
}

impl Event {
    /// Format the timestamp for console output.
    pub fn display_timestamp(&self) -> String {
        self.timestamp
            .format(TIMESTAMP_FORMAT)
            .unwrap_or_else(|_| self.timestamp.to_string())
    }
}
