//! Notification output sink.

use crate::event::Event;

/// Destination for accepted events.
///
/// Fire-and-forget: the coordinator never retries a sink write, and sink
/// failures must not propagate back into the ingestion path.
pub trait NotificationSink: Send + Sync {
    fn emit(&self, event: &Event);
}

/// Prints notifications to stdout and mirrors them as structured log
/// records.
pub struct ConsoleSink;

impl NotificationSink for ConsoleSink {
    fn emit(&self, event: &Event) {
        println!("[{}] Product: {}", event.display_timestamp(), event.subject);
        println!("Status: {}\n", event.message);

        tracing::info!(
            product = %event.subject,
            status = %event.message,
            event_id = %event.id,
            kind = ?event.kind,
            "Status update"
        );
    }
}

/// Collects emitted events for assertions.
#[cfg(test)]
pub(crate) struct RecordingSink {
    events: std::sync::Mutex<Vec<Event>>,
}

#[cfg(test)]
impl RecordingSink {
    pub(crate) fn new() -> std::sync::Arc<Self> {
        std::sync::Arc::new(Self {
            events: std::sync::Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn emitted(&self) -> Vec<Event> {
        self.events
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
impl NotificationSink for RecordingSink {
    fn emit(&self, event: &Event) {
        self.events
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(event.clone());
    }
}
