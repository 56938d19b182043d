//! Ingestion coordinator.
//!
//! The coordinator is responsible for:
//! - Driving normalization of raw payloads and polled summary documents
//! - Consulting and updating the dedup store per candidate event
//! - Forwarding each newly accepted event to the output sink exactly once
//!
//! Webhook deliveries and the poller both feed this path, so an update seen
//! on one channel suppresses the same update arriving on the other.

use crate::dedup::DedupStore;
use crate::event::Event;
use crate::normalize::{ComponentNames, incident_update_events, normalize};
use crate::sink::NotificationSink;
use crate::summary::{SummaryDocument, component_status_events};
use serde_json::Value;
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::debug;

pub struct Coordinator {
    store: Arc<dyn DedupStore>,
    sink: Arc<dyn NotificationSink>,
}

impl Coordinator {
    pub fn new(store: Arc<dyn DedupStore>, sink: Arc<dyn NotificationSink>) -> Self {
        Self { store, sink }
    }

    /// Ingest one raw payload, returning the count of newly accepted events.
    ///
    /// Events within the payload are processed in normalizer order; nothing
    /// is reordered across payloads. Duplicates are skipped silently.
    pub async fn ingest(&self, payload: &Value, names: &ComponentNames) -> usize {
        let now = OffsetDateTime::now_utc();
        self.accept(normalize(payload, names, now)).await
    }

    /// Ingest a polled summary document: every incident's updates through
    /// the regular dedup path, then the non-operational component scan.
    pub async fn ingest_summary(&self, document: &SummaryDocument) -> usize {
        let now = OffsetDateTime::now_utc();
        let names = document.component_names();

        let mut events = Vec::new();
        for incident in &document.incidents {
            events.extend(incident_update_events(incident, &names, now));
        }
        events.extend(component_status_events(&document.components, now));

        self.accept(events).await
    }

    async fn accept(&self, events: Vec<Event>) -> usize {
        let mut accepted = 0;
        for event in events {
            if self.store.has(&event.id).await {
                debug!(event_id = %event.id, "Duplicate event skipped");
                continue;
            }
            self.store.mark(&event.id).await;
            self.sink.emit(&event);
            accepted += 1;
        }
        accepted
    }
}
