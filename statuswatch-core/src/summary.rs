//! Upstream summary document shape.
//!
//! The poller consumes a Statuspage-style `summary.json`: a `components`
//! list (id, name, status) and an `incidents` list. Incidents keep the raw
//! JSON shape so they flow through the same normalization path as webhook
//! deliveries; components are typed because the non-operational scan needs
//! their fields directly.

use crate::event::{Event, EventKind};
use crate::normalize::{ComponentNames, UNKNOWN_COMPONENT};
use serde::Deserialize;
use serde_json::Value;
use time::OffsetDateTime;

/// The nominal component status; anything else fires a notification.
pub const OPERATIONAL_STATUS: &str = "operational";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SummaryDocument {
    #[serde(default)]
    pub components: Vec<SummaryComponent>,
    #[serde(default)]
    pub incidents: Vec<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SummaryComponent {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl SummaryDocument {
    /// Component id to name table for resolving bare component references
    /// inside this document's incidents.
    pub fn component_names(&self) -> ComponentNames {
        let mut names = ComponentNames::default();
        for component in &self.components {
            if let (Some(id), Some(name)) = (&component.id, &component.name) {
                names.insert(id, name);
            }
        }
        names
    }
}

/// Synthetic events for components currently in a non-operational status.
///
/// The dedup id encodes the status value itself, so each distinct
/// (component, status) pair fires exactly once: a later change to a
/// *different* non-operational status is a new id, while reverting to
/// operational fires nothing.
pub fn component_status_events(
    components: &[SummaryComponent],
    now: OffsetDateTime,
) -> Vec<Event> {
    components
        .iter()
        .filter_map(|component| {
            let status = component.status.as_deref()?;
            if status == OPERATIONAL_STATUS {
                return None;
            }
            let key = component
                .id
                .as_deref()
                .or(component.name.as_deref())
                .unwrap_or("unknown");
            Some(Event {
                id: format!("component_{key}_{status}"),
                subject: component
                    .name
                    .clone()
                    .unwrap_or_else(|| UNKNOWN_COMPONENT.to_owned()),
                message: format!("Component status: {status}"),
                timestamp: now,
                kind: EventKind::ComponentStatusChange,
            })
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn now() -> OffsetDateTime {
        datetime!(2024-06-01 12:00:00 UTC)
    }

    #[test]
    fn test_parse_summary_with_missing_sections() {
        let doc: SummaryDocument = serde_json::from_str("{}").unwrap();
        assert!(doc.components.is_empty());
        assert!(doc.incidents.is_empty());
    }

    #[test]
    fn test_component_names_skips_partial_entries() {
        let doc: SummaryDocument = serde_json::from_str(
            r#"{
                "components": [
                    {"id": "c1", "name": "API", "status": "operational"},
                    {"id": "c2", "status": "operational"},
                    {"name": "Orphan", "status": "operational"}
                ]
            }"#,
        )
        .unwrap();
        let names = doc.component_names();
        assert_eq!(names.resolve("c1"), Some("API"));
        assert_eq!(names.resolve("c2"), None);
    }

    #[test]
    fn test_operational_components_emit_nothing() {
        let doc: SummaryDocument = serde_json::from_str(
            r#"{"components": [{"id": "c1", "name": "API", "status": "operational"}]}"#,
        )
        .unwrap();
        assert!(component_status_events(&doc.components, now()).is_empty());
    }

    #[test]
    fn test_non_operational_component_event() {
        let doc: SummaryDocument = serde_json::from_str(
            r#"{"components": [{"id": "c1", "name": "API", "status": "degraded_performance"}]}"#,
        )
        .unwrap();
        let events = component_status_events(&doc.components, now());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, "component_c1_degraded_performance");
        assert_eq!(events[0].subject, "API");
        assert_eq!(events[0].message, "Component status: degraded_performance");
    }

    #[test]
    fn test_component_without_status_is_skipped() {
        let components = vec![SummaryComponent {
            id: Some("c1".to_owned()),
            name: Some("API".to_owned()),
            status: None,
        }];
        assert!(component_status_events(&components, now()).is_empty());
    }
}
