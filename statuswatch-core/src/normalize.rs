//! Payload normalization.
//!
//! The normalizer is responsible for:
//! - Classifying an arbitrary JSON payload into one of a closed set of shapes
//! - Mapping each shape into canonical [`Event`]s with deterministic ids
//! - Resolving component references through a caller-supplied name table
//!
//! Normalization never fails: every field has a defined fallback, and an
//! unrecognizable payload still yields a single [`EventKind::FallbackRaw`]
//! event. Upstream payload shape is not under our control, so this totality
//! is a hard requirement rather than a convenience.

use crate::event::{Event, EventKind};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Longest raw-payload serialization carried into a fallback event.
const RAW_PREVIEW_LIMIT: usize = 800;

/// Subject used when no component or incident name can be resolved.
pub const UNKNOWN_COMPONENT: &str = "Unknown component";

/// Message used when an incident update carries no body text.
const NO_UPDATE_BODY: &str = "No update body provided";

/// Component id to display-name table, built per ingestion call from
/// whatever component listing is available in that call's context.
#[derive(Debug, Clone, Default)]
pub struct ComponentNames(HashMap<String, String>);

impl ComponentNames {
    pub fn insert(&mut self, id: impl Into<String>, name: impl Into<String>) {
        self.0.insert(id.into(), name.into());
    }

    /// Look up a component id; unresolved ids pass through as-is at the
    /// call sites.
    pub fn resolve(&self, id: &str) -> Option<&str> {
        self.0.get(id).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// The closed set of payload shapes, in dispatch priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PayloadShape {
    Incident,
    IncidentUpdate,
    Component,
    Message,
    Raw,
}

fn classify(payload: &Value) -> PayloadShape {
    if payload.get("incident").is_some_and(Value::is_object) {
        PayloadShape::Incident
    } else if payload.get("incident_update").is_some() {
        PayloadShape::IncidentUpdate
    } else if payload.get("component").is_some_and(Value::is_object) {
        PayloadShape::Component
    } else if message_text(payload).is_some() {
        PayloadShape::Message
    } else {
        PayloadShape::Raw
    }
}

fn message_text(payload: &Value) -> Option<&str> {
    payload
        .get("message")
        .or_else(|| payload.get("text"))
        .and_then(Value::as_str)
}

/// Normalize one raw payload into zero-or-more events.
///
/// `now` is the ingestion time and the timestamp fallback; it is injected by
/// the caller so the function stays deterministic under test. Despite the
/// `Vec` return, every payload yields at least one event.
pub fn normalize(payload: &Value, names: &ComponentNames, now: OffsetDateTime) -> Vec<Event> {
    match classify(payload) {
        PayloadShape::Incident => {
            let incident = &payload["incident"];
            let mut events = incident_update_events(incident, names, now);
            // Some providers send a single top-level `incident_update`
            // instead of the embedded list.
            if events.is_empty() {
                if let Some(update) = payload.get("incident_update") {
                    events.push(event_from_update(incident, update, names, now));
                }
            }
            if events.is_empty() {
                // An incident with no updates at all still notifies once,
                // keyed by the incident itself.
                events.push(event_from_update(incident, &Value::Null, names, now));
            }
            events
        }
        PayloadShape::IncidentUpdate => {
            let update = &payload["incident_update"];
            let synthetic = serde_json::json!({ "name": "Unknown incident" });
            let parent = payload
                .get("incident")
                .filter(|v| v.is_object())
                .unwrap_or(&synthetic);
            vec![event_from_update(parent, update, names, now)]
        }
        PayloadShape::Component => vec![component_event(&payload["component"], now)],
        PayloadShape::Message => {
            // classify() only selects this shape when the text is present.
            let text = message_text(payload).unwrap_or_default();
            vec![Event {
                id: format!("fallback_msg_{}", content_hash(text)),
                subject: "Unknown".to_owned(),
                message: text.to_owned(),
                timestamp: now,
                kind: EventKind::FallbackMessage,
            }]
        }
        PayloadShape::Raw => {
            let preview = truncate_chars(payload.to_string(), RAW_PREVIEW_LIMIT);
            vec![Event {
                id: format!("fallback_raw_{}", content_hash(&preview)),
                subject: "Unknown".to_owned(),
                message: preview,
                timestamp: now,
                kind: EventKind::FallbackRaw,
            }]
        }
    }
}

/// Events for every entry of an incident's `incident_updates` list.
///
/// Also used for incidents taken from a polled summary document, which share
/// the webhook incident shape.
pub fn incident_update_events(
    incident: &Value,
    names: &ComponentNames,
    now: OffsetDateTime,
) -> Vec<Event> {
    incident
        .get("incident_updates")
        .and_then(Value::as_array)
        .map(|updates| {
            updates
                .iter()
                .map(|update| event_from_update(incident, update, names, now))
                .collect()
        })
        .unwrap_or_default()
}

/// Build the event for one incident update.
fn event_from_update(
    incident: &Value,
    update: &Value,
    names: &ComponentNames,
    now: OffsetDateTime,
) -> Event {
    let id = json_str(update, "id").map(str::to_owned).unwrap_or_else(|| {
        format!(
            "{}_{}",
            json_str(incident, "id").unwrap_or("unknown"),
            json_str(update, "created_at").unwrap_or("unknown"),
        )
    });

    let subject = affected_component_name(incident, names)
        .or_else(|| json_str(incident, "name").map(str::to_owned))
        .unwrap_or_else(|| UNKNOWN_COMPONENT.to_owned());

    let message = json_str(update, "body")
        .or_else(|| json_str(update, "content"))
        .unwrap_or(NO_UPDATE_BODY)
        .to_owned();

    let timestamp = json_str(update, "created_at")
        .or_else(|| json_str(update, "updated_at"))
        .and_then(parse_timestamp)
        .unwrap_or(now);

    Event {
        id,
        subject,
        message,
        timestamp,
        kind: EventKind::IncidentUpdate,
    }
}

/// Resolve the first affected component of an incident, if any.
///
/// The `components` list may hold embedded objects (use their `name`) or
/// bare id strings resolved through the name table; unresolved ids pass
/// through unchanged.
fn affected_component_name(incident: &Value, names: &ComponentNames) -> Option<String> {
    let first = incident
        .get("components")
        .and_then(Value::as_array)?
        .first()?;
    match first {
        Value::Object(_) => first.get("name").and_then(Value::as_str).map(str::to_owned),
        Value::String(id) => Some(names.resolve(id).unwrap_or(id).to_owned()),
        _ => None,
    }
}

/// Event for a webhook-delivered component status change.
fn component_event(component: &Value, now: OffsetDateTime) -> Event {
    let key = json_str(component, "id")
        .or_else(|| json_str(component, "name"))
        .unwrap_or("unknown");
    let suffix = json_str(component, "updated_at")
        .or_else(|| json_str(component, "status"))
        .unwrap_or("unknown");
    let status = json_str(component, "status").unwrap_or("unknown");

    Event {
        id: format!("component_{key}_{suffix}"),
        subject: json_str(component, "name")
            .unwrap_or(UNKNOWN_COMPONENT)
            .to_owned(),
        message: format!("Component status changed to: {status}"),
        timestamp: now,
        kind: EventKind::ComponentStatusChange,
    }
}

fn json_str<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str)
}

/// Best-effort RFC 3339 parse; malformed strings fall back to `None` so the
/// event is still emitted with the ingestion time.
fn parse_timestamp(raw: &str) -> Option<OffsetDateTime> {
    OffsetDateTime::parse(raw, &Rfc3339).ok()
}

/// Short deterministic hash for content-derived dedup ids.
fn content_hash(data: &str) -> String {
    let digest = Sha256::digest(data.as_bytes());
    hex::encode(&digest[..8])
}

/// Char-boundary-safe truncation to at most `max_chars` characters.
fn truncate_chars(s: String, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => s[..idx].to_owned(),
        None => s,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;
    use time::macros::datetime;

    fn now() -> OffsetDateTime {
        datetime!(2024-06-01 12:00:00 UTC)
    }

    #[test]
    fn test_incident_update_basic() {
        let payload = json!({
            "incident": {
                "id": "i1",
                "name": "API",
                "incident_updates": [
                    {"id": "u1", "created_at": "2024-01-01T00:00:00Z", "body": "Investigating"}
                ]
            }
        });
        let events = normalize(&payload, &ComponentNames::default(), now());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, "u1");
        assert_eq!(events[0].subject, "API");
        assert_eq!(events[0].message, "Investigating");
        assert_eq!(events[0].kind, EventKind::IncidentUpdate);
        assert_eq!(events[0].timestamp, datetime!(2024-01-01 00:00:00 UTC));
    }

    #[test]
    fn test_incident_update_composite_id() {
        let payload = json!({
            "incident": {
                "id": "i1",
                "name": "API",
                "incident_updates": [
                    {"created_at": "2024-01-01T00:00:00Z", "content": "Resolved"}
                ]
            }
        });
        let events = normalize(&payload, &ComponentNames::default(), now());
        assert_eq!(events[0].id, "i1_2024-01-01T00:00:00Z");
        assert_eq!(events[0].message, "Resolved");
    }

    #[test]
    fn test_incident_updates_keep_source_order() {
        let payload = json!({
            "incident": {
                "id": "i1",
                "name": "API",
                "incident_updates": [
                    {"id": "u1", "body": "first"},
                    {"id": "u2", "body": "second"}
                ]
            }
        });
        let events = normalize(&payload, &ComponentNames::default(), now());
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].id, "u1");
        assert_eq!(events[1].id, "u2");
    }

    #[test]
    fn test_incident_with_top_level_update_fallback() {
        let payload = json!({
            "incident": {"id": "i2", "name": "Dashboard", "incident_updates": []},
            "incident_update": {"id": "u9", "body": "Monitoring"}
        });
        let events = normalize(&payload, &ComponentNames::default(), now());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, "u9");
        assert_eq!(events[0].subject, "Dashboard");
    }

    #[test]
    fn test_top_level_incident_update_without_incident() {
        let payload = json!({
            "incident_update": {"id": "u3", "body": "Partial outage"}
        });
        let events = normalize(&payload, &ComponentNames::default(), now());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, "u3");
        assert_eq!(events[0].subject, "Unknown incident");
    }

    #[test]
    fn test_component_embedded_object_preferred_over_incident_name() {
        let payload = json!({
            "incident": {
                "id": "i1",
                "name": "Incident name",
                "components": [{"id": "c1", "name": "Embedded name"}],
                "incident_updates": [{"id": "u1", "body": "b"}]
            }
        });
        let events = normalize(&payload, &ComponentNames::default(), now());
        assert_eq!(events[0].subject, "Embedded name");
    }

    #[test]
    fn test_component_id_resolved_through_table() {
        let mut names = ComponentNames::default();
        names.insert("c1", "GPT-4 API");
        let payload = json!({
            "incident": {
                "id": "i1",
                "components": ["c1"],
                "incident_updates": [{"id": "u1", "body": "b"}]
            }
        });
        let events = normalize(&payload, &names, now());
        assert_eq!(events[0].subject, "GPT-4 API");
    }

    #[test]
    fn test_unresolved_component_id_passes_through() {
        let payload = json!({
            "incident": {
                "id": "i1",
                "components": ["c-unknown"],
                "incident_updates": [{"id": "u1", "body": "b"}]
            }
        });
        let events = normalize(&payload, &ComponentNames::default(), now());
        assert_eq!(events[0].subject, "c-unknown");
    }

    #[test]
    fn test_component_status_change() {
        let payload = json!({
            "component": {
                "id": "c1",
                "name": "GPT-4 API",
                "status": "degraded_performance",
                "updated_at": "t1"
            }
        });
        let events = normalize(&payload, &ComponentNames::default(), now());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, "component_c1_t1");
        assert_eq!(events[0].subject, "GPT-4 API");
        assert_eq!(
            events[0].message,
            "Component status changed to: degraded_performance"
        );
        assert_eq!(events[0].kind, EventKind::ComponentStatusChange);
    }

    #[test]
    fn test_component_without_updated_at_keys_on_status() {
        let payload = json!({
            "component": {"name": "Search", "status": "major_outage"}
        });
        let events = normalize(&payload, &ComponentNames::default(), now());
        assert_eq!(events[0].id, "component_Search_major_outage");
    }

    #[test]
    fn test_fallback_message() {
        let payload = json!({"message": "Maintenance at 14:00 UTC"});
        let events = normalize(&payload, &ComponentNames::default(), now());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].subject, "Unknown");
        assert_eq!(events[0].message, "Maintenance at 14:00 UTC");
        assert_eq!(events[0].kind, EventKind::FallbackMessage);
        assert!(events[0].id.starts_with("fallback_msg_"));
    }

    #[test]
    fn test_fallback_raw_is_bounded() {
        let payload = json!({"junk": "x".repeat(5000)});
        let events = normalize(&payload, &ComponentNames::default(), now());
        assert_eq!(events[0].kind, EventKind::FallbackRaw);
        assert!(events[0].message.chars().count() <= RAW_PREVIEW_LIMIT);
        assert!(events[0].id.starts_with("fallback_raw_"));
    }

    #[test]
    fn test_identical_text_across_kinds_gets_distinct_ids() {
        let as_message = normalize(
            &json!({"message": "hello"}),
            &ComponentNames::default(),
            now(),
        );
        let as_raw = normalize(&json!("hello"), &ComponentNames::default(), now());
        assert_ne!(as_message[0].id, as_raw[0].id);
    }

    #[test]
    fn test_determinism() {
        let payload = json!({
            "incident": {
                "id": "i1",
                "name": "API",
                "incident_updates": [{"id": "u1", "body": "Investigating"}]
            }
        });
        let first = normalize(&payload, &ComponentNames::default(), now());
        let second = normalize(&payload, &ComponentNames::default(), now());
        assert_eq!(first, second);
    }

    #[test]
    fn test_fallback_totality() {
        // None of these may panic, and each yields at least one event.
        let payloads = [
            json!({}),
            json!(null),
            json!([1, 2, 3]),
            json!(42),
            json!({"incident": "not an object"}),
            json!({"incident": {"incident_updates": "not a list"}}),
            json!({"incident": {"incident_updates": [null, 7]}}),
            json!({"component": {"status": null}}),
            json!({"message": 12}),
        ];
        for payload in &payloads {
            let events = normalize(payload, &ComponentNames::default(), now());
            assert!(!events.is_empty(), "no events for {payload}");
        }
    }

    #[test]
    fn test_malformed_timestamp_falls_back_to_ingestion_time() {
        let payload = json!({
            "incident": {
                "id": "i1",
                "incident_updates": [{"id": "u1", "created_at": "yesterday-ish", "body": "b"}]
            }
        });
        let events = normalize(&payload, &ComponentNames::default(), now());
        assert_eq!(events[0].timestamp, now());
    }

    #[test]
    fn test_truncate_chars_respects_multibyte_boundaries() {
        let s = "é".repeat(10);
        let out = truncate_chars(s, 4);
        assert_eq!(out.chars().count(), 4);
    }
}
