//! Webhook ingestion endpoint.
//!
//! Receives status-change payloads pushed by the provider. The signature
//! gate runs before anything touches the body content; after that the body
//! is parsed leniently, since providers disagree on payload shape and some
//! send non-JSON bodies.

use crate::state::AppState;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::Value;
use statuswatch_core::normalize::ComponentNames;
use statuswatch_core::signature::verify_signature;
use tracing::{debug, warn};

/// Header carrying the provider's HMAC signature.
pub const SIGNATURE_HEADER: &str = "X-Signature";

pub async fn receive_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let header_sig = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    if !verify_signature(&body, header_sig, state.signing_secret.as_deref()) {
        warn!("Webhook rejected: signature verification failed");
        return (StatusCode::UNAUTHORIZED, "invalid signature").into_response();
    }

    let payload = parse_payload(&body);
    let accepted = state
        .coordinator
        .ingest(&payload, &ComponentNames::default())
        .await;
    debug!(accepted, "Webhook processed");

    StatusCode::NO_CONTENT.into_response()
}

/// Decode the body as JSON, tolerating non-UTF-8 and non-JSON bodies.
///
/// An undecodable body becomes `{"raw": "<text>"}` so it still flows through
/// normalization as a raw fallback instead of being dropped.
fn parse_payload(body: &[u8]) -> Value {
    if let Ok(value) = serde_json::from_slice(body) {
        return value;
    }
    let raw = String::from_utf8_lossy(body);
    serde_json::from_str(&raw).unwrap_or_else(|_| serde_json::json!({ "raw": raw }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_payload_valid_json() {
        let value = parse_payload(br#"{"message": "hi"}"#);
        assert_eq!(value["message"], "hi");
    }

    #[test]
    fn test_parse_payload_non_json_becomes_raw() {
        let value = parse_payload(b"status=down&component=api");
        assert_eq!(value["raw"], "status=down&component=api");
    }

    #[test]
    fn test_parse_payload_invalid_utf8_is_tolerated() {
        let value = parse_payload(&[0xff, 0xfe, b'h', b'i']);
        assert!(value.get("raw").is_some());
    }
}
