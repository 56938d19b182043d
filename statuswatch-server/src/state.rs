//! Application state shared across all request handlers.

use statuswatch_core::ingest::Coordinator;
use std::sync::Arc;

/// Application state that is shared across all request handlers.
///
/// This is cloneable and cheap to pass around (everything is behind Arc).
#[derive(Clone)]
pub struct AppState {
    /// Ingestion pipeline entry point.
    pub coordinator: Arc<Coordinator>,
    /// HMAC secret for the webhook signature gate; `None` disables it.
    pub signing_secret: Option<Arc<[u8]>>,
    /// Active dedup backend label, reported by the health endpoint.
    pub dedup_backend: &'static str,
    /// Whether the summary poller task is running.
    pub poller_enabled: bool,
}
