//! Deduplication store.
//!
//! Tracks which event ids have already been processed. Two backends sit
//! behind the same trait:
//!
//! - [`MemoryDedupStore`]: volatile, bounded by a capacity with coarse
//!   oldest-half eviction; reset on restart.
//! - [`PgDedupStore`]: durable across restarts, with a whole-set expiry
//!   horizon instead of per-entry TTLs.
//!
//! Backend selection happens once at startup via [`select_store`]; the
//! coordinator never learns which backend is active. If the durable backend
//! is configured but unreachable, the process logs and degrades to the
//! volatile store for its lifetime rather than crashing.

mod memory;
mod postgres;

pub use memory::MemoryDedupStore;
pub use postgres::PgDedupStore;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Default capacity bound for the volatile store.
pub const DEFAULT_CAPACITY: usize = 10_000;

/// Default expiry horizon for the durable store.
pub const DEFAULT_EXPIRY: Duration = Duration::from_secs(7 * 24 * 3600);

/// Membership set of processed event ids.
///
/// Both operations are safe under concurrent callers (webhook handlers and
/// the poller loop run independently). `mark` is idempotent. The
/// check-then-mark sequence is not atomic across the two calls; a duplicate
/// slipping through that window costs one extra notification, which is
/// acceptable.
#[async_trait]
pub trait DedupStore: Send + Sync {
    async fn has(&self, id: &str) -> bool;
    async fn mark(&self, id: &str);

    /// Backend label for the health endpoint.
    fn name(&self) -> &'static str;
}

/// Select the dedup backend at startup.
///
/// When `database_url` is set, the durable backend is attempted once; on
/// failure the volatile store takes over for the rest of the process
/// lifetime. Store unavailability is never fatal.
pub async fn select_store(
    database_url: Option<&str>,
    capacity: usize,
    expiry: Duration,
) -> Arc<dyn DedupStore> {
    if let Some(url) = database_url {
        match PgDedupStore::connect(url, expiry).await {
            Ok(store) => {
                tracing::info!("Durable dedup store connected");
                return Arc::new(store);
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    "Durable dedup store unreachable, falling back to in-memory dedup for this process"
                );
            }
        }
    }
    Arc::new(MemoryDedupStore::new(capacity))
}
