//! Durable Postgres dedup backend.
//!
//! Persists the seen-id set across restarts. Retention is a whole-set
//! expiry horizon rather than a per-entry TTL: a single horizon row is
//! armed when the set first gains an entry, and once it lapses the entire
//! set is cleared and the horizon re-armed. Operators trade per-process
//! precision (volatile store) for cross-restart correctness with this
//! coarser retention.

use super::DedupStore;
use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::time::Duration;
use time::OffsetDateTime;
use tracing::{error, info, warn};

const CREATE_SEEN: &str = "CREATE TABLE IF NOT EXISTS seen_events (\
    event_id TEXT PRIMARY KEY, \
    first_seen TIMESTAMPTZ NOT NULL DEFAULT now())";

const CREATE_EXPIRY: &str = "CREATE TABLE IF NOT EXISTS seen_events_expiry (\
    singleton BOOLEAN PRIMARY KEY DEFAULT TRUE CHECK (singleton), \
    expires_at TIMESTAMPTZ NOT NULL)";

pub struct PgDedupStore {
    pool: PgPool,
    expiry: Duration,
}

impl PgDedupStore {
    /// Connect and prepare the schema.
    ///
    /// Any failure here is the caller's signal to fall back to the volatile
    /// store for the process lifetime.
    pub async fn connect(database_url: &str, expiry: Duration) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await?;
        sqlx::query(CREATE_SEEN).execute(&pool).await?;
        sqlx::query(CREATE_EXPIRY).execute(&pool).await?;
        Ok(Self { pool, expiry })
    }

    /// Arm the horizon on first use; clear the whole set once it lapses.
    async fn expire_if_due(&self) -> Result<(), sqlx::Error> {
        let expires_at: Option<OffsetDateTime> =
            sqlx::query_scalar("SELECT expires_at FROM seen_events_expiry")
                .fetch_optional(&self.pool)
                .await?;
        match expires_at {
            Some(at) if at <= OffsetDateTime::now_utc() => {
                sqlx::query("DELETE FROM seen_events")
                    .execute(&self.pool)
                    .await?;
                sqlx::query("UPDATE seen_events_expiry SET expires_at = $1")
                    .bind(OffsetDateTime::now_utc() + self.expiry)
                    .execute(&self.pool)
                    .await?;
                info!("Dedup expiry horizon lapsed, cleared the seen set");
            }
            Some(_) => {}
            None => {
                sqlx::query(
                    "INSERT INTO seen_events_expiry (expires_at) VALUES ($1) \
                     ON CONFLICT (singleton) DO NOTHING",
                )
                .bind(OffsetDateTime::now_utc() + self.expiry)
                .execute(&self.pool)
                .await?;
            }
        }
        Ok(())
    }

    async fn has_inner(&self, id: &str) -> Result<bool, sqlx::Error> {
        self.expire_if_due().await?;
        let found: Option<i32> =
            sqlx::query_scalar("SELECT 1 FROM seen_events WHERE event_id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(found.is_some())
    }

    async fn mark_inner(&self, id: &str) -> Result<(), sqlx::Error> {
        self.expire_if_due().await?;
        sqlx::query(
            "INSERT INTO seen_events (event_id) VALUES ($1) ON CONFLICT (event_id) DO NOTHING",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl DedupStore for PgDedupStore {
    async fn has(&self, id: &str) -> bool {
        match self.has_inner(id).await {
            Ok(seen) => seen,
            Err(e) => {
                // Treating the id as unseen risks one duplicate
                // notification; dropping it would lose an update.
                warn!(error = %e, event_id = %id, "Dedup lookup failed, treating id as unseen");
                false
            }
        }
    }

    async fn mark(&self, id: &str) {
        if let Err(e) = self.mark_inner(id).await {
            error!(error = %e, event_id = %id, "Failed to persist dedup id");
        }
    }

    fn name(&self) -> &'static str {
        "postgres"
    }
}
