//! Conditional summary poller.
//!
//! The SummaryPoller is responsible for:
//! - Periodically fetching the upstream summary document
//! - Attaching `If-None-Match` / `If-Modified-Since` validators so an
//!   unchanged document costs a 304 instead of a re-parse
//! - Handing changed documents to the [`Coordinator`]
//! - Backing off exponentially on transport and parse failures
//!
//! The network step and the protocol decisions are split: `fetch` produces
//! a [`FetchOutcome`] and `apply` consumes it, so the state machine is
//! unit-testable without sockets.

use crate::ingest::Coordinator;
use crate::summary::SummaryDocument;
use reqwest::StatusCode;
use reqwest::header::{ETAG, HeaderName, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use url::Url;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(60);
pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_secs(1);
pub const DEFAULT_BACKOFF_CAP: Duration = Duration::from_secs(300);

const HTTP_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Clone)]
pub struct PollerConfig {
    pub summary_url: Url,
    /// Steady-state sleep between polls.
    pub interval: Duration,
    /// Fixed sleep after a protocol-level anomaly (unexpected status code).
    pub cooldown: Duration,
    pub backoff_base: Duration,
    pub backoff_cap: Duration,
}

impl PollerConfig {
    pub fn new(summary_url: Url) -> Self {
        Self {
            summary_url,
            interval: DEFAULT_POLL_INTERVAL,
            cooldown: DEFAULT_COOLDOWN,
            backoff_base: DEFAULT_BACKOFF_BASE,
            backoff_cap: DEFAULT_BACKOFF_CAP,
        }
    }
}

/// Exponential backoff for consecutive transport failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backoff {
    base: Duration,
    cap: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(base: Duration, cap: Duration) -> Self {
        Self {
            base,
            cap,
            current: base,
        }
    }

    /// Delay to sleep for this failure; the next failure's delay doubles,
    /// saturating at the cap.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current.min(self.cap);
        self.current = (self.current * 2).min(self.cap);
        delay
    }

    /// A success returns the ladder to its baseline.
    pub fn reset(&mut self) {
        self.current = self.base;
    }
}

/// Cache validators and backoff, owned exclusively by the poller task.
#[derive(Debug)]
pub struct PollState {
    etag: Option<String>,
    last_modified: Option<String>,
    backoff: Backoff,
}

impl PollState {
    fn new(config: &PollerConfig) -> Self {
        Self {
            etag: None,
            last_modified: None,
            backoff: Backoff::new(config.backoff_base, config.backoff_cap),
        }
    }
}

/// One poll iteration's observed result.
#[derive(Debug)]
enum FetchOutcome {
    /// 304: validators matched, nothing to parse.
    NotModified,
    /// 200 with (possibly absent) fresh validators and the body text.
    Modified {
        etag: Option<String>,
        last_modified: Option<String>,
        body: String,
    },
    /// Any other status code; protocol anomaly, not a connectivity failure.
    Anomaly { status: StatusCode },
    /// Transport-level failure.
    Failed { error: String },
}

/// Long-lived polling task feeding the coordinator.
pub struct SummaryPoller {
    config: PollerConfig,
    coordinator: Arc<Coordinator>,
    http: reqwest::Client,
    shutdown_rx: watch::Receiver<bool>,
}

impl SummaryPoller {
    pub fn new(
        config: PollerConfig,
        coordinator: Arc<Coordinator>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            config,
            coordinator,
            http: reqwest::Client::builder()
                .timeout(HTTP_TIMEOUT)
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            shutdown_rx,
        }
    }

    /// Run until the shutdown channel flips. The current iteration is
    /// completed or abandoned with no cleanup; an abandoned fetch costs
    /// nothing thanks to the idempotent ingestion path.
    pub async fn run(mut self) {
        info!(
            url = %self.config.summary_url,
            interval = ?self.config.interval,
            "SummaryPoller started"
        );

        let mut state = PollState::new(&self.config);

        loop {
            let outcome = self.fetch(&state).await;
            let sleep = self.apply(outcome, &mut state).await;

            tokio::select! {
                biased;

                _ = self.shutdown_rx.changed() => {
                    if *self.shutdown_rx.borrow() {
                        info!("SummaryPoller received shutdown signal");
                        break;
                    }
                }

                _ = tokio::time::sleep(sleep) => {}
            }
        }

        info!("SummaryPoller shutdown complete");
    }

    /// Issue the conditional GET.
    async fn fetch(&self, state: &PollState) -> FetchOutcome {
        let mut request = self.http.get(self.config.summary_url.clone());
        if let Some(etag) = &state.etag {
            request = request.header(IF_NONE_MATCH, etag.as_str());
        }
        if let Some(last_modified) = &state.last_modified {
            request = request.header(IF_MODIFIED_SINCE, last_modified.as_str());
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                return FetchOutcome::Failed {
                    error: e.to_string(),
                };
            }
        };

        match response.status() {
            StatusCode::NOT_MODIFIED => FetchOutcome::NotModified,
            StatusCode::OK => {
                let etag = header_value(&response, ETAG);
                let last_modified = header_value(&response, LAST_MODIFIED);
                match response.text().await {
                    Ok(body) => FetchOutcome::Modified {
                        etag,
                        last_modified,
                        body,
                    },
                    Err(e) => FetchOutcome::Failed {
                        error: e.to_string(),
                    },
                }
            }
            status => FetchOutcome::Anomaly { status },
        }
    }

    /// Update poll state for one outcome and decide the next sleep.
    async fn apply(&self, outcome: FetchOutcome, state: &mut PollState) -> Duration {
        match outcome {
            FetchOutcome::NotModified => {
                debug!("Summary not modified");
                self.config.interval
            }
            FetchOutcome::Modified {
                etag,
                last_modified,
                body,
            } => {
                state.backoff.reset();
                // Only overwrite validators the response actually carried.
                if etag.is_some() {
                    state.etag = etag;
                }
                if last_modified.is_some() {
                    state.last_modified = last_modified;
                }

                match serde_json::from_str::<SummaryDocument>(&body) {
                    Ok(document) => {
                        let accepted = self.coordinator.ingest_summary(&document).await;
                        if accepted > 0 {
                            info!(accepted, "Summary poll produced new events");
                        }
                        self.config.interval
                    }
                    Err(e) => {
                        let delay = state.backoff.next_delay();
                        warn!(error = %e, backoff = ?delay, "Summary body parse failed");
                        delay
                    }
                }
            }
            FetchOutcome::Anomaly { status } => {
                warn!(%status, "Unexpected summary response status");
                self.config.cooldown
            }
            FetchOutcome::Failed { error } => {
                let delay = state.backoff.next_delay();
                error!(error = %error, backoff = ?delay, "Summary poll failed");
                delay
            }
        }
    }
}

fn header_value(response: &reqwest::Response, name: HeaderName) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
}
