//! TOML file configuration structures.
//!
//! These structs directly map to the `statuswatch-config.toml` file format.
//! Every field has a serde default so a partial (or absent) file still
//! yields a runnable configuration.

use serde::Deserialize;
use std::net::SocketAddr;

/// Root configuration structure as read from the TOML file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub webhook: WebhookSection,
    #[serde(default)]
    pub poller: PollerSection,
    #[serde(default)]
    pub dedup: DedupSection,
}

/// Server configuration section.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSection {
    /// The address and port to listen on (e.g., "0.0.0.0:8080").
    #[serde(default = "default_listen_addr")]
    pub listen: SocketAddr,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            listen: default_listen_addr(),
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

/// Webhook configuration section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookSection {
    /// HMAC-SHA256 secret for verifying webhook payloads. Unset disables
    /// signature verification.
    #[serde(default)]
    pub signing_secret: Option<String>,
}

/// Poller configuration section.
#[derive(Debug, Clone, Deserialize)]
pub struct PollerSection {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_summary_url")]
    pub summary_url: String,
    /// Steady-state seconds between polls.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Seconds to wait after an unexpected response status.
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
    /// Ceiling in seconds for the failure backoff ladder.
    #[serde(default = "default_backoff_cap_secs")]
    pub backoff_cap_secs: u64,
}

impl Default for PollerSection {
    fn default() -> Self {
        Self {
            enabled: false,
            summary_url: default_summary_url(),
            poll_interval_secs: default_poll_interval_secs(),
            cooldown_secs: default_cooldown_secs(),
            backoff_cap_secs: default_backoff_cap_secs(),
        }
    }
}

fn default_summary_url() -> String {
    "https://status.openai.com/api/v2/summary.json".to_owned()
}

fn default_poll_interval_secs() -> u64 {
    30
}

fn default_cooldown_secs() -> u64 {
    60
}

fn default_backoff_cap_secs() -> u64 {
    300
}

/// Dedup store configuration section.
#[derive(Debug, Clone, Deserialize)]
pub struct DedupSection {
    /// Capacity bound for the in-memory store.
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    /// Whole-set expiry horizon for the durable store, in days.
    #[serde(default = "default_expiry_days")]
    pub expiry_days: u64,
}

impl Default for DedupSection {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            expiry_days: default_expiry_days(),
        }
    }
}

fn default_capacity() -> usize {
    10_000
}

fn default_expiry_days() -> u64 {
    7
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_full_config_parsing() {
        let toml_str = r#"
[server]
listen = "127.0.0.1:3000"

[webhook]
signing_secret = "hunter2"

[poller]
enabled = true
summary_url = "https://status.example.com/api/v2/summary.json"
poll_interval_secs = 15

[dedup]
capacity = 500
expiry_days = 3
"#;
        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.listen.port(), 3000);
        assert_eq!(config.webhook.signing_secret.as_deref(), Some("hunter2"));
        assert!(config.poller.enabled);
        assert_eq!(config.poller.poll_interval_secs, 15);
        // Unspecified fields keep their defaults.
        assert_eq!(config.poller.cooldown_secs, 60);
        assert_eq!(config.poller.backoff_cap_secs, 300);
        assert_eq!(config.dedup.capacity, 500);
        assert_eq!(config.dedup.expiry_days, 3);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: FileConfig = toml::from_str("").unwrap();
        assert_eq!(config.server.listen.port(), 8080);
        assert!(config.webhook.signing_secret.is_none());
        assert!(!config.poller.enabled);
        assert_eq!(config.poller.poll_interval_secs, 30);
        assert_eq!(config.dedup.capacity, 10_000);
        assert_eq!(config.dedup.expiry_days, 7);
    }
}
