//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address, limits).
    pub listener: ListenerConfig,

    /// Static upstream pool, in rotation order.
    pub upstreams: Vec<UpstreamConfig>,

    /// Selection strategy.
    pub balancer: BalancerConfig,

    /// Passive and active health settings.
    pub health: HealthConfig,

    /// Retry bound.
    pub retries: RetryConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl ProxyConfig {
    /// Number of attempts a single request may make before giving up.
    ///
    /// Defaults to the pool size so every upstream is tried at most once.
    pub fn max_attempts(&self) -> usize {
        let pool = self.upstreams.len().max(1);
        match self.retries.max_retries {
            Some(retries) => retries.saturating_add(1).min(pool),
            None => pool,
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,

    /// Largest request body accepted for forwarding.
    pub max_body_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_connections: 10_000,
            max_body_bytes: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// A single upstream server.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct UpstreamConfig {
    /// Upstream `host:port` (e.g., "127.0.0.1:8000" or "inventory:8000").
    pub address: String,
}

impl UpstreamConfig {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }
}

/// Load balancing strategy.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    #[default]
    RoundRobin,
    LeastConnections,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct BalancerConfig {
    pub strategy: Strategy,
}

/// Health configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Consecutive failures before an upstream is marked dead.
    pub failure_threshold: u32,

    /// Seconds a dead upstream sits out before it is tried again.
    pub cooldown_secs: u64,

    /// Optional periodic probing.
    pub active: ActiveHealthConfig,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            cooldown_secs: 10,
            active: ActiveHealthConfig::default(),
        }
    }
}

impl HealthConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }
}

/// Active health check configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ActiveHealthConfig {
    /// Enable active health checks.
    pub enabled: bool,

    /// Health check interval in seconds.
    pub interval_secs: u64,

    /// Health check timeout in seconds.
    pub timeout_secs: u64,

    /// Path to probe for HTTP health checks.
    pub path: String,
}

impl Default for ActiveHealthConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: 10,
            timeout_secs: 2,
            path: "/health".to_string(),
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt. `None` means pool size - 1.
    pub max_retries: Option<usize>,
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Upstream connect timeout in milliseconds.
    pub connect_ms: u64,

    /// Maximum gap between upstream body frames, in seconds.
    pub idle_secs: Option<u64>,

    /// How long shutdown waits for open connections to drain.
    pub shutdown_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_ms: 2_000,
            idle_secs: None,
            shutdown_secs: 30,
        }
    }
}

impl TimeoutConfig {
    pub fn connect(&self) -> Duration {
        Duration::from_millis(self.connect_ms)
    }

    pub fn idle(&self) -> Option<Duration> {
        self.idle_secs.map(Duration::from_secs)
    }

    pub fn shutdown(&self) -> Duration {
        Duration::from_secs(self.shutdown_secs)
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = ProxyConfig::default();
        assert_eq!(config.health.failure_threshold, 3);
        assert_eq!(config.timeouts.connect(), Duration::from_secs(2));
        assert_eq!(config.timeouts.idle(), None);
        assert_eq!(config.balancer.strategy, Strategy::RoundRobin);
        assert!(!config.health.active.enabled);
    }

    #[test]
    fn max_attempts_defaults_to_pool_size() {
        let mut config = ProxyConfig::default();
        config.upstreams = vec![
            UpstreamConfig::new("127.0.0.1:8001"),
            UpstreamConfig::new("127.0.0.1:8002"),
            UpstreamConfig::new("127.0.0.1:8003"),
        ];
        assert_eq!(config.max_attempts(), 3);

        config.retries.max_retries = Some(0);
        assert_eq!(config.max_attempts(), 1);

        config.retries.max_retries = Some(10);
        assert_eq!(config.max_attempts(), 3);
    }

    #[test]
    fn parses_minimal_toml() {
        let config: ProxyConfig = toml::from_str(
            r#"
            [[upstreams]]
            address = "10.0.0.1:8000"

            [balancer]
            strategy = "least_connections"

            [timeouts]
            idle_secs = 15
            "#,
        )
        .unwrap();

        assert_eq!(config.upstreams, vec![UpstreamConfig::new("10.0.0.1:8000")]);
        assert_eq!(config.balancer.strategy, Strategy::LeastConnections);
        assert_eq!(config.timeouts.idle(), Some(Duration::from_secs(15)));
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
    }
}
