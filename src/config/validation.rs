//! Configuration validation.
//!
//! Serde handles syntax; this module checks values and cross-field rules.
//! Every problem is reported, not just the first one.

use std::collections::HashSet;
use std::net::SocketAddr;

use axum::http::uri::Authority;
use thiserror::Error;

use crate::config::schema::ProxyConfig;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("at least one upstream is required")]
    NoUpstreams,

    #[error("invalid upstream address '{0}'")]
    InvalidUpstream(String),

    #[error("duplicate upstream address '{0}'")]
    DuplicateUpstream(String),

    #[error("invalid bind address '{0}'")]
    InvalidBindAddress(String),

    #[error("invalid metrics address '{0}'")]
    InvalidMetricsAddress(String),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("max_retries ({retries}) must be less than the pool size ({pool})")]
    TooManyRetries { retries: usize, pool: usize },
}

/// Whether `address` is a `host:port` authority an upstream can be dialed at.
///
/// The host may be an IP literal or a name (container service names are
/// typical); names are resolved when connecting, not here.
pub fn is_upstream_address(address: &str) -> bool {
    match address.parse::<Authority>() {
        Ok(authority) => {
            !address.contains('@')
                && !authority.host().is_empty()
                && authority.port_u16().is_some_and(|port| port != 0)
        }
        Err(_) => false,
    }
}

/// Check a parsed configuration before it is accepted.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.upstreams.is_empty() {
        errors.push(ValidationError::NoUpstreams);
    }

    let mut seen = HashSet::new();
    for upstream in &config.upstreams {
        if !is_upstream_address(&upstream.address) {
            errors.push(ValidationError::InvalidUpstream(upstream.address.clone()));
        } else if !seen.insert(upstream.address.to_ascii_lowercase()) {
            errors.push(ValidationError::DuplicateUpstream(upstream.address.clone()));
        }
    }

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if config.listener.max_connections == 0 {
        errors.push(ValidationError::Zero("listener.max_connections"));
    }
    if config.listener.max_body_bytes == 0 {
        errors.push(ValidationError::Zero("listener.max_body_bytes"));
    }
    if config.health.failure_threshold == 0 {
        errors.push(ValidationError::Zero("health.failure_threshold"));
    }
    if config.timeouts.connect_ms == 0 {
        errors.push(ValidationError::Zero("timeouts.connect_ms"));
    }
    if config.timeouts.idle_secs == Some(0) {
        errors.push(ValidationError::Zero("timeouts.idle_secs"));
    }
    if config.health.active.enabled && config.health.active.interval_secs == 0 {
        errors.push(ValidationError::Zero("health.active.interval_secs"));
    }

    if let Some(retries) = config.retries.max_retries {
        let pool = config.upstreams.len();
        if pool > 0 && retries >= pool {
            errors.push(ValidationError::TooManyRetries { retries, pool });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::UpstreamConfig;

    fn valid() -> ProxyConfig {
        let mut config = ProxyConfig::default();
        config.upstreams = vec![
            UpstreamConfig::new("127.0.0.1:8001"),
            UpstreamConfig::new("127.0.0.1:8002"),
        ];
        config
    }

    #[test]
    fn accepts_valid_config() {
        assert_eq!(validate_config(&valid()), Ok(()));
    }

    #[test]
    fn rejects_empty_pool() {
        let config = ProxyConfig::default();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors, vec![ValidationError::NoUpstreams]);
    }

    #[test]
    fn collects_every_error() {
        let mut config = valid();
        config.upstreams.push(UpstreamConfig::new("127.0.0.1:8001"));
        config.upstreams.push(UpstreamConfig::new("backend"));
        config.listener.bind_address = "nowhere".into();
        config.health.failure_threshold = 0;

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::DuplicateUpstream("127.0.0.1:8001".into())));
        assert!(errors.contains(&ValidationError::InvalidUpstream("backend".into())));
        assert!(errors.contains(&ValidationError::InvalidBindAddress("nowhere".into())));
        assert!(errors.contains(&ValidationError::Zero("health.failure_threshold")));
        assert_eq!(errors.len(), 4);
    }

    #[test]
    fn accepts_hostname_upstreams() {
        let mut config = valid();
        config.upstreams = vec![
            UpstreamConfig::new("localhost:8000"),
            UpstreamConfig::new("backend:8000"),
            UpstreamConfig::new("[::1]:8000"),
        ];
        assert_eq!(validate_config(&config), Ok(()));
    }

    #[test]
    fn upstream_address_needs_host_and_port() {
        assert!(is_upstream_address("cart-service:8080"));
        assert!(is_upstream_address("10.0.0.4:80"));
        assert!(!is_upstream_address("cart-service"));
        assert!(!is_upstream_address(":8080"));
        assert!(!is_upstream_address("cart-service:0"));
        assert!(!is_upstream_address("user@cart-service:8080"));
        assert!(!is_upstream_address("http://cart-service:8080"));
    }

    #[test]
    fn hostname_duplicates_ignore_case() {
        let mut config = valid();
        config.upstreams = vec![UpstreamConfig::new("Backend:8000"), UpstreamConfig::new("backend:8000")];
        assert_eq!(
            validate_config(&config),
            Err(vec![ValidationError::DuplicateUpstream("backend:8000".into())])
        );
    }

    #[test]
    fn retries_must_stay_below_pool_size() {
        let mut config = valid();
        config.retries.max_retries = Some(1);
        assert!(validate_config(&config).is_ok());

        config.retries.max_retries = Some(2);
        assert_eq!(
            validate_config(&config),
            Err(vec![ValidationError::TooManyRetries { retries: 2, pool: 2 }])
        );
    }
}
