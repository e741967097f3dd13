//! Upstream registry.
//!
//! # Responsibilities
//! - Own the upstream pool, in configured rotation order
//! - Apply health transitions reported by the forwarder and the prober
//! - Never hide upstreams: the full pool is always listed (fail-open)

use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use crate::config::validation::is_upstream_address;
use crate::config::{HealthConfig, UpstreamConfig};
use crate::load_balancer::upstream::Upstream;
use crate::observability::metrics;

/// Capability interface over the upstream pool.
///
/// The static implementation below is built from configuration; a
/// discovery-backed implementation can stand in without touching the
/// balancer or the forwarder.
pub trait UpstreamRegistry: Send + Sync + Debug {
    /// Every upstream in rotation order, dead ones included.
    fn list_upstreams(&self) -> Vec<Arc<Upstream>>;

    fn mark_failure(&self, upstream: &Upstream);

    fn mark_success(&self, upstream: &Upstream);
}

/// Fixed pool created once at startup.
#[derive(Debug)]
pub struct StaticRegistry {
    upstreams: Vec<Arc<Upstream>>,
    failure_threshold: u32,
}

impl StaticRegistry {
    pub fn new(addrs: impl IntoIterator<Item = impl ToString>, failure_threshold: u32, cooldown: Duration) -> Self {
        let upstreams: Vec<Arc<Upstream>> = addrs
            .into_iter()
            .map(|addr| Arc::new(Upstream::new(addr.to_string(), cooldown)))
            .collect();

        for upstream in &upstreams {
            metrics::record_upstream_alive(&upstream.addr, true);
        }

        Self {
            upstreams,
            failure_threshold,
        }
    }

    /// Build the pool from configuration.
    ///
    /// Addresses are expected to be validated already; anything that is
    /// not `host:port` is skipped with a warning. Hostnames are kept as
    /// given and resolved on every connect.
    pub fn from_config(upstreams: &[UpstreamConfig], health: &HealthConfig) -> Self {
        let addrs = upstreams.iter().filter_map(|u| {
            if is_upstream_address(&u.address) {
                Some(u.address.as_str())
            } else {
                tracing::warn!(address = %u.address, "Invalid upstream address");
                None
            }
        });
        Self::new(addrs, health.failure_threshold, health.cooldown())
    }

    pub fn len(&self) -> usize {
        self.upstreams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.upstreams.is_empty()
    }

    /// Look up an upstream by address.
    pub fn get(&self, addr: impl ToString) -> Option<Arc<Upstream>> {
        let addr = addr.to_string();
        self.upstreams.iter().find(|u| u.addr == addr).cloned()
    }
}

impl UpstreamRegistry for StaticRegistry {
    fn list_upstreams(&self) -> Vec<Arc<Upstream>> {
        self.upstreams.clone()
    }

    fn mark_failure(&self, upstream: &Upstream) {
        if upstream.mark_failure(self.failure_threshold) {
            tracing::warn!(
                upstream = %upstream.addr,
                failures = upstream.consecutive_failures(),
                "Upstream marked dead"
            );
            metrics::record_upstream_alive(&upstream.addr, false);
        } else {
            tracing::debug!(
                upstream = %upstream.addr,
                failures = upstream.consecutive_failures(),
                "Upstream failure recorded"
            );
        }
    }

    fn mark_success(&self, upstream: &Upstream) {
        if upstream.mark_success() {
            tracing::info!(upstream = %upstream.addr, "Upstream revived");
            metrics::record_upstream_alive(&upstream.addr, true);
        }
    }
}
