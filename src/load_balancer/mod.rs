//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Request received
//!     → registry.rs (list the full pool, dead upstreams included)
//!     → Apply load balancing algorithm:
//!         - round_robin.rs (rotate through upstreams)
//!         - least_conn.rs (pick upstream with fewest in-flight requests)
//!     → upstream.rs (health state, in-flight guard)
//!     → Return chosen upstream
//! ```
//!
//! # Design Decisions
//! - The cursor lives in the balancer instance, created once at startup
//! - Dead upstreams are skipped until their cooldown elapses
//! - If nothing is eligible, fall back to the whole pool (fail-open)
//! - Upstreams already tried by the current request are skipped on retry

pub mod least_conn;
pub mod registry;
pub mod round_robin;
pub mod upstream;

use std::fmt::Debug;
use std::sync::Arc;

use crate::config::Strategy;

pub use least_conn::LeastConnections;
pub use registry::{StaticRegistry, UpstreamRegistry};
pub use round_robin::RoundRobin;
pub use upstream::{InFlightGuard, Upstream};

/// Selection strategy over an upstream pool.
pub trait LoadBalancer: Send + Sync + Debug {
    /// Pick one upstream, avoiding the `exclude` addresses where possible.
    ///
    /// Returns `None` only for an empty pool.
    fn select(&self, pool: &[Arc<Upstream>], exclude: &[String]) -> Option<Arc<Upstream>>;
}

/// Build the configured strategy.
pub fn from_strategy(strategy: Strategy) -> Arc<dyn LoadBalancer> {
    match strategy {
        Strategy::RoundRobin => Arc::new(RoundRobin::new()),
        Strategy::LeastConnections => Arc::new(LeastConnections::new()),
    }
}

/// Upstreams a selection may choose from, in pool order.
///
/// Rotation happens over this subset, so a skipped upstream's share is
/// spread over the rest instead of landing on its neighbour.
pub(crate) fn candidates<'a>(pool: &'a [Arc<Upstream>], exclude: &[String]) -> Vec<&'a Arc<Upstream>> {
    let eligibility = Eligibility::for_pool(pool, exclude);
    pool.iter()
        .filter(|upstream| eligibility.allows(upstream, exclude))
        .collect()
}

/// How strict a selection may be for a given pool snapshot.
///
/// Each level is tried only if the stricter one has no candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Eligibility {
    /// Available and not yet tried.
    Available,
    /// Not yet tried, health ignored (fail-open).
    Untried,
    /// Anything.
    Any,
}

impl Eligibility {
    pub(crate) fn for_pool(pool: &[Arc<Upstream>], exclude: &[String]) -> Self {
        if pool.iter().any(|u| Self::Available.allows(u, exclude)) {
            Eligibility::Available
        } else if pool.iter().any(|u| Self::Untried.allows(u, exclude)) {
            Eligibility::Untried
        } else {
            Eligibility::Any
        }
    }

    pub(crate) fn allows(self, upstream: &Upstream, exclude: &[String]) -> bool {
        let untried = !exclude.contains(&upstream.addr);
        match self {
            Eligibility::Available => untried && upstream.is_available(),
            Eligibility::Untried => untried,
            Eligibility::Any => true,
        }
    }
}
