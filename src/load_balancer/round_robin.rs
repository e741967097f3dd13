//! Round-robin load balancing strategy.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::load_balancer::{candidates, upstream::Upstream, LoadBalancer};

/// Round-robin selector.
/// Stores an internal counter to rotate through the eligible upstreams.
#[derive(Debug, Default)]
pub struct RoundRobin {
    counter: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LoadBalancer for RoundRobin {
    fn select(&self, pool: &[Arc<Upstream>], exclude: &[String]) -> Option<Arc<Upstream>> {
        let candidates = candidates(pool, exclude);
        if candidates.is_empty() {
            return None;
        }

        // Advance on every selection, whatever happens to the request.
        let start = self.counter.fetch_add(1, Ordering::Relaxed);
        Some(Arc::clone(candidates[start % candidates.len()]))
    }
}
