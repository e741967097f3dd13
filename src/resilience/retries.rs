//! Retry logic.
//!
//! # Responsibilities
//! - Bound the number of attempts per request
//! - Remember which upstreams a request already tried
//!
//! # Design Decisions
//! - Only pre-stream failures are retryable (see `ForwardError::is_retryable`)
//! - The bound never exceeds the pool size, so each upstream is tried at most once

use std::sync::Arc;

use crate::load_balancer::Upstream;

/// Attempt bound for a single request.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_attempts: usize,
}

impl RetryPolicy {
    pub fn new(max_attempts: usize) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    /// Attempts allowed against a pool of `pool_size` upstreams.
    pub fn attempts_for(&self, pool_size: usize) -> usize {
        self.max_attempts.min(pool_size)
    }
}

/// Where one attempt of a request is going.
#[derive(Debug, Clone)]
pub struct RoutingDecision {
    pub upstream: Arc<Upstream>,
    /// 1-based attempt number.
    pub attempt: usize,
}

/// Per-request routing history.
#[derive(Debug, Default)]
pub struct Attempts {
    tried: Vec<String>,
}

impl Attempts {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            tried: Vec::with_capacity(capacity),
        }
    }

    /// Record a routing decision and return it.
    pub fn record(&mut self, upstream: Arc<Upstream>) -> RoutingDecision {
        self.tried.push(upstream.addr.clone());
        RoutingDecision {
            upstream,
            attempt: self.tried.len(),
        }
    }

    pub fn tried(&self) -> &[String] {
        &self.tried
    }

    pub fn count(&self) -> usize {
        self.tried.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn attempts_are_capped_by_pool_size() {
        let policy = RetryPolicy::new(5);
        assert_eq!(policy.attempts_for(2), 2);
        assert_eq!(policy.attempts_for(8), 5);
        assert_eq!(RetryPolicy::new(0).attempts_for(3), 1);
    }

    #[test]
    fn attempts_number_decisions() {
        let mut attempts = Attempts::with_capacity(2);
        let a = Arc::new(Upstream::new("127.0.0.1:8001", Duration::from_secs(1)));
        let b = Arc::new(Upstream::new("127.0.0.1:8002", Duration::from_secs(1)));

        assert_eq!(attempts.record(a.clone()).attempt, 1);
        assert_eq!(attempts.record(b.clone()).attempt, 2);
        assert_eq!(attempts.tried(), &[a.addr.clone(), b.addr.clone()]);
        assert_eq!(attempts.count(), 2);
    }
}
