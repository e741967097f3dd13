//! Least Connections load balancing strategy.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::load_balancer::{candidates, upstream::Upstream, LoadBalancer};

/// Least connections selector.
/// Selects the upstream with the fewest in-flight requests. Ties go to
/// whichever comes first in rotation order from the shared cursor.
#[derive(Debug, Default)]
pub struct LeastConnections {
    counter: AtomicUsize,
}

impl LeastConnections {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LoadBalancer for LeastConnections {
    fn select(&self, pool: &[Arc<Upstream>], exclude: &[String]) -> Option<Arc<Upstream>> {
        let candidates = candidates(pool, exclude);
        if candidates.is_empty() {
            return None;
        }

        let start = self.counter.fetch_add(1, Ordering::Relaxed);
        let len = candidates.len();

        // min_by_key keeps the first minimum, which is the earliest in rotation.
        (0..len)
            .map(|i| candidates[start.wrapping_add(i) % len])
            .min_by_key(|upstream| upstream.in_flight())
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::Duration;

    fn pair() -> (Arc<Upstream>, Arc<Upstream>) {
        (
            Arc::new(Upstream::new("127.0.0.1:8080", Duration::from_secs(10))),
            Arc::new(Upstream::new("127.0.0.1:8081", Duration::from_secs(10))),
        )
    }

    #[test]
    fn test_least_conn() {
        let lb = LeastConnections::new();
        let (b1, b2) = pair();

        let _g1 = b1.track();
        let upstreams = vec![b1.clone(), b2.clone()];

        // Should pick b2 (0 in flight)
        let s1 = lb.select(&upstreams, &[]).unwrap();
        assert_eq!(s1.addr, b2.addr);

        let _g2 = b2.track();
        let _g3 = b2.track();

        // Should pick b1 (1 in flight)
        let s2 = lb.select(&upstreams, &[]).unwrap();
        assert_eq!(s2.addr, b1.addr);
    }

    #[test]
    fn ties_rotate() {
        let lb = LeastConnections::new();
        let (b1, b2) = pair();
        let upstreams = vec![b1.clone(), b2.clone()];

        assert_eq!(lb.select(&upstreams, &[]).unwrap().addr, b1.addr);
        assert_eq!(lb.select(&upstreams, &[]).unwrap().addr, b2.addr);
        assert_eq!(lb.select(&upstreams, &[]).unwrap().addr, b1.addr);
    }

    #[test]
    fn ties_rotate_evenly_around_dead_upstream() {
        let lb = LeastConnections::new();
        let upstreams: Vec<_> = (0..3)
            .map(|i| Arc::new(Upstream::new(format!("127.0.0.1:{}", 9000 + i), Duration::from_secs(60))))
            .collect();
        for _ in 0..3 {
            upstreams[0].mark_failure(3);
        }

        let mut hits: HashMap<String, usize> = HashMap::new();
        for _ in 0..300 {
            let chosen = lb.select(&upstreams, &[]).unwrap();
            *hits.entry(chosen.addr.clone()).or_default() += 1;
        }

        assert!(!hits.contains_key(&upstreams[0].addr));
        assert_eq!(hits[&upstreams[1].addr], 150);
        assert_eq!(hits[&upstreams[2].addr], 150);
    }

    #[test]
    fn respects_exclusion() {
        let lb = LeastConnections::new();
        let (b1, b2) = pair();
        let _g = b2.track();
        let upstreams = vec![b1.clone(), b2.clone()];

        assert_eq!(lb.select(&upstreams, &[b1.addr.clone()]).unwrap().addr, b2.addr);
    }
}
