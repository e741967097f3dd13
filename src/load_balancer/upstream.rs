//! Upstream abstraction.
//!
//! # Responsibilities
//! - Represent a single upstream server
//! - Track health state (alive flag, consecutive failures, time of death)
//! - Track in-flight requests (for Least Connections LB)

use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Sentinel for "never marked dead".
const NOT_DEAD: u64 = u64::MAX;

/// A single upstream server.
pub struct Upstream {
    /// `host:port` authority, resolved on every connect.
    pub addr: String,
    /// How long a dead upstream sits out before it is tried again.
    cooldown: Duration,
    /// Reference point for `dead_at_ms`.
    epoch: Instant,

    alive: AtomicBool,
    consecutive_failures: AtomicU32,
    /// Milliseconds after `epoch` at which the upstream was last marked dead.
    dead_at_ms: AtomicU64,
    in_flight: AtomicUsize,
}

impl Upstream {
    /// Create a new upstream. Upstreams start alive.
    pub fn new(addr: impl Into<String>, cooldown: Duration) -> Self {
        Self {
            addr: addr.into(),
            cooldown,
            epoch: Instant::now(),
            alive: AtomicBool::new(true),
            consecutive_failures: AtomicU32::new(0),
            dead_at_ms: AtomicU64::new(NOT_DEAD),
            in_flight: AtomicUsize::new(0),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::Acquire)
    }

    /// Number of requests currently being served by this upstream.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Relaxed)
    }

    /// Whether the balancer may pick this upstream right now.
    ///
    /// A dead upstream becomes eligible again once its cooldown has elapsed.
    pub fn is_available(&self) -> bool {
        self.is_available_at(Instant::now())
    }

    pub fn is_available_at(&self, now: Instant) -> bool {
        if self.is_alive() {
            return true;
        }
        let dead_at = self.dead_at_ms.load(Ordering::Acquire);
        if dead_at == NOT_DEAD {
            return true;
        }
        let dead_for = Duration::from_millis(self.millis_since_epoch(now).saturating_sub(dead_at));
        dead_for >= self.cooldown
    }

    /// Report a successful request/check.
    ///
    /// Returns true if this revived a dead upstream.
    pub fn mark_success(&self) -> bool {
        self.consecutive_failures.store(0, Ordering::Release);
        self.dead_at_ms.store(NOT_DEAD, Ordering::Release);
        !self.alive.swap(true, Ordering::AcqRel)
    }

    /// Report a failed request/check.
    ///
    /// Returns true if this failure took the upstream from alive to dead.
    /// A failure while already dead restarts the cooldown.
    pub fn mark_failure(&self, threshold: u32) -> bool {
        self.mark_failure_at(threshold, Instant::now())
    }

    pub fn mark_failure_at(&self, threshold: u32, now: Instant) -> bool {
        let failures = self
            .consecutive_failures
            .fetch_add(1, Ordering::AcqRel)
            .saturating_add(1);

        if !self.is_alive() {
            self.dead_at_ms
                .store(self.millis_since_epoch(now), Ordering::Release);
            return false;
        }

        if failures >= threshold {
            self.dead_at_ms
                .store(self.millis_since_epoch(now), Ordering::Release);
            return self.alive.swap(false, Ordering::AcqRel);
        }
        false
    }

    /// Count a request against this upstream until the guard drops.
    pub fn track(self: &Arc<Self>) -> InFlightGuard {
        self.in_flight.fetch_add(1, Ordering::Relaxed);
        InFlightGuard {
            upstream: Arc::clone(self),
        }
    }

    fn millis_since_epoch(&self, now: Instant) -> u64 {
        now.saturating_duration_since(self.epoch).as_millis() as u64
    }
}

impl fmt::Debug for Upstream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Upstream")
            .field("addr", &self.addr)
            .field("alive", &self.is_alive())
            .field("consecutive_failures", &self.consecutive_failures())
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

/// A RAII guard that manages the in-flight request count.
#[derive(Debug)]
pub struct InFlightGuard {
    upstream: Arc<Upstream>,
}

impl InFlightGuard {
    pub fn upstream(&self) -> &Arc<Upstream> {
        &self.upstream
    }
}

impl Deref for InFlightGuard {
    type Target = Upstream;
    fn deref(&self) -> &Self::Target {
        &self.upstream
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.upstream.in_flight.fetch_sub(1, Ordering::Relaxed);
    }
}
