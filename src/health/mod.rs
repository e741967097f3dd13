//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Passive (http::forwarder):
//!     Request outcome observed
//!     → registry.mark_failure / mark_success
//!
//! Active (active.rs, optional):
//!     Periodic timer
//!     → Probe each upstream
//!     → registry.mark_failure / mark_success
//! ```
//!
//! # Design Decisions
//! - Both paths feed the same transitions, so thresholds mean the same thing
//! - Dead upstreams come back on their own after a cooldown even without probing

pub mod active;
