//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request to upstream:
//!     → timeouts.rs (bounded connect)
//!     → On pre-stream failure: retries.rs (bounded attempts, next upstream)
//! ```
//!
//! # Design Decisions
//! - Every connect has a deadline
//! - Retries never repeat an upstream within one request while others remain
//! - No retry once the response head has been handed to the client

pub mod retries;
pub mod timeouts;
