//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection (net::listener)
//!     → server.rs (HTTP/1.1, peer address, catch-all handler)
//!     → request.rs (InboundRequest, body collected once)
//!     → headers.rs (Host, X-Real-IP, X-User-ID)
//!     → forwarder.rs (route, connect, retry)
//!     → body.rs (stream upstream response back)
//!     → response.rs (gateway errors, head cleanup)
//! ```

pub mod body;
pub mod error;
pub mod forwarder;
pub mod headers;
pub mod request;
pub mod response;
pub mod server;

pub use error::ForwardError;
pub use forwarder::{Forwarder, ForwarderSettings};
pub use request::{InboundRequest, OutboundRequest};
pub use server::HttpServer;

/// Correlation header read from clients for log fields.
pub const X_REQUEST_ID: &str = "x-request-id";
