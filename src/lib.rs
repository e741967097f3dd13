//! relay-gate: a small HTTP/1.1 reverse proxy and load balancer.
//!
//! Sits in front of a static pool of stateless upstream workers, picks one per
//! request, injects `Host`, `X-Real-IP` and `X-User-ID`, and retries other
//! upstreams when a connection fails before any response byte was relayed.

pub mod config;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod load_balancer;
pub mod net;
pub mod observability;
pub mod resilience;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
