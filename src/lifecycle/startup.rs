//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize observability from the validated configuration
//! - Bind the listener and run the server until shutdown

use std::net::SocketAddr;

use crate::config::ProxyConfig;
use crate::http::HttpServer;
use crate::lifecycle::{signals, Shutdown};
use crate::net::listener::Listener;
use crate::observability::metrics;

/// Run the proxy with an already validated configuration.
pub async fn run(config: ProxyConfig) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstreams = config.upstreams.len(),
        max_attempts = config.max_attempts(),
        connect_timeout_ms = config.timeouts.connect_ms,
        "Configuration loaded"
    );

    // The identity header is trusted as-is; only a trusted hop may reach us.
    tracing::warn!(
        "X-User-ID is forwarded without verification; the proxy must only be reachable from a trusted network position"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let server = HttpServer::new(config.clone());
    let listener = Listener::bind(&config.listener).await?;

    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(shutdown.clone());

    server.run(listener, shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
