//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router with the catch-all proxy handler
//! - Serve HTTP/1.1 on every accepted connection in its own task
//! - Attach the transport peer address to every request
//! - Read the request body, rewrite headers, hand off to the forwarder
//! - Run the optional active health monitor
//! - Drain connections on shutdown

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    response::Response,
    routing::any,
    Router,
};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::{Bytes, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;
use tower::ServiceExt;
use tower_http::trace::TraceLayer;
use tracing::Instrument;

use crate::config::ProxyConfig;
use crate::health::active::HealthMonitor;
use crate::http::error::ForwardError;
use crate::http::forwarder::{Forwarder, ForwarderSettings};
use crate::http::headers;
use crate::http::request::InboundRequest;
use crate::http::response::error_response;
use crate::http::X_REQUEST_ID;
use crate::lifecycle::Shutdown;
use crate::load_balancer::{self, StaticRegistry};
use crate::net::connection::ConnectionTracker;
use crate::net::listener::{ConnectionPermit, Listener};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub forwarder: Forwarder,
    pub max_body_bytes: usize,
}

/// HTTP server for the proxy.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
    registry: Arc<StaticRegistry>,
    tracker: ConnectionTracker,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: ProxyConfig) -> Self {
        let registry = Arc::new(StaticRegistry::from_config(&config.upstreams, &config.health));
        let balancer = load_balancer::from_strategy(config.balancer.strategy);
        let forwarder = Forwarder::new(
            registry.clone(),
            balancer,
            ForwarderSettings::from_config(&config),
        );

        let state = AppState {
            forwarder,
            max_body_bytes: config.listener.max_body_bytes,
        };

        Self {
            router: Self::build_router(state),
            config,
            registry,
            tracker: ConnectionTracker::new(),
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server until `shutdown` fires, then drain open connections.
    pub async fn run(self, listener: Listener, shutdown: Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            upstreams = self.registry.len(),
            strategy = ?self.config.balancer.strategy,
            "HTTP server starting"
        );

        if self.config.health.active.enabled {
            let monitor = HealthMonitor::new(self.registry.clone(), self.config.health.active.clone());
            let monitor_shutdown = shutdown.subscribe();
            tokio::spawn(async move {
                monitor.run(monitor_shutdown).await;
            });
        }

        let mut stop = shutdown.subscribe();
        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer, permit)) => {
                            self.spawn_connection(stream, peer, permit, &shutdown);
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "Accept failed");
                            if e.is_fatal() {
                                break;
                            }
                        }
                    }
                }
                _ = stop.recv() => {
                    tracing::info!("Listener closing, no longer accepting connections");
                    break;
                }
            }
        }
        drop(listener);

        let drain = self.config.timeouts.shutdown();
        if tokio::time::timeout(drain, self.tracker.drained()).await.is_err() {
            tracing::warn!(
                remaining = self.tracker.active_count(),
                "Drain timeout elapsed with connections still open"
            );
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    fn spawn_connection(&self, stream: TcpStream, peer: SocketAddr, permit: ConnectionPermit, shutdown: &Shutdown) {
        let router = self.router.clone();
        let guard = self.tracker.track();
        let mut stop = shutdown.subscribe();

        let span = tracing::debug_span!("connection", id = %guard.id(), peer = %peer);
        tokio::spawn(
            async move {
                let _permit = permit;
                let _guard = guard;

                let service = service_fn(move |mut request: Request<Incoming>| {
                    request.extensions_mut().insert(ConnectInfo(peer));
                    router.clone().oneshot(request)
                });

                let conn = http1::Builder::new().serve_connection(TokioIo::new(stream), service);
                tokio::pin!(conn);

                let result = tokio::select! {
                    result = conn.as_mut() => result,
                    _ = stop.recv() => {
                        conn.as_mut().graceful_shutdown();
                        conn.as_mut().await
                    }
                };

                if let Err(e) = result {
                    tracing::debug!(error = %e, "Connection ended with error");
                }
            }
            .instrument(span),
        );
    }

    /// Shared handle to the upstream pool.
    pub fn registry(&self) -> Arc<StaticRegistry> {
        self.registry.clone()
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }
}

/// Catch-all handler: every method and path is proxied.
async fn proxy_handler(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let request_id = request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let span = tracing::info_span!(
        "proxy",
        request_id = %request_id,
        method = %request.method(),
        path = %request.uri().path(),
        peer = %peer,
    );

    async move {
        let (parts, body) = request.into_parts();
        let body = match read_body(body, state.max_body_bytes).await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(error = %e, "Rejecting request body");
                return error_response(&e);
            }
        };

        let inbound = InboundRequest::from_parts(parts, body, peer);
        let outbound = headers::rewrite(&inbound);

        match state.forwarder.forward(&outbound).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(error = %e, "Request failed");
                error_response(&e)
            }
        }
    }
    .instrument(span)
    .await
}

/// Collect the request body so every attempt can replay it.
async fn read_body(body: Body, limit: usize) -> Result<Bytes, ForwardError> {
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
            Err(ForwardError::BodyTooLarge { limit })
        }
        Err(e) => Err(ForwardError::ClientBody(e.to_string())),
    }
}
