//! Active health checking.
//!
//! # Responsibilities
//! - Periodically probe upstreams
//! - Report results through the registry

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::Request;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::sync::broadcast;
use tokio::time;

use crate::config::ActiveHealthConfig;
use crate::load_balancer::{Upstream, UpstreamRegistry};

pub struct HealthMonitor {
    registry: Arc<dyn UpstreamRegistry>,
    config: ActiveHealthConfig,
    client: Client<HttpConnector, Body>,
}

impl HealthMonitor {
    pub fn new(registry: Arc<dyn UpstreamRegistry>, config: ActiveHealthConfig) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        Self {
            registry,
            config,
            client,
        }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        if !self.config.enabled {
            tracing::info!("Active health checks disabled");
            return;
        }

        tracing::info!(
            interval = self.config.interval_secs,
            path = %self.config.path,
            "Health monitor starting"
        );

        let mut ticker = time::interval(Duration::from_secs(self.config.interval_secs));

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.check_all().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Health monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    async fn check_all(&self) {
        for upstream in self.registry.list_upstreams() {
            if self.probe(&upstream).await {
                self.registry.mark_success(&upstream);
            } else {
                self.registry.mark_failure(&upstream);
            }
        }
    }

    /// One probe. Any 2xx within the timeout counts as healthy.
    pub async fn probe(&self, upstream: &Upstream) -> bool {
        let addr = &upstream.addr;
        let request = match Request::builder()
            .method("GET")
            .uri(format!("http://{}{}", addr, self.config.path))
            .header("user-agent", "relay-gate-health-check")
            .body(Body::empty())
        {
            Ok(req) => req,
            Err(e) => {
                tracing::error!(upstream = %addr, error = %e, "Failed to build health check request");
                return false;
            }
        };

        let timeout = Duration::from_secs(self.config.timeout_secs);
        match time::timeout(timeout, self.client.request(request)).await {
            Ok(Ok(response)) => {
                let success = response.status().is_success();
                if !success {
                    tracing::warn!(upstream = %addr, status = %response.status(), "Health check failed: non-success status");
                }
                success
            }
            Ok(Err(e)) => {
                tracing::warn!(upstream = %addr, error = %e, "Health check failed: connection error");
                false
            }
            Err(_) => {
                tracing::warn!(upstream = %addr, "Health check failed: timeout");
                false
            }
        }
    }
}
