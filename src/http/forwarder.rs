//! Request forwarding.
//!
//! # State machine (per request)
//! ```text
//! Received → Routing → Connecting → Streaming → Completed
//!               ▲          │             │
//!               └──────────┘             └──→ Failed (terminal)
//!          pre-stream failure,
//!          bounded by attempts
//! ```
//!
//! The retry loop returns as soon as an upstream produced a response head,
//! so nothing after that point can loop back to routing.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::Response;
use hyper::client::conn::http1;
use hyper_util::rt::TokioIo;

use crate::config::ProxyConfig;
use crate::http::body::{ConnectionTask, UpstreamBody};
use crate::http::error::ForwardError;
use crate::http::request::OutboundRequest;
use crate::http::response::prepare_upstream_head;
use crate::load_balancer::{LoadBalancer, Upstream, UpstreamRegistry};
use crate::observability::metrics;
use crate::resilience::retries::{Attempts, RetryPolicy};
use crate::resilience::timeouts;

/// Timeouts and bounds for the forwarder.
#[derive(Debug, Clone)]
pub struct ForwarderSettings {
    pub connect_timeout: Duration,
    pub idle_timeout: Option<Duration>,
    pub retry: RetryPolicy,
}

impl ForwarderSettings {
    pub fn from_config(config: &ProxyConfig) -> Self {
        Self {
            connect_timeout: config.timeouts.connect(),
            idle_timeout: config.timeouts.idle(),
            retry: RetryPolicy::new(config.max_attempts()),
        }
    }
}

/// Owns the upstream side of every request.
#[derive(Debug, Clone)]
pub struct Forwarder {
    registry: Arc<dyn UpstreamRegistry>,
    balancer: Arc<dyn LoadBalancer>,
    settings: ForwarderSettings,
}

impl Forwarder {
    pub fn new(
        registry: Arc<dyn UpstreamRegistry>,
        balancer: Arc<dyn LoadBalancer>,
        settings: ForwarderSettings,
    ) -> Self {
        Self {
            registry,
            balancer,
            settings,
        }
    }

    pub fn registry(&self) -> &Arc<dyn UpstreamRegistry> {
        &self.registry
    }

    /// Route the request, retrying on other upstreams until one answers.
    ///
    /// On success the response head is returned with a streaming body.
    /// Each failed attempt marks its upstream failed before the next one.
    pub async fn forward(&self, outbound: &OutboundRequest) -> Result<Response<Body>, ForwardError> {
        let pool = self.registry.list_upstreams();
        let max_attempts = self.settings.retry.attempts_for(pool.len());
        let mut attempts = Attempts::with_capacity(max_attempts);
        let mut last_error = None;

        while attempts.count() < max_attempts {
            let Some(upstream) = self.balancer.select(&pool, attempts.tried()) else {
                break;
            };
            let decision = attempts.record(upstream);

            tracing::debug!(
                upstream = %decision.upstream.addr,
                attempt = decision.attempt,
                max_attempts,
                "Routing request"
            );

            match self.forward_to(outbound, &decision.upstream).await {
                Ok(response) => return Ok(response),
                Err(err) => {
                    tracing::warn!(
                        upstream = %decision.upstream.addr,
                        attempt = decision.attempt,
                        error = %err,
                        "Upstream attempt failed"
                    );
                    metrics::record_upstream_failure(&decision.upstream.addr, err.kind());
                    self.registry.mark_failure(&decision.upstream);

                    if !err.is_retryable() {
                        return Err(err);
                    }
                    last_error = Some(Box::new(err));
                }
            }
        }

        Err(ForwardError::AllUpstreamsExhausted {
            attempts: attempts.count(),
            last: last_error,
        })
    }

    /// Send the request to one upstream and return its response head.
    ///
    /// Nothing has reached the client when this returns an error, so the
    /// caller is free to try elsewhere.
    pub async fn forward_to(
        &self,
        outbound: &OutboundRequest,
        upstream: &Arc<Upstream>,
    ) -> Result<Response<Body>, ForwardError> {
        let addr = upstream.addr.as_str();
        let in_flight = upstream.track();

        let stream = timeouts::connect(addr, self.settings.connect_timeout).await?;

        let (mut sender, conn) = http1::handshake(TokioIo::new(stream))
            .await
            .map_err(|source| ForwardError::UpstreamReset {
                upstream: addr.to_string(),
                source,
            })?;
        let conn = ConnectionTask::spawn(addr.to_string(), conn);

        let response = timeouts::within_idle(addr, self.settings.idle_timeout, async {
            sender
                .send_request(outbound.to_request())
                .await
                .map_err(|source| ForwardError::UpstreamReset {
                    upstream: addr.to_string(),
                    source,
                })
        })
        .await?;

        self.registry.mark_success(upstream);
        tracing::debug!(upstream = %addr, status = %response.status(), "Upstream responded");

        let (mut parts, incoming) = response.into_parts();
        prepare_upstream_head(&mut parts.headers);

        let body = UpstreamBody::new(
            incoming,
            conn,
            in_flight,
            Arc::clone(&self.registry),
            self.settings.idle_timeout,
        );
        Ok(Response::from_parts(parts, Body::new(body)))
    }
}
