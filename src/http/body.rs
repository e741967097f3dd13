//! Streaming upstream response body.
//!
//! # Responsibilities
//! - Relay upstream frames to the client as they arrive
//! - Enforce the optional idle-stream timeout
//! - Own the upstream connection so every exit path closes it
//!
//! # Design Decisions
//! - Errors after streaming began are terminal: the client stream is cut
//!   and the upstream is marked failed, never retried
//! - Dropping the body before the end means the client went away; the
//!   upstream connection task is aborted with it

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use hyper::body::{Body, Bytes, Frame, Incoming, SizeHint};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Sleep};

use crate::http::error::ForwardError;
use crate::load_balancer::{InFlightGuard, UpstreamRegistry};
use crate::observability::metrics;

/// Background task driving one upstream HTTP/1.1 connection.
///
/// Aborted on drop, which closes the socket.
#[derive(Debug)]
pub struct ConnectionTask {
    handle: JoinHandle<()>,
}

impl ConnectionTask {
    pub fn spawn<F>(upstream: String, conn: F) -> Self
    where
        F: Future<Output = Result<(), hyper::Error>> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            if let Err(e) = conn.await {
                tracing::debug!(upstream = %upstream, error = %e, "Upstream connection closed with error");
            }
        });
        Self { handle }
    }
}

impl Drop for ConnectionTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamState {
    /// Between frames; the client side decides when we poll next.
    Ready,
    /// Last poll found nothing; the idle clock is running.
    Waiting,
    Completed,
    Failed,
}

/// Response body relayed from an upstream.
pub struct UpstreamBody<B = Incoming> {
    inner: B,
    upstream: InFlightGuard,
    registry: Arc<dyn UpstreamRegistry>,
    idle_timeout: Option<Duration>,
    idle: Option<Pin<Box<Sleep>>>,
    state: StreamState,
    // Declared last so the connection outlives `inner` during drop.
    _conn: ConnectionTask,
}

impl<B> UpstreamBody<B>
where
    B: Body<Data = Bytes, Error = hyper::Error> + Unpin,
{
    pub fn new(
        inner: B,
        conn: ConnectionTask,
        upstream: InFlightGuard,
        registry: Arc<dyn UpstreamRegistry>,
        idle_timeout: Option<Duration>,
    ) -> Self {
        let mut body = Self {
            inner,
            upstream,
            registry,
            idle_timeout,
            idle: idle_timeout.map(|d| Box::pin(tokio::time::sleep(d))),
            state: StreamState::Ready,
            _conn: conn,
        };
        // Empty bodies are never polled.
        if body.inner.is_end_stream() {
            body.complete();
        }
        body
    }

    fn is_streaming(&self) -> bool {
        matches!(self.state, StreamState::Ready | StreamState::Waiting)
    }

    fn reset_idle(&mut self) {
        if let (Some(idle), Some(timeout)) = (self.idle.as_mut(), self.idle_timeout) {
            idle.as_mut().reset(Instant::now() + timeout);
        }
    }

    fn complete(&mut self) {
        self.state = StreamState::Completed;
        metrics::record_request(&self.upstream.addr, "completed");
        tracing::debug!(upstream = %self.upstream.addr, "Upstream response completed");
    }

    fn fail(&mut self, err: &ForwardError) {
        self.state = StreamState::Failed;
        tracing::warn!(upstream = %self.upstream.addr, error = %err, "Upstream failed mid-stream");
        metrics::record_upstream_failure(&self.upstream.addr, err.kind());
        metrics::record_request(&self.upstream.addr, "stream_failed");
        self.registry.mark_failure(&self.upstream);
    }
}

impl<B> Body for UpstreamBody<B>
where
    B: Body<Data = Bytes, Error = hyper::Error> + Unpin,
{
    type Data = Bytes;
    type Error = ForwardError;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        match this.state {
            StreamState::Completed | StreamState::Failed => return Poll::Ready(None),
            // Time spent waiting on the client does not count as upstream silence.
            StreamState::Ready => this.reset_idle(),
            StreamState::Waiting => {}
        }

        match Pin::new(&mut this.inner).poll_frame(cx) {
            Poll::Ready(Some(Ok(frame))) => {
                this.state = StreamState::Ready;
                if this.inner.is_end_stream() {
                    this.complete();
                }
                Poll::Ready(Some(Ok(frame)))
            }
            Poll::Ready(Some(Err(source))) => {
                let err = ForwardError::UpstreamReset {
                    upstream: this.upstream.addr.clone(),
                    source,
                };
                this.fail(&err);
                Poll::Ready(Some(Err(err)))
            }
            Poll::Ready(None) => {
                this.complete();
                Poll::Ready(None)
            }
            Poll::Pending => {
                this.state = StreamState::Waiting;
                let timed_out = this
                    .idle
                    .as_mut()
                    .is_some_and(|idle| idle.as_mut().poll(cx).is_ready());
                if timed_out {
                    let err = ForwardError::IdleTimeout {
                        upstream: this.upstream.addr.clone(),
                        timeout: this.idle_timeout.unwrap_or_default(),
                    };
                    this.fail(&err);
                    return Poll::Ready(Some(Err(err)));
                }
                Poll::Pending
            }
        }
    }

    fn is_end_stream(&self) -> bool {
        !self.is_streaming() || self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

impl<B> Drop for UpstreamBody<B> {
    fn drop(&mut self) {
        if matches!(self.state, StreamState::Ready | StreamState::Waiting) {
            let err = ForwardError::ClientDisconnected;
            tracing::debug!(upstream = %self.upstream.addr, reason = %err, "Aborting upstream connection");
            metrics::record_request(&self.upstream.addr, "client_disconnected");
        }
    }
}
