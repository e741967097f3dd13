//! Failure kinds for a proxied request.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("connect to {upstream} timed out after {timeout:?}")]
    ConnectTimeout { upstream: String, timeout: Duration },

    #[error("connection to {upstream} failed: {source}")]
    ConnectionRefused {
        upstream: String,
        #[source]
        source: std::io::Error,
    },

    #[error("upstream {upstream} reset the connection: {source}")]
    UpstreamReset {
        upstream: String,
        #[source]
        source: hyper::Error,
    },

    #[error("upstream {upstream} sent nothing for {timeout:?}")]
    IdleTimeout { upstream: String, timeout: Duration },

    #[error("all upstreams exhausted after {attempts} attempts")]
    AllUpstreamsExhausted {
        attempts: usize,
        #[source]
        last: Option<Box<ForwardError>>,
    },

    #[error("client disconnected")]
    ClientDisconnected,

    #[error("request body exceeds {limit} bytes")]
    BodyTooLarge { limit: usize },

    #[error("failed to read request body: {0}")]
    ClientBody(String),
}

impl ForwardError {
    /// Whether another upstream may be tried, assuming nothing has been
    /// streamed to the client yet.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ForwardError::ConnectTimeout { .. }
                | ForwardError::ConnectionRefused { .. }
                | ForwardError::UpstreamReset { .. }
                | ForwardError::IdleTimeout { .. }
        )
    }

    /// Stable label for logs, metrics and the `X-Proxy-Error` header.
    pub fn kind(&self) -> &'static str {
        match self {
            ForwardError::ConnectTimeout { .. } => "CONNECT_TIMEOUT",
            ForwardError::ConnectionRefused { .. } => "CONNECTION_REFUSED",
            ForwardError::UpstreamReset { .. } => "UPSTREAM_RESET",
            ForwardError::IdleTimeout { .. } => "IDLE_TIMEOUT",
            ForwardError::AllUpstreamsExhausted { .. } => "ALL_UPSTREAMS_EXHAUSTED",
            ForwardError::ClientDisconnected => "CLIENT_DISCONNECTED",
            ForwardError::BodyTooLarge { .. } => "BODY_TOO_LARGE",
            ForwardError::ClientBody(_) => "BAD_REQUEST_BODY",
        }
    }
}
