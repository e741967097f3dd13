//! Timeout enforcement.
//!
//! Timeout errors are distinct from other connect failures so they can be
//! reported separately.

use std::future::Future;
use std::time::Duration;

use tokio::net::TcpStream;

use crate::http::error::ForwardError;

/// Dial an upstream with a bounded connect timeout.
///
/// `upstream` is a `host:port` authority; name resolution counts against
/// the same timeout and a failed lookup is reported like a refused connect.
pub async fn connect(upstream: &str, timeout: Duration) -> Result<TcpStream, ForwardError> {
    match tokio::time::timeout(timeout, TcpStream::connect(upstream)).await {
        Ok(Ok(stream)) => {
            if let Err(e) = stream.set_nodelay(true) {
                tracing::trace!(upstream = %upstream, error = %e, "Failed to set TCP_NODELAY");
            }
            Ok(stream)
        }
        Ok(Err(source)) => Err(ForwardError::ConnectionRefused {
            upstream: upstream.to_string(),
            source,
        }),
        Err(_) => Err(ForwardError::ConnectTimeout {
            upstream: upstream.to_string(),
            timeout,
        }),
    }
}

/// Wait for `fut`, failing with `IdleTimeout` if a deadline is set and passes first.
pub async fn within_idle<F, T>(
    upstream: &str,
    idle: Option<Duration>,
    fut: F,
) -> Result<T, ForwardError>
where
    F: Future<Output = Result<T, ForwardError>>,
{
    match idle {
        Some(timeout) => tokio::time::timeout(timeout, fut)
            .await
            .map_err(|_| ForwardError::IdleTimeout {
                upstream: upstream.to_string(),
                timeout,
            })?,
        None => fut.await,
    }
}
