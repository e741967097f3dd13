//! Response handling.
//!
//! # Responsibilities
//! - Map forwarding failures to client-visible gateway errors
//! - Clean upstream response heads before they reach the client
//!
//! # Design Decisions
//! - Exhausted retries surface as 502 Bad Gateway with an `X-Proxy-Error` code
//! - Upstream bodies are streamed, never buffered (see body.rs)

use axum::body::Body;
use axum::http::{header, HeaderValue, Response, StatusCode};
use axum::response::IntoResponse;

use crate::http::error::ForwardError;
use crate::http::headers::strip_hop_by_hop;

pub const X_PROXY_ERROR: &str = "x-proxy-error";

/// Status code the client sees for a failed request.
pub fn status_for(err: &ForwardError) -> StatusCode {
    match err {
        ForwardError::BodyTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        ForwardError::ClientBody(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::BAD_GATEWAY,
    }
}

/// Plain-text gateway error for a request that never reached streaming.
pub fn error_response(err: &ForwardError) -> Response<Body> {
    let status = status_for(err);
    let message = match err {
        ForwardError::BodyTooLarge { limit } => format!("Request body too large (limit {limit} bytes)"),
        ForwardError::ClientBody(_) => "Invalid request body".to_string(),
        _ => "Upstream request failed".to_string(),
    };

    let mut response = (status, message).into_response();
    response
        .headers_mut()
        .insert(X_PROXY_ERROR, HeaderValue::from_static(err.kind()));
    response
}

/// Drop connection-scoped headers from an upstream response head.
pub fn prepare_upstream_head(headers: &mut header::HeaderMap) {
    strip_hop_by_hop(headers);
}
