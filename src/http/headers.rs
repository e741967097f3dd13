//! Header rewriting for forwarded requests.
//!
//! # Responsibilities
//! - Pass `Host` through so upstreams can do virtual hosting
//! - Set `X-Real-IP` from the transport peer, never from the client
//! - Propagate `X-User-ID` verbatim when present, omit it otherwise
//! - Strip hop-by-hop headers at connection boundaries
//!
//! # Trust boundary
//! `X-User-ID` is forwarded without any verification. It is only meaningful
//! when the proxy is reachable solely from a trusted network position; a
//! client talking to the proxy directly can assert any identity.

use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};

use crate::http::request::{InboundRequest, OutboundRequest};

pub const X_REAL_IP: HeaderName = HeaderName::from_static("x-real-ip");
pub const X_USER_ID: HeaderName = HeaderName::from_static("x-user-id");

const HOP_BY_HOP: [HeaderName; 7] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    HeaderName::from_static("proxy-connection"),
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Derive the outbound request from an inbound one.
///
/// Steps run in order and later steps overwrite earlier values:
/// `Host`, then `X-Real-IP`, then `X-User-ID`. Everything else is copied
/// unchanged.
pub fn rewrite(inbound: &InboundRequest) -> OutboundRequest {
    let mut headers = inbound.headers.clone();

    // 1. Host: pass-through, falling back to the request-target authority.
    let host = inbound.headers.get(header::HOST).cloned().or_else(|| {
        inbound
            .uri
            .authority()
            .and_then(|authority| HeaderValue::from_str(authority.as_str()).ok())
    });
    match host {
        Some(host) => {
            headers.insert(header::HOST, host);
        }
        None => {
            headers.remove(header::HOST);
        }
    }

    // 2. X-Real-IP: always the transport peer.
    let peer_ip = inbound.peer.ip().to_canonical().to_string();
    match HeaderValue::from_str(&peer_ip) {
        Ok(value) => {
            headers.insert(X_REAL_IP, value);
        }
        Err(_) => {
            headers.remove(X_REAL_IP);
        }
    }

    // 3. X-User-ID: copied if present, never synthesized.
    match inbound.headers.get(X_USER_ID) {
        Some(user) => {
            headers.insert(X_USER_ID, user.clone());
        }
        None => {
            headers.remove(X_USER_ID);
        }
    }

    OutboundRequest {
        method: inbound.method.clone(),
        uri: inbound
            .path_and_query()
            .parse()
            .unwrap_or_else(|_| axum::http::Uri::from_static("/")),
        headers,
        body: inbound.body.clone(),
    }
}

/// Remove headers that only describe the current connection.
///
/// Names listed in `Connection` are removed as well.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in listed.iter().chain(HOP_BY_HOP.iter()) {
        headers.remove(name);
    }
}
