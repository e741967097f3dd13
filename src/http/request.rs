//! Inbound and outbound request model.
//!
//! # Design Decisions
//! - Headers are normalized once on arrival (last write wins on duplicates)
//! - The inbound request is never mutated; the rewriter builds a fresh
//!   outbound copy so a retry always starts from the original
//! - Bodies are held as `Bytes` so every attempt replays the same payload

use std::net::SocketAddr;

use axum::body::Body;
use axum::http::{request::Parts, HeaderMap, Method, Request, Uri, Version};
use hyper::body::Bytes;

use crate::http::headers::strip_hop_by_hop;

/// A request as received from the client.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub method: Method,
    pub uri: Uri,
    pub version: Version,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// Transport-level peer, never taken from headers.
    pub peer: SocketAddr,
}

impl InboundRequest {
    pub fn new(method: Method, uri: Uri, headers: &HeaderMap, body: Bytes, peer: SocketAddr) -> Self {
        Self {
            method,
            uri,
            version: Version::HTTP_11,
            headers: collapse_duplicates(headers),
            body,
            peer,
        }
    }

    pub fn from_parts(parts: Parts, body: Bytes, peer: SocketAddr) -> Self {
        let mut inbound = Self::new(parts.method, parts.uri, &parts.headers, body, peer);
        inbound.version = parts.version;
        inbound
    }

    /// Path plus query, as sent upstream.
    pub fn path_and_query(&self) -> &str {
        self.uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/")
    }
}

/// A request ready to be sent to an upstream.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: Method,
    /// Origin-form target (path and query only).
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl OutboundRequest {
    /// Build a fresh HTTP/1.1 request for one attempt.
    ///
    /// Hop-by-hop headers belong to the client connection and are dropped.
    pub fn to_request(&self) -> Request<Body> {
        let mut headers = self.headers.clone();
        strip_hop_by_hop(&mut headers);

        let mut request = Request::new(Body::from(self.body.clone()));
        *request.method_mut() = self.method.clone();
        *request.uri_mut() = self.uri.clone();
        *request.version_mut() = Version::HTTP_11;
        *request.headers_mut() = headers;
        request
    }
}

/// Keep only the last value for every header name.
fn collapse_duplicates(headers: &HeaderMap) -> HeaderMap {
    let mut collapsed = HeaderMap::with_capacity(headers.keys_len());
    for (name, value) in headers {
        collapsed.insert(name.clone(), value.clone());
    }
    collapsed
}
