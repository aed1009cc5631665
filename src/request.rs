use std::net::SocketAddr;

use axum::extract::ConnectInfo;
use axum::http::{request::Parts, HeaderMap, Method, Uri};

/// Metadata of the HTTP request that opened a live connection.
///
/// Captured once per connection and handed to any handler that asks for it.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    /// Peer address, when the server was started with connect info.
    pub remote_addr: Option<SocketAddr>,
}

impl RequestContext {
    pub fn from_parts(parts: &Parts) -> Self {
        Self {
            method: parts.method.clone(),
            uri: parts.uri.clone(),
            headers: parts.headers.clone(),
            remote_addr: parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| *addr),
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}
