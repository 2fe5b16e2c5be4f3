//! Incoming HTTP request type.

use std::net::SocketAddr;

use bytes::Bytes;
use http::{Extensions, HeaderMap, Method, Uri};

use crate::middleware::trace::RequestId;

/// An incoming HTTP request with its body already collected.
///
/// Besides the wire-level parts, a request carries a typed context
/// ([`extensions`](Request::extensions)) that middleware uses to hand values
/// down the chain. The correlation [`RequestId`] lives there.
pub struct Request {
    pub(crate) method: Method,
    pub(crate) uri: Uri,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Bytes,
    pub(crate) extensions: Extensions,
    pub(crate) remote_addr: Option<SocketAddr>,
}

impl Request {
    /// Builds a request from an [`http::Request`] and the peer it came from.
    ///
    /// The server does this for every connection; tests and embedders can do
    /// it directly to drive a [`Chain`](crate::middleware::Chain) in-process.
    /// Pass `None` for `remote_addr` when the request did not arrive over TCP.
    pub fn from_http(req: http::Request<Bytes>, remote_addr: Option<SocketAddr>) -> Self {
        let (parts, body) = req.into_parts();
        Self {
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            body,
            extensions: parts.extensions,
            remote_addr,
        }
    }

    pub fn method(&self) -> &Method { &self.method }
    pub fn uri(&self) -> &Uri { &self.uri }
    pub fn path(&self) -> &str { self.uri.path() }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn body(&self) -> &[u8] { &self.body }

    /// Transport-level address of the caller, if the request came over TCP.
    pub fn remote_addr(&self) -> Option<SocketAddr> { self.remote_addr }

    /// Case-insensitive header lookup. Returns `None` for values that are not
    /// visible ASCII.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Request-scoped context values.
    pub fn extensions(&self) -> &Extensions { &self.extensions }

    pub fn extensions_mut(&mut self) -> &mut Extensions { &mut self.extensions }

    /// The correlation identifier attached by
    /// [`Trace`](crate::middleware::trace::Trace), if that middleware ran.
    pub fn request_id(&self) -> Option<&RequestId> {
        self.extensions.get::<RequestId>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_lookup_is_case_insensitive() {
        let req = http::Request::builder()
            .uri("/tenants?page=2")
            .header("X-Request-ID", "abc123")
            .body(Bytes::new())
            .unwrap();
        let req = Request::from_http(req, None);

        assert_eq!(req.header("x-request-id"), Some("abc123"));
        assert_eq!(req.path(), "/tenants");
        assert_eq!(req.uri().query(), Some("page=2"));
        assert!(req.remote_addr().is_none());
        assert!(req.request_id().is_none());
    }
}
