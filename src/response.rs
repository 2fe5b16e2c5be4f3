//! Outgoing HTTP response type, the [`IntoResponse`] conversion trait, and the
//! error envelope every middleware renders its failures with.
//!
//! Build a [`Response`] in your handler and return it. Middleware that
//! short-circuits a request (rate limit exceeded, panic, unresolvable peer)
//! uses [`Response::too_many_requests`] and [`Response::server_error`] so
//! every failure a caller sees has the same shape:
//!
//! ```json
//! {"error":{"status":429,"kind":"rate_limit_exceeded","message":"rate limit exceeded","retry_after":1}}
//! ```

use std::time::Duration;

use bytes::Bytes;
use http::header::{HeaderName, HeaderValue};
use http::StatusCode;
use http_body_util::Full;
use serde::Serialize;
use tracing::warn;

use crate::error::RequestError;

// ── Response ─────────────────────────────────────────────────────────────────

/// An outgoing HTTP response.
///
/// ```rust
/// use turnstile::Response;
/// use http::StatusCode;
///
/// Response::json(br#"{"id":1}"#.to_vec());
/// Response::text("hello");
/// Response::status(StatusCode::NO_CONTENT);
///
/// Response::builder()
///     .status(StatusCode::CREATED)
///     .header("location", "/tenants/42")
///     .json(br#"{"id":42}"#.to_vec());
/// ```
pub struct Response {
    pub(crate) body: Vec<u8>,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) status: StatusCode,
}

impl Response {
    /// `200 OK` — `application/json`.
    pub fn json(body: Vec<u8>) -> Self {
        Self::builder().json(body)
    }

    /// `200 OK` — `text/plain; charset=utf-8`.
    pub fn text(body: impl Into<String>) -> Self {
        Self::builder().text(body)
    }

    /// Response with no body.
    pub fn status(code: StatusCode) -> Self {
        Self { body: Vec::new(), headers: Vec::new(), status: code }
    }

    /// Builder for responses that need a custom status or extra headers.
    pub fn builder() -> ResponseBuilder {
        ResponseBuilder { headers: Vec::new(), status: StatusCode::OK }
    }

    /// `500 Internal Server Error` envelope for a per-request failure.
    ///
    /// Only the error's kind reaches the client. Panic payloads and other
    /// details stay in the logs.
    pub fn server_error(err: &RequestError) -> Self {
        let envelope = Envelope::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            err.kind(),
            "the server encountered a problem and could not process your request",
        );
        envelope.render(Self::builder().status(StatusCode::INTERNAL_SERVER_ERROR))
    }

    /// `429 Too Many Requests` envelope.
    ///
    /// With `retry_after`, also sets `Retry-After` in whole seconds, rounded
    /// up and never below one.
    pub fn too_many_requests(retry_after: Option<Duration>) -> Self {
        let mut envelope = Envelope::new(
            StatusCode::TOO_MANY_REQUESTS,
            "rate_limit_exceeded",
            "rate limit exceeded",
        );
        let mut builder = Self::builder().status(StatusCode::TOO_MANY_REQUESTS);

        if let Some(wait) = retry_after {
            let secs = retry_after_secs(wait);
            envelope.error.retry_after = Some(secs);
            builder = builder.header("retry-after", &secs.to_string());
        }

        envelope.render(builder)
    }

    pub fn status_code(&self) -> StatusCode { self.status }

    pub fn body(&self) -> &[u8] { &self.body }

    /// First value of header `name` (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Sets header `name`, replacing any previous value.
    pub fn set_header(&mut self, name: &str, value: &str) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((name.to_owned(), value.to_owned()));
    }

    /// Converts into the hyper-facing response.
    ///
    /// Header pairs that are not valid HTTP are dropped with a warning rather
    /// than failing the whole response.
    pub(crate) fn into_inner(self) -> http::Response<Full<Bytes>> {
        let mut res = http::Response::new(Full::new(Bytes::from(self.body)));
        *res.status_mut() = self.status;

        for (name, value) in self.headers {
            match (HeaderName::try_from(name.as_str()), HeaderValue::try_from(value.as_str())) {
                (Ok(name), Ok(value)) => {
                    res.headers_mut().append(name, value);
                }
                _ => warn!(header = %name, "dropping invalid response header"),
            }
        }

        res
    }
}

fn retry_after_secs(wait: Duration) -> u64 {
    let secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
    secs.max(1)
}

// ── Error envelope ───────────────────────────────────────────────────────────

#[derive(Serialize)]
struct Envelope {
    error: EnvelopeBody,
}

#[derive(Serialize)]
struct EnvelopeBody {
    status: u16,
    kind: &'static str,
    message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    retry_after: Option<u64>,
}

impl Envelope {
    fn new(status: StatusCode, kind: &'static str, message: &'static str) -> Self {
        Self {
            error: EnvelopeBody { status: status.as_u16(), kind, message, retry_after: None },
        }
    }

    fn render(&self, builder: ResponseBuilder) -> Response {
        match serde_json::to_vec(self) {
            Ok(bytes) => builder.json(bytes),
            Err(e) => {
                warn!("failed to serialise error envelope: {e}");
                builder.no_body()
            }
        }
    }
}

// ── ResponseBuilder ───────────────────────────────────────────────────────────

/// Fluent builder for [`Response`].
///
/// Obtain via [`Response::builder()`]. Defaults to `200 OK`.
/// Terminated by a typed body method.
pub struct ResponseBuilder {
    headers: Vec<(String, String)>,
    status: StatusCode,
}

impl ResponseBuilder {
    pub fn status(mut self, code: StatusCode) -> Self {
        self.status = code;
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_owned(), value.to_owned()));
        self
    }

    /// Terminate with a JSON body (`application/json`).
    pub fn json(self, body: Vec<u8>) -> Response {
        self.finish("application/json", body)
    }

    /// Terminate with a plain-text body (`text/plain; charset=utf-8`).
    pub fn text(self, body: impl Into<String>) -> Response {
        self.finish("text/plain; charset=utf-8", body.into().into_bytes())
    }

    /// Terminate with no body.
    pub fn no_body(self) -> Response {
        Response { body: Vec::new(), headers: self.headers, status: self.status }
    }

    fn finish(self, content_type: &str, body: Vec<u8>) -> Response {
        let mut headers = vec![("content-type".to_owned(), content_type.to_owned())];
        headers.extend(self.headers);
        Response { body, headers, status: self.status }
    }
}

// ── IntoResponse ──────────────────────────────────────────────────────────────

/// Conversion into an HTTP [`Response`].
///
/// Implement on your own types to return them directly from handlers.
pub trait IntoResponse {
    fn into_response(self) -> Response;
}

impl IntoResponse for Response {
    fn into_response(self) -> Response { self }
}

impl IntoResponse for &'static str {
    fn into_response(self) -> Response { Response::text(self) }
}

impl IntoResponse for String {
    fn into_response(self) -> Response { Response::text(self) }
}

/// Return a bare status from a handler: `return StatusCode::NOT_FOUND`
impl IntoResponse for StatusCode {
    fn into_response(self) -> Response { Response::status(self) }
}
