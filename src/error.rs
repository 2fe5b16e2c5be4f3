//! Error types.
//!
//! Three layers, three types:
//!
//! - [`Error`] — infrastructure failures that stop the process from serving:
//!   binding a port, invalid configuration at startup.
//! - [`ConfigError`] — a configuration value that cannot be used. Always fatal.
//! - [`RequestError`] — a failure scoped to a single request. Always resolved
//!   at the middleware boundary and rendered as a `500`; it never propagates
//!   past the outermost wrapper.
//!
//! Admission denial by the rate limiter is not an error at all. It is an
//! ordinary `429` response.

use thiserror::Error;

/// The error type returned by turnstile's fallible operations.
///
/// Application-level errors (404, 422, etc.) are expressed as HTTP
/// [`Response`](crate::Response) values, not as `Error`s.
#[derive(Debug, Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("config: {0}")]
    Config(#[from] ConfigError),
}

/// A configuration value that cannot be used.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("rate must be a finite number greater than zero, got {0}")]
    NonPositiveRate(f64),

    #[error("burst must be greater than zero")]
    ZeroBurst,

    #[error("{key} must be greater than zero")]
    ZeroDuration { key: &'static str },

    #[error("{key} must be at most {max_secs} seconds")]
    DurationTooLong { key: &'static str, max_secs: u64 },
}

/// A failure scoped to one request.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RequestError {
    /// The handler chain panicked. Holds the rendered panic payload, which is
    /// logged but never sent to the client.
    #[error("panic: {0}")]
    Panic(String),

    /// The caller's network address could not be resolved into a client
    /// identity.
    #[error("could not resolve remote address")]
    RemoteAddress,
}

impl RequestError {
    /// Machine-readable error kind, as rendered in the response envelope.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Panic(_) => "panic",
            Self::RemoteAddress => "remote_address",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_error_kinds() {
        assert_eq!(RequestError::Panic("boom".into()).kind(), "panic");
        assert_eq!(RequestError::RemoteAddress.kind(), "remote_address");
    }

    #[test]
    fn config_error_converts_into_error() {
        let err: Error = ConfigError::ZeroBurst.into();
        assert!(matches!(err, Error::Config(ConfigError::ZeroBurst)));
        assert_eq!(err.to_string(), "config: burst must be greater than zero");
    }

    #[test]
    fn duration_too_long_names_the_limit() {
        let err = ConfigError::DurationTooLong { key: "SWEEP", max_secs: 60 };
        assert_eq!(err.to_string(), "SWEEP must be at most 60 seconds");
    }
}
