//! Error types for the hub
//!
//! The `Error` enum covers every failure mode the subscribe/publish pipeline
//! can produce, from JWT verification failures to transport backpressure.
//! It maps onto HTTP responses via [`Error::status_code`] and
//! [`Error::client_message`]; internals never leak into the response body.

use thiserror::Error;

/// Result type used throughout the hub crates.
pub type Result<T> = std::result::Result<T, Error>;

/// Application-level error type for the hub.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// The request could not be authenticated or authorized.
    ///
    /// Covers missing tokens, malformed tokens, `alg=none`, expired tokens,
    /// and malformed `mercure.subscribe`/`mercure.publish` claims. The
    /// underlying JWT failure is never included in the client-facing
    /// message.
    #[error("unauthorized")]
    AuthFailure,

    /// The request is missing the required `topic` query parameter.
    #[error("missing topic parameter")]
    MissingTopic,

    /// The transport refused to register a new subscriber.
    #[error("transport unavailable")]
    TransportUnavailable,

    /// The transport has been closed and can no longer be used.
    #[error("transport closed")]
    TransportClosed,

    /// The HTTP response writer does not support incremental flushing.
    ///
    /// This is a programmer/deployment error, not a client error: SSE
    /// cannot work behind a non-streaming response body.
    #[error("response writer does not support flushing")]
    ResponseWriterNotFlushable,

    /// A topic selector could not be parsed as an exact IRI or URI Template.
    #[error("invalid topic selector: {0}")]
    InvalidSelector(String),

    /// Serialization or deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Durable storage I/O error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Low-level I/O error.
    #[error("IO error: {0}")]
    Io(String),

    /// Unexpected internal error. Used sparingly; prefer a specific variant.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// The HTTP status code this error maps onto.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::AuthFailure => 401,
            Error::MissingTopic => 400,
            Error::TransportUnavailable => 503,
            Error::TransportClosed => 503,
            Error::ResponseWriterNotFlushable => 500,
            Error::InvalidSelector(_) => 400,
            Error::Serialization(_) | Error::Storage(_) | Error::Io(_) | Error::Internal(_) => 500,
        }
    }

    /// The exact plain-text body sent to the client for this error.
    ///
    /// Deliberately terse: no JWT internals, no storage backend details.
    pub fn client_message(&self) -> String {
        match self {
            Error::MissingTopic => "Missing \"topic\" parameter.\n".to_string(),
            Error::AuthFailure => "Unauthorized\n".to_string(),
            Error::TransportUnavailable | Error::TransportClosed => {
                "Service Unavailable\n".to_string()
            }
            _ => "Internal Server Error\n".to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}

impl From<sled::Error> for Error {
    fn from(e: sled::Error) -> Self {
        Error::Storage(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_failure_maps_to_401_with_no_leakage() {
        let err = Error::AuthFailure;
        assert_eq!(err.status_code(), 401);
        assert_eq!(err.client_message(), "Unauthorized\n");
    }

    #[test]
    fn missing_topic_maps_to_400_with_exact_body() {
        let err = Error::MissingTopic;
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.client_message(), "Missing \"topic\" parameter.\n");
    }

    #[test]
    fn transport_unavailable_maps_to_503() {
        assert_eq!(Error::TransportUnavailable.status_code(), 503);
        assert_eq!(Error::TransportClosed.status_code(), 503);
    }

    #[test]
    fn internal_errors_never_echo_details_to_client() {
        let err = Error::Storage("sled: corrupt page 42".to_string());
        assert_eq!(err.status_code(), 500);
        assert_eq!(err.client_message(), "Internal Server Error\n");
        assert!(!err.client_message().contains("corrupt page"));
    }

    #[test]
    fn io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "nope");
        let err: Error = io.into();
        matches!(err, Error::Io(_));
    }
}
