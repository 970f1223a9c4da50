//! Error types for the request pipeline.
//!
//! Every call made through [`HttpClient`](crate::HttpClient) either resolves
//! with a payload or fails with a [`RequestError`]. The error shape is stable
//! and inspectable through [`RequestError::kind`]:
//!
//! - [`RequestError::Cancelled`]: superseded by a duplicate or canceled in bulk
//! - [`RequestError::Network`]: no response was received (includes timeouts)
//! - [`RequestError::HttpStatus`]: a non-2xx response was received
//! - [`RequestError::Interceptor`]: an interceptor stage failed
//! - [`RequestError::RetriesExhausted`]: every configured attempt failed
//! - [`RequestError::InvalidRequest`]: the request could not be built
//!
//! # Example
//!
//! ```rust,ignore
//! use request_layer::{ErrorKind, RequestError};
//!
//! match client.get("/users", RequestOptions::new()).await {
//!     Ok(payload) => println!("users: {payload}"),
//!     Err(error) if error.is_cancellation() => { /* a newer request replaced this one */ }
//!     Err(RequestError::RetriesExhausted { attempts, source }) => {
//!         println!("gave up after {attempts} attempts: {source}");
//!     }
//!     Err(error) => println!("request failed ({:?}): {error}", error.kind()),
//! }
//! ```

use serde::Serialize;
use thiserror::Error;

/// Failure raised by an interceptor stage.
///
/// Returning this from [`Interceptor::on_request`](crate::Interceptor::on_request)
/// or [`Interceptor::on_response`](crate::Interceptor::on_response) short-circuits
/// the remaining value stages of that chain.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Interceptor failed: {message}")]
pub struct InterceptorError {
    /// Description of the failure.
    pub message: String,
}

impl InterceptorError {
    /// Creates a new interceptor error with the given message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Error returned when a request fails validation before it is sent.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InvalidRequestError {
    /// The request URL is empty.
    #[error("Cannot send a request without a URL.")]
    EmptyUrl,

    /// A header name or value cannot be sent over HTTP.
    #[error("Invalid header '{name}'.")]
    InvalidHeader {
        /// The offending header name.
        name: String,
    },

    /// The transport rejected the request while building it.
    #[error("Malformed request: {message}")]
    Malformed {
        /// Description reported by the transport.
        message: String,
    },
}

/// Error raised by a [`Transport`](crate::Transport) implementation.
///
/// Transports distinguish three outcomes: no response at all, a response
/// with a non-2xx status, and a cancellation observed through the
/// [`CancelToken`](crate::CancelToken).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TransportError {
    /// The server could not be reached or did not answer in time.
    #[error("Network error: {message}")]
    Network {
        /// Description of the failure.
        message: String,
        /// Whether the failure was the transport timeout.
        timeout: bool,
    },

    /// A response was received with a non-2xx status.
    #[error("HTTP status {status}")]
    Status {
        /// The HTTP status code.
        status: u16,
        /// The decoded response body.
        body: serde_json::Value,
    },

    /// The request was canceled before it completed.
    #[error("Request cancelled: {reason}")]
    Cancelled {
        /// Why the request was canceled.
        reason: String,
    },

    /// The request could not be built by the transport.
    #[error("Invalid request: {message}")]
    Invalid {
        /// Description of the problem.
        message: String,
    },
}

/// Unified error type for a request made through the client.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RequestError {
    /// The request was superseded by a duplicate or canceled in bulk.
    #[error("Request cancelled: {reason}")]
    Cancelled {
        /// Why the request was canceled.
        reason: String,
    },

    /// No response was received.
    #[error("Network error: {message}")]
    Network {
        /// Description of the failure.
        message: String,
        /// Whether the failure was the transport timeout.
        timeout: bool,
    },

    /// A response was received with a non-2xx status.
    #[error("Request failed with status {status}")]
    HttpStatus {
        /// The HTTP status code.
        status: u16,
        /// The decoded response body.
        body: serde_json::Value,
    },

    /// An interceptor stage failed.
    #[error(transparent)]
    Interceptor(#[from] InterceptorError),

    /// All configured attempts failed.
    #[error("Exceeded maximum retry count after {attempts} attempts. Last error: {source}")]
    RetriesExhausted {
        /// Number of attempts made, including the first.
        attempts: u32,
        /// The error of the final attempt.
        source: Box<RequestError>,
    },

    /// The request failed validation.
    #[error(transparent)]
    InvalidRequest(#[from] InvalidRequestError),
}

/// Classification of a [`RequestError`], used by envelopes and logs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// See [`RequestError::Cancelled`].
    Cancelled,
    /// See [`RequestError::Network`].
    Network,
    /// See [`RequestError::HttpStatus`].
    HttpStatus,
    /// See [`RequestError::Interceptor`].
    Interceptor,
    /// See [`RequestError::RetriesExhausted`].
    RetriesExhausted,
    /// See [`RequestError::InvalidRequest`].
    InvalidRequest,
}

impl RequestError {
    /// Returns the classification of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Cancelled { .. } => ErrorKind::Cancelled,
            Self::Network { .. } => ErrorKind::Network,
            Self::HttpStatus { .. } => ErrorKind::HttpStatus,
            Self::Interceptor(_) => ErrorKind::Interceptor,
            Self::RetriesExhausted { .. } => ErrorKind::RetriesExhausted,
            Self::InvalidRequest(_) => ErrorKind::InvalidRequest,
        }
    }

    /// Returns `true` if the request was canceled.
    #[must_use]
    pub const fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// Returns `true` if another attempt could succeed.
    ///
    /// Cancellations, interceptor failures and invalid requests fail the
    /// same way every time.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Self::Cancelled { .. } | Self::Interceptor(_) | Self::InvalidRequest(_)
        )
    }

    /// Returns the HTTP status of the underlying failure, if any.
    ///
    /// Looks through [`RequestError::RetriesExhausted`] to the last attempt.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status, .. } => Some(*status),
            Self::RetriesExhausted { source, .. } => source.status(),
            _ => None,
        }
    }

    /// Returns the innermost error, unwrapping retry exhaustion.
    #[must_use]
    pub fn root(&self) -> &Self {
        match self {
            Self::RetriesExhausted { source, .. } => source.root(),
            other => other,
        }
    }
}

impl From<TransportError> for RequestError {
    fn from(error: TransportError) -> Self {
        match error {
            TransportError::Network { message, timeout } => Self::Network { message, timeout },
            TransportError::Status { status, body } => Self::HttpStatus { status, body },
            TransportError::Cancelled { reason } => Self::Cancelled { reason },
            TransportError::Invalid { message } => {
                Self::InvalidRequest(InvalidRequestError::Malformed { message })
            }
        }
    }
}

/// Returns a short human-readable description for common failure statuses.
#[must_use]
pub const fn status_description(status: u16) -> Option<&'static str> {
    match status {
        401 => Some("unauthorized, please log in"),
        403 => Some("access denied"),
        404 => Some("requested resource does not exist"),
        500 => Some("internal server error"),
        _ => None,
    }
}
