//! Configuration error types.
//!
//! Building a [`ClientConfig`](crate::ClientConfig) validates every value up
//! front so that a client never starts with a base URL, timeout or default
//! header that the transport would reject later.
//!
//! # Example
//!
//! ```rust
//! use request_layer::{BaseUrl, ConfigError};
//!
//! let result = BaseUrl::new("not a url");
//! assert!(matches!(result, Err(ConfigError::InvalidBaseUrl { .. })));
//! ```

use thiserror::Error;

/// Errors that can occur while configuring a client.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The base URL is not an absolute `http` or `https` URL.
    #[error("Invalid base URL '{url}'. Expected an absolute http(s) URL (e.g., 'https://api.example.com').")]
    InvalidBaseUrl {
        /// The invalid URL that was provided.
        url: String,
    },

    /// The timeout must be greater than zero.
    #[error("Invalid timeout. The request timeout must be greater than zero.")]
    InvalidTimeout,

    /// A default header name or value cannot be sent over HTTP.
    #[error("Invalid default header '{name}'. Header names must be valid tokens and values must be visible ASCII.")]
    InvalidHeader {
        /// The offending header name.
        name: String,
    },

    /// A required field is missing.
    #[error("Missing required field: '{field}'. This field must be set before building the configuration.")]
    MissingRequiredField {
        /// The name of the missing field.
        field: &'static str,
    },

    /// The underlying HTTP transport could not be created.
    #[error("Failed to initialize HTTP transport: {message}")]
    TransportInit {
        /// Description of the initialization failure.
        message: String,
    },
}
