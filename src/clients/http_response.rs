//! Response types.
//!
//! [`RawResponse`] is what a transport produces for a successful exchange and
//! what response interceptors transform. [`ResponseEnvelope`] is the uniform
//! tagged result handed to collaborators that prefer a value over a `Result`.

use std::collections::HashMap;

use serde::Serialize;

use crate::clients::errors::{ErrorKind, RequestError};

/// A response received from the transport.
#[derive(Clone, Debug, PartialEq)]
pub struct RawResponse {
    /// The HTTP status code.
    pub status: u16,
    /// Response headers, keyed by lower-case name (headers may repeat).
    pub headers: HashMap<String, Vec<String>>,
    /// The decoded body.
    ///
    /// Empty bodies decode to `null` and bodies that are not JSON are kept
    /// as a JSON string.
    pub body: serde_json::Value,
}

impl RawResponse {
    /// Creates a new response.
    #[must_use]
    pub fn new(status: u16, headers: HashMap<String, Vec<String>>, body: serde_json::Value) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Creates a `200` response with no headers, mostly useful for
    /// interceptors that synthesize a fallback value.
    #[must_use]
    pub fn ok(body: serde_json::Value) -> Self {
        Self::new(200, HashMap::new(), body)
    }

    /// Returns `true` if the status code is in the 2xx range.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        self.status >= 200 && self.status <= 299
    }

    /// Returns the first value of the named header (case-insensitive).
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// Returns the `X-Request-Id` header value, if present.
    #[must_use]
    pub fn request_id(&self) -> Option<&str> {
        self.header("x-request-id")
    }

    /// Decodes a body received as text.
    #[must_use]
    pub fn decode_body(text: &str) -> serde_json::Value {
        if text.trim().is_empty() {
            return serde_json::Value::Null;
        }
        serde_json::from_str(text).unwrap_or_else(|_| serde_json::Value::String(text.to_string()))
    }
}

/// Uniform result shape for a finished call.
///
/// Serializes to `{"status": "success", "payload": ...}` or
/// `{"status": "failure", "errorKind": ..., "detail": ...}`.
///
/// # Example
///
/// ```rust
/// use request_layer::{RequestError, ResponseEnvelope};
/// use serde_json::json;
///
/// let envelope = ResponseEnvelope::from_result(Err(RequestError::Cancelled {
///     reason: "bulk cancellation".to_string(),
/// }));
///
/// assert_eq!(
///     serde_json::to_value(&envelope).unwrap(),
///     json!({
///         "status": "failure",
///         "errorKind": "cancelled",
///         "detail": "Request cancelled: bulk cancellation"
///     })
/// );
/// ```
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ResponseEnvelope {
    /// The call resolved with a payload.
    Success {
        /// The response payload.
        payload: serde_json::Value,
    },
    /// The call failed.
    Failure {
        /// Classification of the failure.
        #[serde(rename = "errorKind")]
        kind: ErrorKind,
        /// Human-readable description of the failure.
        detail: String,
    },
}

impl ResponseEnvelope {
    /// Wraps the outcome of a call.
    #[must_use]
    pub fn from_result(result: Result<serde_json::Value, RequestError>) -> Self {
        match result {
            Ok(payload) => Self::Success { payload },
            Err(error) => Self::Failure {
                kind: error.kind(),
                detail: error.to_string(),
            },
        }
    }

    /// Returns `true` for [`ResponseEnvelope::Success`].
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Returns the payload of a successful call.
    #[must_use]
    pub const fn payload(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Success { payload } => Some(payload),
            Self::Failure { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_is_ok_for_2xx_only() {
        assert!(RawResponse::new(200, HashMap::new(), json!({})).is_ok());
        assert!(RawResponse::new(204, HashMap::new(), json!(null)).is_ok());
        assert!(!RawResponse::new(301, HashMap::new(), json!(null)).is_ok());
        assert!(!RawResponse::new(404, HashMap::new(), json!(null)).is_ok());
        assert!(!RawResponse::new(500, HashMap::new(), json!(null)).is_ok());
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let mut headers = HashMap::new();
        headers.insert("x-request-id".to_string(), vec!["abc-123".to_string()]);

        let response = RawResponse::new(200, headers, json!({}));
        assert_eq!(response.header("X-Request-Id"), Some("abc-123"));
        assert_eq!(response.request_id(), Some("abc-123"));
        assert_eq!(response.header("etag"), None);
    }

    #[test]
    fn test_decode_body() {
        assert_eq!(RawResponse::decode_body(""), json!(null));
        assert_eq!(RawResponse::decode_body("{\"id\":1}"), json!({"id": 1}));
        assert_eq!(RawResponse::decode_body("plain text"), json!("plain text"));
    }

    #[test]
    fn test_success_envelope_serialization() {
        let envelope = ResponseEnvelope::from_result(Ok(json!({"id": 7})));
        assert!(envelope.is_success());
        assert_eq!(envelope.payload(), Some(&json!({"id": 7})));
        assert_eq!(
            serde_json::to_value(&envelope).unwrap(),
            json!({"status": "success", "payload": {"id": 7}})
        );
    }

    #[test]
    fn test_failure_envelope_carries_kind_and_detail() {
        let envelope = ResponseEnvelope::from_result(Err(RequestError::HttpStatus {
            status: 404,
            body: json!({"error": "missing"}),
        }));

        assert!(!envelope.is_success());
        assert!(envelope.payload().is_none());
        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(value["status"], json!("failure"));
        assert_eq!(value["errorKind"], json!("http_status"));
        assert_eq!(value["detail"], json!("Request failed with status 404"));
    }
}
