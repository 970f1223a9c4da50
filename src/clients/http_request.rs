//! Request descriptor types.
//!
//! This module provides [`RequestDescriptor`], the value that flows through
//! the interceptor pipeline into the transport, its builder, and
//! [`RequestOptions`], the per-call settings accepted by the verb methods on
//! [`HttpClient`](crate::HttpClient).

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::clients::errors::InvalidRequestError;
use crate::clients::interceptor::{Interceptor, InterceptorSet};

/// HTTP methods supported by the client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    /// HTTP GET method.
    Get,
    /// HTTP POST method.
    Post,
    /// HTTP PUT method.
    Put,
    /// HTTP DELETE method.
    Delete,
    /// HTTP PATCH method.
    Patch,
}

impl HttpMethod {
    /// Returns the canonical upper-case method name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => Self::GET,
            HttpMethod::Post => Self::POST,
            HttpMethod::Put => Self::PUT,
            HttpMethod::Delete => Self::DELETE,
            HttpMethod::Patch => Self::PATCH,
        }
    }
}

/// Per-call options accepted by the verb methods of
/// [`HttpClient`](crate::HttpClient).
///
/// Unset retry values fall back to the client configuration.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use request_layer::RequestOptions;
///
/// let options = RequestOptions::new()
///     .query_param("id", "1")
///     .header("X-Trace", "abc")
///     .retry(2)
///     .retry_delay(Duration::from_millis(50))
///     .cancelable(false);
///
/// assert_eq!(options.retry, Some(2));
/// assert!(!options.cancelable);
/// ```
#[derive(Clone, Debug)]
pub struct RequestOptions {
    /// Query parameters to append to the URL.
    pub query: BTreeMap<String, String>,
    /// Headers for this call, overriding client defaults.
    pub headers: HashMap<String, String>,
    /// Number of retries after the first attempt.
    pub retry: Option<u32>,
    /// Fixed delay between attempts.
    pub retry_delay: Option<Duration>,
    /// Whether a newer identical request may cancel this one (default: `true`).
    pub cancelable: bool,
    /// Whether GET requests receive a cache-busting parameter (default: `true`).
    pub cache_bust: bool,
    /// Interceptors that apply to this call only.
    pub interceptors: InterceptorSet,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            query: BTreeMap::new(),
            headers: HashMap::new(),
            retry: None,
            retry_delay: None,
            cancelable: true,
            cache_bust: true,
            interceptors: InterceptorSet::new(),
        }
    }
}

impl RequestOptions {
    /// Creates options with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a single query parameter.
    #[must_use]
    pub fn query_param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.insert(key.into(), value.to_string());
        self
    }

    /// Adds a single header.
    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Sets the number of retries after the first attempt.
    #[must_use]
    pub const fn retry(mut self, retries: u32) -> Self {
        self.retry = Some(retries);
        self
    }

    /// Sets the fixed delay between attempts.
    #[must_use]
    pub const fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = Some(delay);
        self
    }

    /// Sets whether a newer identical request may cancel this one.
    #[must_use]
    pub const fn cancelable(mut self, cancelable: bool) -> Self {
        self.cancelable = cancelable;
        self
    }

    /// Sets whether a GET request receives the cache-busting parameter.
    #[must_use]
    pub const fn cache_bust(mut self, cache_bust: bool) -> Self {
        self.cache_bust = cache_bust;
        self
    }

    /// Adds a call-scope interceptor.
    #[must_use]
    pub fn interceptor(mut self, interceptor: impl Interceptor + 'static) -> Self {
        self.interceptors.push(Arc::new(interceptor));
        self
    }
}

/// A request on its way through the pipeline.
///
/// Request interceptors receive the descriptor by value and return the
/// (possibly modified) descriptor that the next stage sees. The transport
/// only ever receives the final value.
#[derive(Clone, Debug)]
pub struct RequestDescriptor {
    /// The HTTP method.
    pub method: HttpMethod,
    /// Absolute URL, or a path relative to the client base URL.
    pub url: String,
    /// Query parameters.
    pub query: BTreeMap<String, String>,
    /// The JSON request body, if any.
    pub body: Option<serde_json::Value>,
    /// Request headers.
    pub headers: HashMap<String, String>,
    /// Number of retries after the first attempt (client default when `None`).
    pub retry: Option<u32>,
    /// Fixed delay between attempts (client default when `None`).
    pub retry_delay: Option<Duration>,
    /// Whether a newer identical request may cancel this one.
    pub cancelable: bool,
    /// Whether a GET request receives the cache-busting parameter.
    pub cache_bust: bool,
    /// Call-scope interceptors.
    pub interceptors: InterceptorSet,
}

impl RequestDescriptor {
    /// Creates a new builder for the given method and URL.
    ///
    /// # Example
    ///
    /// ```rust
    /// use request_layer::{HttpMethod, RequestDescriptor};
    /// use serde_json::json;
    ///
    /// let request = RequestDescriptor::builder(HttpMethod::Post, "/users")
    ///     .body(json!({"name": "Ada"}))
    ///     .retry(1)
    ///     .build()
    ///     .unwrap();
    ///
    /// assert_eq!(request.method, HttpMethod::Post);
    /// assert!(request.cancelable);
    /// ```
    #[must_use]
    pub fn builder(method: HttpMethod, url: impl Into<String>) -> RequestDescriptorBuilder {
        RequestDescriptorBuilder::new(method, url)
    }

    /// Creates a descriptor from a verb call.
    #[must_use]
    pub fn from_options(
        method: HttpMethod,
        url: impl Into<String>,
        body: Option<serde_json::Value>,
        options: RequestOptions,
    ) -> Self {
        Self {
            method,
            url: url.into(),
            query: options.query,
            body,
            headers: options.headers,
            retry: options.retry,
            retry_delay: options.retry_delay,
            cancelable: options.cancelable,
            cache_bust: options.cache_bust,
            interceptors: options.interceptors,
        }
    }

    /// Validates the request.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidRequestError`] if the URL is empty or a header cannot
    /// be sent over HTTP.
    pub fn verify(&self) -> Result<(), InvalidRequestError> {
        if self.url.trim().is_empty() {
            return Err(InvalidRequestError::EmptyUrl);
        }

        for (name, value) in &self.headers {
            let valid = reqwest::header::HeaderName::from_bytes(name.as_bytes()).is_ok()
                && reqwest::header::HeaderValue::from_str(value).is_ok();
            if !valid {
                return Err(InvalidRequestError::InvalidHeader { name: name.clone() });
            }
        }

        Ok(())
    }
}

/// Builder for constructing [`RequestDescriptor`] instances.
#[derive(Debug)]
pub struct RequestDescriptorBuilder {
    method: HttpMethod,
    url: String,
    body: Option<serde_json::Value>,
    options: RequestOptions,
}

impl RequestDescriptorBuilder {
    fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            body: None,
            options: RequestOptions::default(),
        }
    }

    /// Sets the JSON request body.
    #[must_use]
    pub fn body(mut self, body: impl Into<serde_json::Value>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Adds a single query parameter.
    #[must_use]
    pub fn query_param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.options = self.options.query_param(key, value);
        self
    }

    /// Adds a single header.
    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options = self.options.header(key, value);
        self
    }

    /// Sets the number of retries after the first attempt.
    #[must_use]
    pub fn retry(mut self, retries: u32) -> Self {
        self.options = self.options.retry(retries);
        self
    }

    /// Sets the fixed delay between attempts.
    #[must_use]
    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.options = self.options.retry_delay(delay);
        self
    }

    /// Sets whether a newer identical request may cancel this one.
    #[must_use]
    pub fn cancelable(mut self, cancelable: bool) -> Self {
        self.options = self.options.cancelable(cancelable);
        self
    }

    /// Sets whether a GET request receives the cache-busting parameter.
    #[must_use]
    pub fn cache_bust(mut self, cache_bust: bool) -> Self {
        self.options = self.options.cache_bust(cache_bust);
        self
    }

    /// Replaces all per-call options at once.
    #[must_use]
    pub fn options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }

    /// Adds a call-scope interceptor.
    #[must_use]
    pub fn interceptor(mut self, interceptor: impl Interceptor + 'static) -> Self {
        self.options = self.options.interceptor(interceptor);
        self
    }

    /// Builds the [`RequestDescriptor`], validating it in the process.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidRequestError`] if the request fails validation.
    pub fn build(self) -> Result<RequestDescriptor, InvalidRequestError> {
        let request = RequestDescriptor::from_options(self.method, self.url, self.body, self.options);
        request.verify()?;
        Ok(request)
    }
}
