//! Client configuration.
//!
//! [`ClientConfig`] holds everything a [`HttpClient`](crate::HttpClient)
//! needs at construction time: base URL, timeout, default headers, default
//! retry settings and the instance- and global-scope interceptors. It is
//! immutable once built.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use request_layer::{BaseUrl, ClientConfig};
//!
//! let config = ClientConfig::builder()
//!     .base_url(BaseUrl::new("https://api.example.com").unwrap())
//!     .timeout(Duration::from_secs(5))
//!     .retry(3)
//!     .retry_delay(Duration::from_secs(1))
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(config.retry(), 3);
//! ```

mod newtypes;

pub use newtypes::BaseUrl;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::clients::{
    GlobalInterceptors, Interceptor, InterceptorSet, RetryClassifier, RetryPolicy,
    DEFAULT_RETRY_DELAY,
};
use crate::error::ConfigError;

/// Default per-attempt timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Returns the headers sent with every request unless overridden.
#[must_use]
pub fn default_headers() -> HashMap<String, String> {
    HashMap::from([
        ("Content-Type".to_string(), "application/json".to_string()),
        ("Accept".to_string(), "application/json".to_string()),
    ])
}

/// Configuration for a [`HttpClient`](crate::HttpClient).
///
/// # Thread Safety
///
/// `ClientConfig` is `Clone`, `Send`, and `Sync`. Cloning keeps the
/// [`GlobalInterceptors`] registry shared.
#[derive(Clone)]
pub struct ClientConfig {
    base_url: BaseUrl,
    timeout: Duration,
    headers: HashMap<String, String>,
    retry: u32,
    retry_delay: Duration,
    interceptors: InterceptorSet,
    global_interceptors: GlobalInterceptors,
    retry_classifier: Option<Arc<dyn RetryClassifier>>,
}

impl ClientConfig {
    /// Creates a new builder.
    #[must_use]
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::new()
    }

    /// Returns the base URL.
    #[must_use]
    pub const fn base_url(&self) -> &BaseUrl {
        &self.base_url
    }

    /// Returns the per-attempt timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns the default headers.
    #[must_use]
    pub const fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Returns the default number of retries.
    #[must_use]
    pub const fn retry(&self) -> u32 {
        self.retry
    }

    /// Returns the default delay between attempts.
    #[must_use]
    pub const fn retry_delay(&self) -> Duration {
        self.retry_delay
    }

    /// Returns the instance-scope interceptors.
    #[must_use]
    pub const fn interceptors(&self) -> &InterceptorSet {
        &self.interceptors
    }

    /// Returns the global-scope interceptor registry.
    #[must_use]
    pub const fn global_interceptors(&self) -> &GlobalInterceptors {
        &self.global_interceptors
    }

    /// Returns the default retry policy for calls made with this config.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        let policy = RetryPolicy::new(self.retry, self.retry_delay);
        match &self.retry_classifier {
            Some(classifier) => policy.with_classifier(Arc::clone(classifier)),
            None => policy,
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("headers", &self.headers)
            .field("retry", &self.retry)
            .field("retry_delay", &self.retry_delay)
            .field("interceptors", &self.interceptors)
            .field("global_interceptors", &self.global_interceptors)
            .field("retry_classifier", &self.retry_classifier.is_some())
            .finish()
    }
}

// Verify ClientConfig is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<ClientConfig>();
};

/// Builder for constructing [`ClientConfig`] instances.
///
/// `base_url` is required. All other fields have defaults:
///
/// - `timeout`: 10 seconds
/// - `headers`: `Content-Type` and `Accept` set to `application/json`
/// - `retry`: 0 (no retries)
/// - `retry_delay`: 300 milliseconds
/// - `interceptors`: none
/// - `global_interceptors`: a fresh, unshared registry
/// - `retry_classifier`: none (every network or status failure is retried)
#[derive(Default)]
pub struct ClientConfigBuilder {
    base_url: Option<BaseUrl>,
    timeout: Option<Duration>,
    headers: Option<HashMap<String, String>>,
    retry: Option<u32>,
    retry_delay: Option<Duration>,
    interceptors: InterceptorSet,
    global_interceptors: Option<GlobalInterceptors>,
    retry_classifier: Option<Arc<dyn RetryClassifier>>,
}

impl ClientConfigBuilder {
    /// Creates a new builder with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the base URL (required).
    #[must_use]
    pub fn base_url(mut self, base_url: BaseUrl) -> Self {
        self.base_url = Some(base_url);
        self
    }

    /// Sets the per-attempt timeout.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Adds a default header, keeping the other defaults.
    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .get_or_insert_with(default_headers)
            .insert(key.into(), value.into());
        self
    }

    /// Replaces all default headers.
    #[must_use]
    pub fn headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers = Some(headers);
        self
    }

    /// Sets the default number of retries.
    #[must_use]
    pub const fn retry(mut self, retry: u32) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Sets the default delay between attempts.
    #[must_use]
    pub const fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = Some(delay);
        self
    }

    /// Adds an instance-scope interceptor.
    #[must_use]
    pub fn interceptor(mut self, interceptor: impl Interceptor + 'static) -> Self {
        self.interceptors.push(Arc::new(interceptor));
        self
    }

    /// Replaces the instance-scope interceptors.
    #[must_use]
    pub fn interceptors(mut self, interceptors: InterceptorSet) -> Self {
        self.interceptors = interceptors;
        self
    }

    /// Sets the shared global-scope interceptor registry.
    #[must_use]
    pub fn global_interceptors(mut self, global: GlobalInterceptors) -> Self {
        self.global_interceptors = Some(global);
        self
    }

    /// Sets the classifier consulted before each retry.
    #[must_use]
    pub fn retry_classifier(mut self, classifier: Arc<dyn RetryClassifier>) -> Self {
        self.retry_classifier = Some(classifier);
        self
    }

    /// Builds the [`ClientConfig`], validating it in the process.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::MissingRequiredField`] if `base_url` is not set
    /// - [`ConfigError::InvalidTimeout`] if the timeout is zero
    /// - [`ConfigError::InvalidHeader`] if a default header cannot be sent
    pub fn build(self) -> Result<ClientConfig, ConfigError> {
        let base_url = self
            .base_url
            .ok_or(ConfigError::MissingRequiredField { field: "base_url" })?;

        let timeout = self.timeout.unwrap_or(DEFAULT_TIMEOUT);
        if timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout);
        }

        let headers = self.headers.unwrap_or_else(default_headers);
        for (name, value) in &headers {
            let valid = reqwest::header::HeaderName::from_bytes(name.as_bytes()).is_ok()
                && reqwest::header::HeaderValue::from_str(value).is_ok();
            if !valid {
                return Err(ConfigError::InvalidHeader { name: name.clone() });
            }
        }

        Ok(ClientConfig {
            base_url,
            timeout,
            headers,
            retry: self.retry.unwrap_or(0),
            retry_delay: self.retry_delay.unwrap_or(DEFAULT_RETRY_DELAY),
            interceptors: self.interceptors,
            global_interceptors: self.global_interceptors.unwrap_or_default(),
            retry_classifier: self.retry_classifier,
        })
    }
}

impl fmt::Debug for ClientConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfigBuilder")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .field("retry_delay", &self.retry_delay)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::{ClosureInterceptor, StatusAllowlist};

    fn base_url() -> BaseUrl {
        BaseUrl::new("https://api.example.com").unwrap()
    }

    #[test]
    fn test_builder_requires_base_url() {
        let result = ClientConfigBuilder::new().build();
        assert!(matches!(
            result,
            Err(ConfigError::MissingRequiredField { field: "base_url" })
        ));
    }

    #[test]
    fn test_builder_provides_sensible_defaults() {
        let config = ClientConfig::builder().base_url(base_url()).build().unwrap();

        assert_eq!(config.timeout(), Duration::from_secs(10));
        assert_eq!(config.retry(), 0);
        assert_eq!(config.retry_delay(), Duration::from_millis(300));
        assert_eq!(
            config.headers().get("Accept"),
            Some(&"application/json".to_string())
        );
        assert_eq!(
            config.headers().get("Content-Type"),
            Some(&"application/json".to_string())
        );
        assert!(config.interceptors().is_empty());
        assert!(config.global_interceptors().is_empty());
        assert_eq!(config.retry_policy().max_retries(), 0);
    }

    #[test]
    fn test_builder_rejects_zero_timeout() {
        let result = ClientConfig::builder()
            .base_url(base_url())
            .timeout(Duration::ZERO)
            .build();
        assert!(matches!(result, Err(ConfigError::InvalidTimeout)));
    }

    #[test]
    fn test_builder_rejects_invalid_header() {
        let result = ClientConfig::builder()
            .base_url(base_url())
            .header("X-Bad", "line\nbreak")
            .build();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidHeader { name }) if name == "X-Bad"
        ));
    }

    #[test]
    fn test_header_extends_defaults() {
        let config = ClientConfig::builder()
            .base_url(base_url())
            .header("X-Client", "web")
            .build()
            .unwrap();

        assert_eq!(config.headers().len(), 3);
        assert_eq!(config.headers().get("X-Client"), Some(&"web".to_string()));
    }

    #[test]
    fn test_builder_with_all_optional_fields() {
        let global = GlobalInterceptors::new();
        global.register(ClosureInterceptor::new());

        let config = ClientConfig::builder()
            .base_url(base_url())
            .timeout(Duration::from_secs(3))
            .headers(HashMap::new())
            .retry(2)
            .retry_delay(Duration::from_millis(50))
            .interceptor(ClosureInterceptor::new())
            .global_interceptors(global.clone())
            .retry_classifier(Arc::new(StatusAllowlist::default()))
            .build()
            .unwrap();

        assert_eq!(config.timeout(), Duration::from_secs(3));
        assert!(config.headers().is_empty());
        assert_eq!(config.interceptors().len(), 1);
        assert_eq!(config.global_interceptors().len(), 1);

        let policy = config.retry_policy();
        assert_eq!(policy.max_retries(), 2);
        assert_eq!(policy.delay(), Duration::from_millis(50));
    }

    #[test]
    fn test_config_is_clone_and_debug() {
        let config = ClientConfig::builder().base_url(base_url()).build().unwrap();
        let cloned = config.clone();
        assert_eq!(cloned.base_url(), config.base_url());
        assert!(format!("{config:?}").contains("ClientConfig"));
    }
}
