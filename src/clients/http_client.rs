//! The client façade.
//!
//! [`HttpClient`] composes the fingerprint registry, the interceptor
//! pipeline, the retry controller and the progress signal around a
//! [`Transport`] for every call.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use crate::clients::errors::{status_description, RequestError};
use crate::clients::fingerprint::{CancelToken, FingerprintRegistry, TrackedRequest};
use crate::clients::http_request::{HttpMethod, RequestDescriptor, RequestOptions};
use crate::clients::http_response::{RawResponse, ResponseEnvelope};
use crate::clients::interceptor::{
    apply_request_chain, apply_response_chain, GlobalInterceptors, Interceptor,
};
use crate::clients::progress::ProgressSignal;
use crate::clients::retry::{RetryController, RetryPolicy};
use crate::clients::transport::{ReqwestTransport, Transport};
use crate::config::ClientConfig;
use crate::error::ConfigError;

/// Query parameter injected into GET requests to defeat caches.
pub const CACHE_BUST_PARAM: &str = "_t";

/// HTTP client with duplicate cancellation, retry, progress signaling and
/// layered interceptors.
///
/// Each call goes through these steps:
///
/// 1. call-scope request interceptors run
/// 2. the descriptor is validated and, if cancelable, registered under its
///    fingerprint (canceling an identical request still in flight)
/// 3. GET requests receive the [`CACHE_BUST_PARAM`] query parameter and
///    client default headers are filled in
/// 4. each attempt runs the global then instance request interceptors, the
///    transport, and the instance then global response interceptors
/// 5. the registration is removed and the progress signal is released
/// 6. call-scope response interceptors run
///
/// Call-scope interceptors see the logical call once. Global and instance
/// interceptors wrap the transport and run again on every retry.
///
/// # Thread Safety
///
/// `HttpClient` is `Send + Sync`. Concurrent calls share the fingerprint
/// registry, so duplicates are detected across tasks.
///
/// # Example
///
/// ```rust,ignore
/// use request_layer::{BaseUrl, ClientConfig, HttpClient, RequestOptions};
///
/// let config = ClientConfig::builder()
///     .base_url(BaseUrl::new("https://api.example.com")?)
///     .retry(3)
///     .build()?;
/// let client = HttpClient::new(config)?;
///
/// let user = client.get("/users", RequestOptions::new().query_param("id", 1)).await?;
/// ```
pub struct HttpClient {
    transport: Arc<dyn Transport>,
    config: ClientConfig,
    registry: FingerprintRegistry,
    progress: Arc<ProgressSignal>,
    last_cache_bust: AtomicI64,
}

// Verify HttpClient is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<HttpClient>();
};

impl HttpClient {
    /// Creates a client that sends requests with [`ReqwestTransport`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::TransportInit`] if the reqwest client cannot be
    /// created.
    pub fn new(config: ClientConfig) -> Result<Self, ConfigError> {
        let transport = ReqwestTransport::new(config.base_url().clone(), config.timeout())?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Creates a client on top of a custom transport.
    #[must_use]
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            config,
            registry: FingerprintRegistry::new(),
            progress: Arc::new(ProgressSignal::new()),
            last_cache_bust: AtomicI64::new(0),
        }
    }

    /// Returns the configuration this client was built with.
    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Returns the progress signal shared by all calls of this client.
    #[must_use]
    pub const fn progress(&self) -> &Arc<ProgressSignal> {
        &self.progress
    }

    /// Returns the global interceptor registry this client reads from.
    #[must_use]
    pub const fn global_interceptors(&self) -> &GlobalInterceptors {
        self.config.global_interceptors()
    }

    /// Returns the number of cancelable requests currently in flight.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.registry.len()
    }

    /// Cancels every in-flight cancelable request.
    ///
    /// Returns the number of requests canceled. Calling this with nothing in
    /// flight is a no-op.
    pub fn cancel_all(&self) -> usize {
        let cancelled = self.registry.cancel_all();
        if cancelled > 0 {
            tracing::debug!("Cancelled {} in-flight request(s)", cancelled);
        }
        cancelled
    }

    /// Alias of [`cancel_all`](Self::cancel_all).
    pub fn clear_pending_requests(&self) -> usize {
        self.cancel_all()
    }

    /// Sends a GET request.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError`] if the call fails; see [`request`](Self::request).
    pub async fn get(
        &self,
        url: impl Into<String>,
        options: RequestOptions,
    ) -> Result<serde_json::Value, RequestError> {
        self.request(RequestDescriptor::from_options(HttpMethod::Get, url, None, options))
            .await
    }

    /// Sends a POST request with a JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError`] if the call fails; see [`request`](Self::request).
    pub async fn post(
        &self,
        url: impl Into<String>,
        body: Option<serde_json::Value>,
        options: RequestOptions,
    ) -> Result<serde_json::Value, RequestError> {
        self.request(RequestDescriptor::from_options(HttpMethod::Post, url, body, options))
            .await
    }

    /// Sends a PUT request with a JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError`] if the call fails; see [`request`](Self::request).
    pub async fn put(
        &self,
        url: impl Into<String>,
        body: Option<serde_json::Value>,
        options: RequestOptions,
    ) -> Result<serde_json::Value, RequestError> {
        self.request(RequestDescriptor::from_options(HttpMethod::Put, url, body, options))
            .await
    }

    /// Sends a DELETE request.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError`] if the call fails; see [`request`](Self::request).
    pub async fn delete(
        &self,
        url: impl Into<String>,
        options: RequestOptions,
    ) -> Result<serde_json::Value, RequestError> {
        self.request(RequestDescriptor::from_options(HttpMethod::Delete, url, None, options))
            .await
    }

    /// Sends a PATCH request with a JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError`] if the call fails; see [`request`](Self::request).
    pub async fn patch(
        &self,
        url: impl Into<String>,
        body: Option<serde_json::Value>,
        options: RequestOptions,
    ) -> Result<serde_json::Value, RequestError> {
        self.request(RequestDescriptor::from_options(HttpMethod::Patch, url, body, options))
            .await
    }

    /// Sends a request and returns the response payload.
    ///
    /// # Errors
    ///
    /// - [`RequestError::InvalidRequest`] if the descriptor fails validation
    /// - [`RequestError::Cancelled`] if a duplicate or `cancel_all` canceled it
    /// - [`RequestError::Interceptor`] if an interceptor stage failed
    /// - [`RequestError::Network`] / [`RequestError::HttpStatus`] if the only
    ///   attempt failed
    /// - [`RequestError::RetriesExhausted`] if every retry failed
    pub async fn request(
        &self,
        request: RequestDescriptor,
    ) -> Result<serde_json::Value, RequestError> {
        self.send(request).await.map(|response| response.body)
    }

    /// Sends a request and wraps the outcome in a [`ResponseEnvelope`].
    pub async fn request_envelope(&self, request: RequestDescriptor) -> ResponseEnvelope {
        ResponseEnvelope::from_result(self.request(request).await)
    }

    /// Sends a request and returns the full response.
    ///
    /// # Errors
    ///
    /// Same as [`request`](Self::request).
    pub async fn send(&self, mut request: RequestDescriptor) -> Result<RawResponse, RequestError> {
        let method = request.method;
        let url = request.url.clone();

        let mut call: Vec<Arc<dyn Interceptor>> = std::mem::take(&mut request.interceptors)
            .iter()
            .cloned()
            .collect();
        let outcome = match apply_request_chain(&call, request).await {
            Ok(request) => {
                let outcome = self.dispatch(request).await;
                call.reverse();
                apply_response_chain(&call, outcome).await
            }
            Err(error) => Err(error),
        };

        if let Err(error) = &outcome {
            log_failure(method, &url, error);
        }
        outcome
    }

    /// Runs one logical call inside the transport boundary: tracking,
    /// cache busting, default headers, progress and the retry loop.
    async fn dispatch(&self, mut request: RequestDescriptor) -> Result<RawResponse, RequestError> {
        request.verify()?;

        let tracked = request
            .cancelable
            .then(|| self.registry.begin_tracking(&request));
        let _tracking = tracked.as_ref().map(|tracked| TrackingGuard {
            registry: &self.registry,
            tracked,
        });
        let cancel = tracked
            .as_ref()
            .map_or_else(CancelToken::new, |tracked| tracked.token().clone());

        if request.method == HttpMethod::Get && request.cache_bust {
            request
                .query
                .insert(CACHE_BUST_PARAM.to_string(), self.next_cache_bust().to_string());
        }
        merge_default_headers(&mut request.headers, self.config.headers());

        let stages = self.stages();
        let unwinding: Vec<Arc<dyn Interceptor>> = stages.iter().rev().cloned().collect();
        let policy = self.retry_policy(&request);

        let _progress = self.progress.begin();
        self.execute(&request, &stages, &unwinding, &policy, &cancel)
            .await
    }

    /// Retries the global and instance pipeline around the transport.
    async fn execute(
        &self,
        request: &RequestDescriptor,
        stages: &[Arc<dyn Interceptor>],
        unwinding: &[Arc<dyn Interceptor>],
        policy: &RetryPolicy,
        cancel: &CancelToken,
    ) -> Result<RawResponse, RequestError> {
        let transport = self.transport.as_ref();
        RetryController::execute(policy, cancel, |attempt| async move {
            let outcome = match apply_request_chain(stages, request.clone()).await {
                Ok(prepared) => {
                    tracing::debug!(
                        "Sending {} {} (attempt {}/{})",
                        prepared.method,
                        prepared.url,
                        attempt,
                        policy.max_attempts()
                    );
                    // Transports are not required to observe the token.
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => Err(RequestError::Cancelled { reason: cancel.reason() }),
                        result = transport.send(&prepared, cancel) => result.map_err(RequestError::from),
                    }
                }
                Err(error) => Err(error),
            };
            apply_response_chain(unwinding, outcome).await
        })
        .await
    }

    /// Global stages followed by instance stages.
    fn stages(&self) -> Vec<Arc<dyn Interceptor>> {
        self.config
            .global_interceptors()
            .snapshot()
            .iter()
            .chain(self.config.interceptors().iter())
            .cloned()
            .collect()
    }

    fn retry_policy(&self, request: &RequestDescriptor) -> RetryPolicy {
        let mut policy = self.config.retry_policy();
        if let Some(retry) = request.retry {
            policy = policy.with_max_retries(retry);
        }
        if let Some(delay) = request.retry_delay {
            policy = policy.with_delay(delay);
        }
        policy
    }

    /// Millisecond timestamp, bumped so that no two calls share a value.
    fn next_cache_bust(&self) -> i64 {
        let now = chrono::Utc::now().timestamp_millis();
        let previous = self
            .last_cache_bust
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or(now);
        now.max(previous + 1)
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("config", &self.config)
            .field("in_flight", &self.registry.len())
            .field("progress", &self.progress)
            .finish_non_exhaustive()
    }
}

/// Removes a registration on every exit path, including a dropped future.
struct TrackingGuard<'a> {
    registry: &'a FingerprintRegistry,
    tracked: &'a TrackedRequest,
}

impl Drop for TrackingGuard<'_> {
    fn drop(&mut self) {
        self.registry.end_tracking(self.tracked);
    }
}

/// Fills in defaults whose names are not already present in any letter case.
fn merge_default_headers(headers: &mut HashMap<String, String>, defaults: &HashMap<String, String>) {
    for (name, value) in defaults {
        if !headers.keys().any(|key| key.eq_ignore_ascii_case(name)) {
            headers.insert(name.clone(), value.clone());
        }
    }
}

fn log_failure(method: HttpMethod, url: &str, error: &RequestError) {
    if error.is_cancellation() {
        tracing::debug!("{} {} cancelled: {}", method, url, error);
        return;
    }
    match error.status().and_then(status_description) {
        Some(description) => tracing::warn!("{} {} failed ({}): {}", method, url, description, error),
        None => tracing::warn!("{} {} failed: {}", method, url, error),
    }
}
