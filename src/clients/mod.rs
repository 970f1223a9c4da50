//! Request pipeline types.
//!
//! This module contains everything between a caller's request and the
//! transport that sends it.
//!
//! # Overview
//!
//! - [`HttpClient`]: the façade exposing GET/POST/PUT/DELETE/PATCH
//! - [`RequestDescriptor`] / [`RequestOptions`]: what a call asks for
//! - [`RawResponse`] / [`ResponseEnvelope`]: what a call produces
//! - [`FingerprintRegistry`]: duplicate detection and bulk cancellation
//! - [`Interceptor`], [`InterceptorSet`], [`GlobalInterceptors`]: the
//!   request/response pipeline at global, instance and call scope
//! - [`RetryController`] / [`RetryPolicy`]: bounded fixed-delay retry
//! - [`ProgressSignal`]: busy/idle notifications
//! - [`Transport`] / [`ReqwestTransport`]: the HTTP exchange itself
//!
//! # Duplicate Requests
//!
//! Two cancelable requests with the same method, URL, query and body share a
//! [`Fingerprint`]. Starting the second cancels the first, which fails with
//! [`RequestError::Cancelled`] and the reason [`SUPERSEDED_REASON`].
//!
//! # Retry Behavior
//!
//! Failed transport attempts are retried up to the configured number of
//! times with a fixed delay. Global and instance interceptors run again on
//! every attempt; call-scope interceptors run once around the whole call.
//! Cancellations, interceptor failures and invalid requests are never
//! retried.
//!
//! # Example
//!
//! ```rust,ignore
//! use request_layer::{BaseUrl, ClientConfig, HttpClient, RequestOptions};
//!
//! let client = HttpClient::new(
//!     ClientConfig::builder()
//!         .base_url(BaseUrl::new("https://api.example.com")?)
//!         .build()?,
//! )?;
//!
//! let created = client
//!     .post("/users", Some(serde_json::json!({"name": "Ada"})), RequestOptions::new().retry(2))
//!     .await?;
//! ```

use std::future::Future;
use std::pin::Pin;

mod errors;
mod fingerprint;
mod http_client;
mod http_request;
mod http_response;
mod interceptor;
mod progress;
mod retry;
mod transport;

/// Boxed future returned by the pipeline's trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub use errors::{
    status_description, ErrorKind, InterceptorError, InvalidRequestError, RequestError,
    TransportError,
};
pub use fingerprint::{
    CancelToken, Fingerprint, FingerprintRegistry, TrackedRequest, BULK_CANCEL_REASON,
    SUPERSEDED_REASON,
};
pub use http_client::{HttpClient, CACHE_BUST_PARAM};
pub use http_request::{HttpMethod, RequestDescriptor, RequestDescriptorBuilder, RequestOptions};
pub use http_response::{RawResponse, ResponseEnvelope};
pub use interceptor::{
    apply_request_chain, apply_response_chain, ClosureInterceptor, GlobalInterceptors,
    Interceptor, InterceptorSet,
};
pub use progress::{ProgressGuard, ProgressListener, ProgressSignal};
pub use retry::{
    RetryClassifier, RetryController, RetryPolicy, StatusAllowlist, DEFAULT_RETRYABLE_STATUSES,
    DEFAULT_RETRY_DELAY,
};
pub use transport::{ReqwestTransport, Transport};
