//! # request-layer
//!
//! An HTTP request layer for JSON APIs with duplicate-request cancellation,
//! a layered interceptor pipeline, bounded retry and an activity signal.
//!
//! ## Overview
//!
//! This crate provides:
//! - Type-safe configuration via [`ClientConfig`] and [`ClientConfigBuilder`]
//! - A client façade, [`HttpClient`], with GET/POST/PUT/DELETE/PATCH
//! - Fingerprint-based cancellation of superseded duplicate requests
//! - Bulk cancellation of everything in flight via [`HttpClient::cancel_all`]
//! - Request and response interceptors at global, instance and call scope
//! - Fixed-delay retry with an optional [`RetryClassifier`]
//! - Busy/idle notifications through [`ProgressSignal`]
//! - A pluggable [`Transport`], backed by reqwest by default
//!
//! ## Quick Start
//!
//! ```rust
//! use std::time::Duration;
//! use request_layer::{BaseUrl, ClientConfig, HttpClient};
//!
//! let config = ClientConfig::builder()
//!     .base_url(BaseUrl::new("https://api.example.com").unwrap())
//!     .timeout(Duration::from_secs(5))
//!     .retry(2)
//!     .build()
//!     .unwrap();
//!
//! let client = HttpClient::new(config).unwrap();
//! assert_eq!(client.in_flight(), 0);
//! ```
//!
//! ## Making Requests
//!
//! ```rust,ignore
//! use request_layer::{HttpClient, RequestOptions};
//! use serde_json::json;
//!
//! let users = client
//!     .get("/users", RequestOptions::new().query_param("page", 2))
//!     .await?;
//!
//! let created = client
//!     .post("/users", Some(json!({"name": "Ada"})), RequestOptions::new())
//!     .await?;
//!
//! // Refresh without cache busting, and never cancel it as a duplicate
//! let status = client
//!     .get("/status", RequestOptions::new().cache_bust(false).cancelable(false))
//!     .await?;
//! ```
//!
//! ## Interceptors
//!
//! Call-scope request interceptors run first, once per call. Global then
//! instance request interceptors run on every attempt, and their response
//! counterparts unwind instance then global. Call-scope response
//! interceptors run last.
//!
//! ```rust
//! use request_layer::{
//!     BaseUrl, ClientConfig, ClosureInterceptor, GlobalInterceptors, HttpClient,
//! };
//!
//! let global = GlobalInterceptors::new();
//! global.register(ClosureInterceptor::new().request(|mut request| {
//!     request.headers.insert("Authorization".to_string(), "Bearer token".to_string());
//!     Ok(request)
//! }));
//!
//! let config = ClientConfig::builder()
//!     .base_url(BaseUrl::new("https://api.example.com").unwrap())
//!     .global_interceptors(global)
//!     .build()
//!     .unwrap();
//! let client = HttpClient::new(config).unwrap();
//! assert_eq!(client.global_interceptors().len(), 1);
//! ```
//!
//! ## Design Principles
//!
//! - **No hidden global state**: the global interceptor scope is an explicit,
//!   shareable [`GlobalInterceptors`] value
//! - **Fail-fast validation**: configuration and requests are validated
//!   before anything is sent
//! - **Thread-safe**: all public types are `Send + Sync`
//! - **Async-first**: designed for use with the Tokio runtime

pub mod clients;
pub mod config;
pub mod error;

// Re-export public types at crate root for convenience
pub use config::{default_headers, BaseUrl, ClientConfig, ClientConfigBuilder, DEFAULT_TIMEOUT};
pub use error::ConfigError;

// Re-export request pipeline types
pub use clients::{
    status_description, CancelToken, ClosureInterceptor, ErrorKind, Fingerprint,
    FingerprintRegistry, GlobalInterceptors, HttpClient, HttpMethod, Interceptor,
    InterceptorError, InterceptorSet, InvalidRequestError, ProgressGuard, ProgressListener,
    ProgressSignal, RawResponse, RequestDescriptor, RequestDescriptorBuilder, RequestError,
    RequestOptions, ReqwestTransport, ResponseEnvelope, RetryClassifier, RetryController,
    RetryPolicy, StatusAllowlist, TrackedRequest, Transport, TransportError, BULK_CANCEL_REASON,
    CACHE_BUST_PARAM, DEFAULT_RETRY_DELAY, SUPERSEDED_REASON,
};
