//! Interceptor pipeline.
//!
//! Interceptors transform requests before they reach the transport and
//! responses before they reach the caller. They attach at three scopes:
//!
//! - **global**: a [`GlobalInterceptors`] registry shared by every client built with it
//! - **instance**: the [`InterceptorSet`] of one client configuration
//! - **call**: the [`InterceptorSet`] of a single request
//!
//! Call-scope stages wrap the whole logical call and run once. Global and
//! instance stages wrap the transport and run on every attempt: request
//! stages global → instance, response stages instance → global. The call
//! request stage therefore runs first and the call response stage last.
//!
//! # Failure handling
//!
//! A chain carries either a value or an error. Value stages
//! ([`Interceptor::on_request`], [`Interceptor::on_response`]) only run while
//! the chain holds a value; an [`InterceptorError`] switches the chain to the
//! error state and the remaining value stages are skipped. Error stages
//! ([`Interceptor::on_request_error`], [`Interceptor::on_response_error`])
//! run while the chain holds an error and may recover it into a value, after
//! which the following value stages run again.
//!
//! # Example
//!
//! ```rust
//! use request_layer::{ClosureInterceptor, GlobalInterceptors, InterceptorError};
//!
//! let global = GlobalInterceptors::new();
//! global.register(ClosureInterceptor::new().request(|mut request| {
//!     if request.headers.contains_key("Authorization") {
//!         return Err(InterceptorError::new("authorization is injected by the client"));
//!     }
//!     request.headers.insert("Authorization".to_string(), "Bearer token".to_string());
//!     Ok(request)
//! }));
//!
//! assert_eq!(global.len(), 1);
//! ```

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use crate::clients::errors::{InterceptorError, RequestError};
use crate::clients::http_request::RequestDescriptor;
use crate::clients::http_response::RawResponse;
use crate::clients::BoxFuture;

/// A request/response transform attached to the pipeline.
///
/// Every method has a pass-through default, so an implementation only
/// overrides the stages it cares about.
pub trait Interceptor: Send + Sync {
    /// Transforms an outgoing request.
    fn on_request<'a>(
        &'a self,
        request: RequestDescriptor,
    ) -> BoxFuture<'a, Result<RequestDescriptor, InterceptorError>> {
        Box::pin(async move { Ok(request) })
    }

    /// Handles a failure raised by an earlier request stage.
    fn on_request_error<'a>(
        &'a self,
        error: RequestError,
    ) -> BoxFuture<'a, Result<RequestDescriptor, RequestError>> {
        Box::pin(async move { Err(error) })
    }

    /// Transforms a successful response.
    fn on_response<'a>(
        &'a self,
        response: RawResponse,
    ) -> BoxFuture<'a, Result<RawResponse, InterceptorError>> {
        Box::pin(async move { Ok(response) })
    }

    /// Handles a failed call or a failure raised by an earlier response stage.
    fn on_response_error<'a>(
        &'a self,
        error: RequestError,
    ) -> BoxFuture<'a, Result<RawResponse, RequestError>> {
        Box::pin(async move { Err(error) })
    }
}

type RequestFn = dyn Fn(RequestDescriptor) -> Result<RequestDescriptor, InterceptorError> + Send + Sync;
type RequestErrorFn = dyn Fn(RequestError) -> Result<RequestDescriptor, RequestError> + Send + Sync;
type ResponseFn = dyn Fn(RawResponse) -> Result<RawResponse, InterceptorError> + Send + Sync;
type ResponseErrorFn = dyn Fn(RequestError) -> Result<RawResponse, RequestError> + Send + Sync;

/// An [`Interceptor`] assembled from synchronous closures.
///
/// Handlers that are not set behave as pass-through stages.
///
/// # Example
///
/// ```rust
/// use request_layer::{ClosureInterceptor, RawResponse};
/// use serde_json::json;
///
/// let interceptor = ClosureInterceptor::new()
///     .response(|mut response| {
///         response.body = response.body["data"].take();
///         Ok(response)
///     })
///     .response_error(|_error| Ok(RawResponse::ok(json!([]))));
/// ```
#[derive(Clone, Default)]
pub struct ClosureInterceptor {
    request: Option<Arc<RequestFn>>,
    request_error: Option<Arc<RequestErrorFn>>,
    response: Option<Arc<ResponseFn>>,
    response_error: Option<Arc<ResponseErrorFn>>,
}

impl ClosureInterceptor {
    /// Creates an interceptor with no handlers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the request transform.
    #[must_use]
    pub fn request<F>(mut self, handler: F) -> Self
    where
        F: Fn(RequestDescriptor) -> Result<RequestDescriptor, InterceptorError> + Send + Sync + 'static,
    {
        self.request = Some(Arc::new(handler));
        self
    }

    /// Sets the request error handler.
    #[must_use]
    pub fn request_error<F>(mut self, handler: F) -> Self
    where
        F: Fn(RequestError) -> Result<RequestDescriptor, RequestError> + Send + Sync + 'static,
    {
        self.request_error = Some(Arc::new(handler));
        self
    }

    /// Sets the response transform.
    #[must_use]
    pub fn response<F>(mut self, handler: F) -> Self
    where
        F: Fn(RawResponse) -> Result<RawResponse, InterceptorError> + Send + Sync + 'static,
    {
        self.response = Some(Arc::new(handler));
        self
    }

    /// Sets the response error handler.
    #[must_use]
    pub fn response_error<F>(mut self, handler: F) -> Self
    where
        F: Fn(RequestError) -> Result<RawResponse, RequestError> + Send + Sync + 'static,
    {
        self.response_error = Some(Arc::new(handler));
        self
    }
}

impl fmt::Debug for ClosureInterceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClosureInterceptor")
            .field("request", &self.request.is_some())
            .field("request_error", &self.request_error.is_some())
            .field("response", &self.response.is_some())
            .field("response_error", &self.response_error.is_some())
            .finish()
    }
}

impl Interceptor for ClosureInterceptor {
    fn on_request<'a>(
        &'a self,
        request: RequestDescriptor,
    ) -> BoxFuture<'a, Result<RequestDescriptor, InterceptorError>> {
        let result = match &self.request {
            Some(handler) => handler(request),
            None => Ok(request),
        };
        Box::pin(async move { result })
    }

    fn on_request_error<'a>(
        &'a self,
        error: RequestError,
    ) -> BoxFuture<'a, Result<RequestDescriptor, RequestError>> {
        let result = match &self.request_error {
            Some(handler) => handler(error),
            None => Err(error),
        };
        Box::pin(async move { result })
    }

    fn on_response<'a>(
        &'a self,
        response: RawResponse,
    ) -> BoxFuture<'a, Result<RawResponse, InterceptorError>> {
        let result = match &self.response {
            Some(handler) => handler(response),
            None => Ok(response),
        };
        Box::pin(async move { result })
    }

    fn on_response_error<'a>(
        &'a self,
        error: RequestError,
    ) -> BoxFuture<'a, Result<RawResponse, RequestError>> {
        let result = match &self.response_error {
            Some(handler) => handler(error),
            None => Err(error),
        };
        Box::pin(async move { result })
    }
}

/// An ordered list of interceptors for one scope.
#[derive(Clone, Default)]
pub struct InterceptorSet {
    stages: Vec<Arc<dyn Interceptor>>,
}

impl InterceptorSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an interceptor to the end of the set.
    pub fn push(&mut self, interceptor: Arc<dyn Interceptor>) {
        self.stages.push(interceptor);
    }

    /// Appends an interceptor, builder style.
    #[must_use]
    pub fn with(mut self, interceptor: impl Interceptor + 'static) -> Self {
        self.push(Arc::new(interceptor));
        self
    }

    /// Returns the number of interceptors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Returns `true` if the set has no interceptors.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Iterates over the interceptors in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Interceptor>> {
        self.stages.iter()
    }
}

impl fmt::Debug for InterceptorSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptorSet")
            .field("len", &self.stages.len())
            .finish()
    }
}

/// Global-scope interceptors shared between clients.
///
/// Cloning the registry shares it: an interceptor registered through any
/// clone applies to every client that was built with one of the clones,
/// including clients created before the registration.
#[derive(Clone, Default)]
pub struct GlobalInterceptors {
    inner: Arc<RwLock<InterceptorSet>>,
}

impl GlobalInterceptors {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an interceptor at the end of the global chain.
    pub fn register(&self, interceptor: impl Interceptor + 'static) {
        self.register_arc(Arc::new(interceptor));
    }

    /// Registers a shared interceptor at the end of the global chain.
    pub fn register_arc(&self, interceptor: Arc<dyn Interceptor>) {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(interceptor);
    }

    /// Returns the current global chain.
    #[must_use]
    pub fn snapshot(&self) -> InterceptorSet {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns the number of registered interceptors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes every registered interceptor.
    pub fn clear(&self) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = InterceptorSet::new();
    }
}

impl fmt::Debug for GlobalInterceptors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlobalInterceptors")
            .field("len", &self.len())
            .finish()
    }
}

/// Runs the request stages in order.
///
/// # Errors
///
/// Returns the error the chain ends with: an [`InterceptorError`] raised by
/// a value stage (as [`RequestError::Interceptor`]) that no later error
/// stage recovered, or whatever an error stage returned.
pub async fn apply_request_chain(
    stages: &[Arc<dyn Interceptor>],
    request: RequestDescriptor,
) -> Result<RequestDescriptor, RequestError> {
    let mut state = Ok(request);
    for stage in stages {
        state = match state {
            Ok(request) => stage.on_request(request).await.map_err(RequestError::from),
            Err(error) => stage.on_request_error(error).await,
        };
    }
    state
}

/// Runs the response stages in order over the outcome of the call.
///
/// The caller passes the stages already in response order.
///
/// # Errors
///
/// Returns the error the chain ends with; a failed call stays failed unless
/// an error stage recovers it.
pub async fn apply_response_chain(
    stages: &[Arc<dyn Interceptor>],
    outcome: Result<RawResponse, RequestError>,
) -> Result<RawResponse, RequestError> {
    let mut state = outcome;
    for stage in stages {
        state = match state {
            Ok(response) => stage.on_response(response).await.map_err(RequestError::from),
            Err(error) => stage.on_response_error(error).await,
        };
    }
    state
}
