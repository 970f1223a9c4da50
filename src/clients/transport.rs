//! Transport adapter.
//!
//! The [`Transport`] trait is the boundary between the request pipeline and
//! the actual HTTP exchange. [`ReqwestTransport`] is the default
//! implementation; tests and embedders can provide their own.

use std::collections::HashMap;
use std::time::Duration;

use crate::clients::errors::TransportError;
use crate::clients::fingerprint::CancelToken;
use crate::clients::http_request::RequestDescriptor;
use crate::clients::http_response::RawResponse;
use crate::clients::BoxFuture;
use crate::config::BaseUrl;
use crate::error::ConfigError;

/// Sends a single request.
///
/// Implementations resolve with a [`RawResponse`] for 2xx statuses and with
/// [`TransportError::Status`] for every other status. They should stop
/// early with [`TransportError::Cancelled`] once `cancel` fires; the client
/// also races every attempt against the token, so a transport that ignores
/// it is still canceled correctly, only later.
pub trait Transport: Send + Sync {
    /// Sends `request` and waits for the response.
    fn send<'a>(
        &'a self,
        request: &'a RequestDescriptor,
        cancel: &'a CancelToken,
    ) -> BoxFuture<'a, Result<RawResponse, TransportError>>;
}

/// [`Transport`] backed by a [`reqwest::Client`].
///
/// Relative request URLs are resolved against the base URL; absolute URLs
/// are used as given. The timeout applies to each attempt separately.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    base_url: BaseUrl,
}

// Verify ReqwestTransport is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<ReqwestTransport>();
};

impl ReqwestTransport {
    /// Creates a transport for the given base URL and per-attempt timeout.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::TransportInit`] if the reqwest client cannot be
    /// created (for example when TLS initialization fails).
    pub fn new(base_url: BaseUrl, timeout: Duration) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .timeout(timeout)
            .build()
            .map_err(|error| ConfigError::TransportInit {
                message: error.to_string(),
            })?;

        Ok(Self { client, base_url })
    }

    /// Returns the base URL requests are resolved against.
    #[must_use]
    pub const fn base_url(&self) -> &BaseUrl {
        &self.base_url
    }

    async fn exchange(&self, request: &RequestDescriptor) -> Result<RawResponse, TransportError> {
        let url = self.base_url.resolve(&request.url);
        let mut builder = self.client.request(request.method.into(), url);

        for (key, value) in &request.headers {
            builder = builder.header(key, value);
        }
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let res = builder.send().await.map_err(map_reqwest_error)?;
        let status = res.status().as_u16();
        let headers = parse_response_headers(res.headers());
        let text = res.text().await.map_err(map_reqwest_error)?;
        let body = RawResponse::decode_body(&text);

        let response = RawResponse::new(status, headers, body);
        if response.is_ok() {
            Ok(response)
        } else {
            Err(TransportError::Status {
                status,
                body: response.body,
            })
        }
    }
}

impl Transport for ReqwestTransport {
    fn send<'a>(
        &'a self,
        request: &'a RequestDescriptor,
        cancel: &'a CancelToken,
    ) -> BoxFuture<'a, Result<RawResponse, TransportError>> {
        Box::pin(async move {
            tokio::select! {
                biased;
                () = cancel.cancelled() => Err(TransportError::Cancelled { reason: cancel.reason() }),
                result = self.exchange(request) => result,
            }
        })
    }
}

fn map_reqwest_error(error: reqwest::Error) -> TransportError {
    if error.is_builder() {
        return TransportError::Invalid {
            message: error.to_string(),
        };
    }
    TransportError::Network {
        message: error.to_string(),
        timeout: error.is_timeout(),
    }
}

fn parse_response_headers(headers: &reqwest::header::HeaderMap) -> HashMap<String, Vec<String>> {
    let mut result: HashMap<String, Vec<String>> = HashMap::new();
    for (name, value) in headers {
        let key = name.as_str().to_lowercase();
        let value = value.to_str().unwrap_or_default().to_string();
        result.entry(key).or_default().push(value);
    }
    result
}
