//! Outbound HTTP client.
//!
//! # Responsibilities
//! - Send the inbound method, headers and body to the target
//! - Decode gzip/brotli/deflate bodies transparently
//! - Distinguish DNS and connection-refused failures from the rest

use std::error::Error as StdError;
use std::future::Future;
use std::time::Duration;

use axum::body::Bytes;
use axum::http::{HeaderMap, Method, StatusCode};
use futures_util::stream::BoxStream;
use futures_util::{StreamExt, TryStreamExt};
use thiserror::Error;
use url::Url;

use crate::config::TimeoutConfig;

/// Decoded response body chunks.
pub type BodyStream = BoxStream<'static, Result<Bytes, FetchError>>;

/// Why an upstream fetch failed. Display text is what the client sees.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("unable to find the target via DNS")]
    Dns { detail: String },

    #[error("unable to connect to the target")]
    ConnectionRefused { detail: String },

    #[error("{0}")]
    Other(String),
}

impl FetchError {
    /// The underlying cause, for logs.
    pub fn detail(&self) -> &str {
        match self {
            FetchError::Dns { detail } | FetchError::ConnectionRefused { detail } => detail,
            FetchError::Other(message) => message,
        }
    }
}

/// A request to send upstream.
#[derive(Debug, Clone)]
pub struct UpstreamRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// A response from upstream, owned by the request that produced it.
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: BodyStream,
}

impl std::fmt::Debug for UpstreamResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// Performs the actual network fetch.
pub trait Transport: Send + Sync + 'static {
    fn fetch(
        &self,
        request: UpstreamRequest,
    ) -> impl Future<Output = Result<UpstreamResponse, FetchError>> + Send;
}

/// `reqwest`-backed transport used by the server.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeouts: &TimeoutConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .no_proxy()
            .connect_timeout(Duration::from_secs(timeouts.connect_secs))
            .build()
            .map_err(|e| classify(&e))?;

        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    async fn fetch(&self, request: UpstreamRequest) -> Result<UpstreamResponse, FetchError> {
        let mut builder = self
            .client
            .request(request.method, request.url)
            .headers(request.headers);
        if !request.body.is_empty() {
            builder = builder.body(request.body);
        }

        let response = builder.send().await.map_err(|e| classify(&e))?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes_stream()
            .map_err(|e| classify(&e))
            .boxed();

        Ok(UpstreamResponse {
            status,
            headers,
            body,
        })
    }
}

/// Walk the source chain looking for a resolver or refused-connection failure.
fn classify(err: &reqwest::Error) -> FetchError {
    let detail = error_chain(err);
    let mut source: Option<&(dyn StdError + 'static)> = err.source();

    while let Some(cause) = source {
        if let Some(io) = cause.downcast_ref::<std::io::Error>() {
            if io.kind() == std::io::ErrorKind::ConnectionRefused {
                return FetchError::ConnectionRefused { detail };
            }
        }
        if cause.to_string().starts_with("dns error") {
            return FetchError::Dns { detail };
        }
        source = cause.source();
    }

    FetchError::Other(detail)
}

fn error_chain(err: &dyn StdError) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
