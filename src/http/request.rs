//! Request handling and transformation.
//!
//! # Responsibilities
//! - Generate unique request ID (UUID v4)
//! - Extract routing-relevant information (path-and-query, Referer)
//! - Prepare the request that is forwarded to the target
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - The inbound body is buffered here, not by a tower layer, so an
//!   oversized or stalled body becomes a JSON `ProxyError` like every other
//!   failure
//! - The target is read from the raw path-and-query, without percent-decoding,
//!   so the target's own escaping reaches it untouched

use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::http::{header, request::Parts, HeaderName, HeaderValue, Request};
use futures_util::StreamExt;
use tower_http::request_id::{MakeRequestId, RequestId as TowerRequestId};
use url::{Position, Url};
use uuid::Uuid;

use crate::error::ProxyError;
use crate::routing::RawRequest;

/// Header carrying the request correlation ID.
pub static X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Correlation ID for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

/// Generates a fresh [`RequestId`] for requests arriving without one.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeRequestUuid;

impl MakeRequestId for MakeRequestUuid {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<TowerRequestId> {
        HeaderValue::from_str(&RequestId::new().to_string())
            .ok()
            .map(TowerRequestId::new)
    }
}

/// Read the request ID set by the request-id layer.
pub trait RequestIdExt {
    fn request_id(&self) -> &str;
}

impl RequestIdExt for Parts {
    fn request_id(&self) -> &str {
        self.headers
            .get(&X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
    }
}

impl<B> RequestIdExt for Request<B> {
    fn request_id(&self) -> &str {
        self.headers()
            .get(&X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
    }
}

/// Pull the path-and-query and the `Referer` path out of a request.
pub fn raw_request(parts: &Parts) -> RawRequest {
    let path = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| parts.uri.path());

    RawRequest {
        path: path.to_string(),
        referrer_path: referrer_path(parts),
    }
}

fn referrer_path(parts: &Parts) -> Option<String> {
    let referrer = parts.headers.get(header::REFERER)?.to_str().ok()?;
    let url = Url::parse(referrer).ok()?;
    Some(url[Position::BeforePath..Position::AfterQuery].to_string())
}

/// Buffer the client's body for forwarding.
///
/// Fails with [`ProxyError::RequestTooLarge`] as soon as `max_bytes` is
/// exceeded and with [`ProxyError::RequestTimeout`] once `deadline` passes.
pub async fn read_request_body(
    body: Body,
    max_bytes: usize,
    deadline: Duration,
) -> Result<Bytes, ProxyError> {
    let mut stream = body.into_data_stream();
    let collect = async move {
        let mut buffer = Vec::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| ProxyError::RequestBody(e.to_string()))?;
            if buffer.len() + chunk.len() > max_bytes {
                return Err(ProxyError::RequestTooLarge(max_bytes));
            }
            buffer.extend_from_slice(&chunk);
        }
        Ok::<_, ProxyError>(Bytes::from(buffer))
    };

    tokio::time::timeout(deadline, collect)
        .await
        .map_err(|_| ProxyError::RequestTimeout(deadline))?
}
