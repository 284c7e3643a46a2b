//! Request spans.
//!
//! Each request runs inside one span carrying its request ID, so every log
//! line emitted while resolving, fetching and rewriting can be correlated.

use axum::http::Request;
use tracing::Span;

use crate::http::request::RequestIdExt;

/// Span factory for tower-http's `TraceLayer`.
pub fn make_request_span<B>(request: &Request<B>) -> Span {
    tracing::info_span!(
        "request",
        request_id = %request.request_id(),
        method = %request.method(),
        uri = %request.uri(),
    )
}
