//! Header filtering between client, proxy and target.
//!
//! # Responsibilities
//! - Pass client request headers through to the target
//! - Copy target response headers back to the client
//! - Drop headers whose values this proxy recomputes itself
//!
//! # Design Decisions
//! - Body framing (`content-length`, `transfer-encoding`) and
//!   `content-encoding` describe the upstream bytes, not the rewritten body
//! - `accept-encoding` is left to the transport so the target only answers
//!   with encodings the proxy can decode
//! - Multi-valued headers keep every value and their order
//! - The target's own `access-control-*` headers are dropped; the proxy's
//!   CORS layer is the only cross-origin policy a client sees

use axum::http::{header, HeaderMap, HeaderName};

/// Target response headers never copied to the client.
pub const IGNORED_RESPONSE_HEADERS: [HeaderName; 3] = [
    header::CONTENT_ENCODING,
    header::CONTENT_LENGTH,
    header::TRANSFER_ENCODING,
];

/// Client request headers never forwarded to the target.
pub const IGNORED_REQUEST_HEADERS: [HeaderName; 5] = [
    header::HOST,
    header::CONNECTION,
    header::CONTENT_LENGTH,
    header::TRANSFER_ENCODING,
    header::ACCEPT_ENCODING,
];

/// Prefix of the target's CORS headers, which never reach the client.
const CORS_HEADER_PREFIX: &str = "access-control-";

/// Copy `from` into `to`, skipping [`IGNORED_RESPONSE_HEADERS`] and the
/// target's CORS headers.
pub fn copy_response_headers(from: &HeaderMap, to: &mut HeaderMap) {
    for (name, value) in from {
        if !IGNORED_RESPONSE_HEADERS.contains(name)
            && !name.as_str().starts_with(CORS_HEADER_PREFIX)
        {
            to.append(name.clone(), value.clone());
        }
    }
}

/// The subset of the client's headers that is sent to the target.
pub fn forwarded_request_headers(inbound: &HeaderMap) -> HeaderMap {
    let mut forwarded = HeaderMap::with_capacity(inbound.len());
    for (name, value) in inbound {
        if !IGNORED_REQUEST_HEADERS.contains(name) {
            forwarded.append(name.clone(), value.clone());
        }
    }
    forwarded
}
