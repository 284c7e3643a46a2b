//! Request-level error type.
//!
//! Every failure a request can hit ends up here and is rendered to the
//! client as a pretty-printed `{statusCode, error, message}` JSON body.

use std::time::Duration;

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::routing::TargetError;
use crate::upstream::FetchError;

#[derive(Debug, Error)]
pub enum ProxyError {
    /// The client named a target that cannot be fetched.
    #[error(transparent)]
    Target(#[from] TargetError),

    #[error("the target lacks a CSS content-type or file extension.")]
    UnsupportedContent,

    #[error(transparent)]
    Network(#[from] FetchError),

    #[error("the target did not send its stylesheet within {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("the target did not respond within {}s", .0.as_secs())]
    ResponseTimeout(Duration),

    #[error("the target redirected without a usable location")]
    InvalidRedirect,

    #[error("the target's stylesheet exceeds {0} bytes")]
    StylesheetTooLarge(usize),

    #[error("the request body exceeds {0} bytes")]
    RequestTooLarge(usize),

    #[error("the request body did not arrive within {}s", .0.as_secs())]
    RequestTimeout(Duration),

    #[error("unable to read the request body: {0}")]
    RequestBody(String),
}

impl ProxyError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ProxyError::Target(_) | ProxyError::RequestBody(_) => StatusCode::BAD_REQUEST,
            ProxyError::UnsupportedContent => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ProxyError::Network(_)
            | ProxyError::InvalidRedirect
            | ProxyError::StylesheetTooLarge(_) => StatusCode::BAD_GATEWAY,
            ProxyError::Timeout(_) | ProxyError::ResponseTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ProxyError::RequestTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ProxyError::RequestTimeout(_) => StatusCode::REQUEST_TIMEOUT,
        }
    }

    /// Short label used for metrics and logs.
    pub fn outcome(&self) -> &'static str {
        match self {
            ProxyError::Target(_)
            | ProxyError::RequestBody(_)
            | ProxyError::RequestTooLarge(_)
            | ProxyError::RequestTimeout(_) => "client_error",
            ProxyError::UnsupportedContent => "unsupported",
            ProxyError::Network(_) | ProxyError::InvalidRedirect | ProxyError::StylesheetTooLarge(_) => {
                "upstream_error"
            }
            ProxyError::Timeout(_) | ProxyError::ResponseTimeout(_) => "timeout",
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody<'a> {
    status_code: u16,
    error: &'a str,
    message: String,
}

/// Serialize with 4-space indentation.
fn to_pretty_json<T: Serialize>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    value.serialize(&mut serializer)?;
    Ok(out)
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorBody {
            status_code: status.as_u16(),
            error: status.canonical_reason().unwrap_or("Unknown"),
            message: self.to_string(),
        };

        match to_pretty_json(&body) {
            Ok(json) => (
                status,
                [(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static("application/json; charset=utf-8"),
                )],
                json,
            )
                .into_response(),
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize error body");
                (status, body.message).into_response()
            }
        }
    }
}
