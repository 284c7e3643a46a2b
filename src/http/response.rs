//! Response handling and transformation.
//!
//! # Responsibilities
//! - Transform the target's response for the client
//! - Keep upstream redirects inside the proxy
//! - Refuse anything that is not CSS
//! - Buffer and rewrite stylesheet bodies
//! - Map upstream failures to client-facing errors
//!
//! # Design Decisions
//! - The whole body is buffered (bounded in time and size) because the
//!   rewrite needs the complete text
//! - Status and headers are copied from the target, minus framing headers
//! - Only 301/302/303/307/308 are treated as redirects; 304 and friends
//!   pass through like any other status

use std::time::Duration;

use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::Response,
};

use crate::error::ProxyError;
use crate::rewrite::{ImportRewriter, PatternImportRewriter, RewriteContext};
use crate::routing::{ProxyPath, Target};
use crate::security::headers::copy_response_headers;
use crate::upstream::{read_body, FetchError, UpstreamResponse};

/// Upstream statuses whose `Location` is rewritten to a proxy path.
pub const REDIRECT_CODES: [StatusCode; 5] = [
    StatusCode::MOVED_PERMANENTLY,
    StatusCode::FOUND,
    StatusCode::SEE_OTHER,
    StatusCode::TEMPORARY_REDIRECT,
    StatusCode::PERMANENT_REDIRECT,
];

/// Turns a target's response into the response sent to the client.
#[derive(Debug, Clone)]
pub struct ResponseAdapter<R = PatternImportRewriter> {
    rewriter: R,
    body_timeout: Duration,
    max_stylesheet_bytes: usize,
}

impl<R: ImportRewriter> ResponseAdapter<R> {
    pub fn new(rewriter: R, body_timeout: Duration, max_stylesheet_bytes: usize) -> Self {
        Self {
            rewriter,
            body_timeout,
            max_stylesheet_bytes,
        }
    }

    pub async fn adapt(
        &self,
        target: &Target,
        fetched: Result<UpstreamResponse, FetchError>,
    ) -> Result<Response, ProxyError> {
        let upstream = fetched.inspect_err(|e| {
            tracing::warn!(target_url = %target.raw(), detail = %e.detail(), "Upstream fetch failed");
        })?;

        if REDIRECT_CODES.contains(&upstream.status) {
            return redirect_through_proxy(target, &upstream);
        }

        if !is_css(target, &upstream.headers) {
            tracing::info!(
                target_url = %target.raw(),
                content_type = ?upstream.headers.get(header::CONTENT_TYPE),
                "Rejected non-CSS content"
            );
            return Err(ProxyError::UnsupportedContent);
        }

        let UpstreamResponse {
            status,
            headers,
            body,
        } = upstream;
        let bytes = read_body(body, self.max_stylesheet_bytes, self.body_timeout).await?;
        let css = String::from_utf8_lossy(&bytes);
        let rewritten = self
            .rewriter
            .rewrite(&css, &RewriteContext::new(target.raw()));

        tracing::debug!(
            target_url = %target.raw(),
            upstream_bytes = bytes.len(),
            rewritten_bytes = rewritten.len(),
            "Stylesheet rewritten"
        );

        let mut response = Response::new(Body::from(rewritten));
        *response.status_mut() = status;
        copy_response_headers(&headers, response.headers_mut());
        Ok(response)
    }
}

/// Re-point an upstream redirect at the proxy path of its resolved location.
fn redirect_through_proxy(
    target: &Target,
    upstream: &UpstreamResponse,
) -> Result<Response, ProxyError> {
    let location = upstream
        .headers
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(ProxyError::InvalidRedirect)?;
    let resolved = target
        .url()
        .join(location)
        .map_err(|_| ProxyError::InvalidRedirect)?;
    let proxy_path = ProxyPath::new(resolved.as_str());
    let location =
        HeaderValue::from_str(proxy_path.as_str()).map_err(|_| ProxyError::InvalidRedirect)?;

    tracing::debug!(
        target_url = %target.raw(),
        status = %upstream.status,
        location = %proxy_path,
        "Upstream redirect rerouted"
    );

    let mut response = Response::new(Body::empty());
    *response.status_mut() = upstream.status;
    copy_response_headers(&upstream.headers, response.headers_mut());
    response.headers_mut().insert(header::LOCATION, location);
    Ok(response)
}

/// `text/css` by content type, or a `.css` path when no content type was sent.
fn is_css(target: &Target, headers: &HeaderMap) -> bool {
    match headers.get(header::CONTENT_TYPE) {
        Some(value) => value
            .to_str()
            .ok()
            .and_then(|v| v.split(';').next())
            .is_some_and(|essence| essence.trim().eq_ignore_ascii_case("text/css")),
        None => target.path().to_ascii_lowercase().ends_with(".css"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Bytes;
    use futures_util::{stream, StreamExt};

    fn adapter() -> ResponseAdapter {
        ResponseAdapter::new(PatternImportRewriter, Duration::from_secs(30), 1024 * 1024)
    }

    fn upstream(status: u16, headers: &[(&'static str, &'static str)], body: &'static str) -> UpstreamResponse {
        let mut map = HeaderMap::new();
        for (name, value) in headers {
            map.append(*name, HeaderValue::from_static(*value));
        }
        UpstreamResponse {
            status: StatusCode::from_u16(status).unwrap(),
            headers: map,
            body: stream::iter(vec![Ok(Bytes::from_static(body.as_bytes()))]).boxed(),
        }
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn target(raw: &str) -> Target {
        Target::parse(raw).unwrap()
    }

    #[tokio::test]
    async fn test_stylesheet_is_rewritten() {
        let fetched = upstream(
            200,
            &[
                ("content-type", "text/css"),
                ("content-length", "999"),
                ("content-encoding", "gzip"),
                ("transfer-encoding", "chunked"),
                ("etag", "\"v1\""),
            ],
            r#"@import "http://x.com/y.css"; @import url('/z.css'); a { color: red }"#,
        );

        let response = adapter()
            .adapt(&target("http://a.com/b/style.css"), Ok(fetched))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["content-type"], "text/css");
        assert_eq!(response.headers()["etag"], "\"v1\"");
        assert!(!response.headers().contains_key("content-length"));
        assert!(!response.headers().contains_key("content-encoding"));
        assert!(!response.headers().contains_key("transfer-encoding"));
        assert_eq!(
            body_text(response).await,
            r#"@import "/http://x.com/y.css"; @import url('/http://a.com/z.css'); a { color: red }"#
        );
    }

    #[tokio::test]
    async fn test_non_css_content_type_is_rejected() {
        let fetched = upstream(200, &[("content-type", "text/plain")], "hello");
        let err = adapter()
            .adapt(&target("http://a.com/style.css"), Ok(fetched))
            .await
            .unwrap_err();
        assert!(matches!(err, ProxyError::UnsupportedContent));
        assert_eq!(err.status_code(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }

    #[tokio::test]
    async fn test_content_type_parameters_are_ignored() {
        let fetched = upstream(200, &[("content-type", "Text/CSS; charset=utf-8")], "a{}");
        let response = adapter()
            .adapt(&target("http://a.com/theme"), Ok(fetched))
            .await
            .unwrap();
        assert_eq!(body_text(response).await, "a{}");
    }

    #[tokio::test]
    async fn test_css_extension_used_only_without_content_type() {
        let no_type = upstream(200, &[], "a{}");
        assert!(adapter()
            .adapt(&target("http://a.com/STYLE.CSS?v=3"), Ok(no_type))
            .await
            .is_ok());

        let no_type = upstream(200, &[], "a{}");
        assert!(matches!(
            adapter().adapt(&target("http://a.com/script.js"), Ok(no_type)).await,
            Err(ProxyError::UnsupportedContent)
        ));

        let html = upstream(200, &[("content-type", "text/html")], "<html>");
        assert!(matches!(
            adapter().adapt(&target("http://a.com/style.css"), Ok(html)).await,
            Err(ProxyError::UnsupportedContent)
        ));
    }

    #[tokio::test]
    async fn test_relative_redirect_is_resolved_and_proxied() {
        let fetched = upstream(302, &[("location", "/other.css"), ("content-type", "text/html")], "moved");
        let response = adapter()
            .adapt(&target("http://a.com/b/style.css"), Ok(fetched))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()["location"], "/http://a.com/other.css");
        assert_eq!(body_text(response).await, "");
    }

    #[tokio::test]
    async fn test_redirect_status_is_preserved() {
        for status in [301, 303, 307, 308] {
            let fetched = upstream(status, &[("location", "https://b.com/x.css")], "");
            let response = adapter()
                .adapt(&target("http://a.com/style.css"), Ok(fetched))
                .await
                .unwrap();
            assert_eq!(response.status().as_u16(), status);
            assert_eq!(response.headers()["location"], "/https://b.com/x.css");
        }
    }

    #[tokio::test]
    async fn test_redirect_without_location() {
        let fetched = upstream(301, &[], "");
        let err = adapter()
            .adapt(&target("http://a.com/style.css"), Ok(fetched))
            .await
            .unwrap_err();
        assert!(matches!(err, ProxyError::InvalidRedirect));
    }

    #[tokio::test]
    async fn test_not_modified_passes_through() {
        let fetched = upstream(304, &[("etag", "\"v1\"")], "");
        let response = adapter()
            .adapt(&target("http://a.com/style.css"), Ok(fetched))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
        assert!(!response.headers().contains_key("location"));
    }

    #[tokio::test]
    async fn test_fetch_errors_propagate() {
        let err = adapter()
            .adapt(
                &target("http://a.com/style.css"),
                Err(FetchError::ConnectionRefused {
                    detail: "tcp connect error".into(),
                }),
            )
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "unable to connect to the target");
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_body_times_out() {
        let fetched = UpstreamResponse {
            status: StatusCode::OK,
            headers: HeaderMap::from_iter([(header::CONTENT_TYPE, HeaderValue::from_static("text/css"))]),
            body: stream::pending().boxed(),
        };
        let err = adapter()
            .adapt(&target("http://a.com/style.css"), Ok(fetched))
            .await
            .unwrap_err();
        assert!(matches!(err, ProxyError::Timeout(_)));
        assert_eq!(err.status_code(), StatusCode::GATEWAY_TIMEOUT);
    }
}
