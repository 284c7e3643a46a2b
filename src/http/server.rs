//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the catch-all proxy handler
//! - Wire up middleware (request ID, tracing, CORS, concurrency limit)
//! - Serve plain HTTP and, optionally, HTTPS from the same router
//! - Orchestrate one request: resolve target → fetch → adapt response
//!
//! # Design Decisions
//! - Timeouts and size limits are enforced inside the handler, so each one
//!   surfaces as a JSON `ProxyError` with a status naming the party at fault

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::{header, request::Parts, HeaderValue, Request},
    response::{IntoResponse, Redirect, Response},
    routing::any,
    Router,
};
use axum_server::tls_rustls::RustlsConfig;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::ProxyConfig;
use crate::error::ProxyError;
use crate::http::request::{
    raw_request, read_request_body, MakeRequestUuid, RequestIdExt, X_REQUEST_ID,
};
use crate::http::response::{ResponseAdapter, REDIRECT_CODES};
use crate::observability::{metrics, tracing::make_request_span};
use crate::rewrite::PatternImportRewriter;
use crate::routing::{target, ProxyPath, Resolution, ROUTE_PREFIX};
use crate::security::{cors::cors_layer, headers::forwarded_request_headers};
use crate::upstream::{FetchError, HttpTransport, Transport, UpstreamRequest};

/// How long in-flight HTTPS connections get to finish after shutdown.
const TLS_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Application state injected into handlers.
pub struct AppState<T> {
    pub transport: Arc<T>,
    pub adapter: Arc<ResponseAdapter<PatternImportRewriter>>,
    pub max_request_body_bytes: usize,
    /// Bound on reading the client's body, and separately on the target's
    /// response headers.
    pub request_timeout: Duration,
}

impl<T> Clone for AppState<T> {
    fn clone(&self) -> Self {
        Self {
            transport: self.transport.clone(),
            adapter: self.adapter.clone(),
            max_request_body_bytes: self.max_request_body_bytes,
            request_timeout: self.request_timeout,
        }
    }
}

/// HTTP server for the CSS proxy.
#[derive(Clone)]
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
}

impl HttpServer {
    /// Create a server that fetches targets over the network.
    pub fn new(config: ProxyConfig) -> Result<Self, FetchError> {
        let transport = HttpTransport::new(&config.timeouts)?;
        Ok(Self::with_transport(config, transport))
    }

    /// Create a server backed by a custom transport.
    pub fn with_transport<T: Transport>(config: ProxyConfig, transport: T) -> Self {
        let adapter = ResponseAdapter::new(
            PatternImportRewriter,
            Duration::from_secs(config.timeouts.body_secs),
            config.limits.max_stylesheet_bytes,
        );

        let state = AppState {
            transport: Arc::new(transport),
            adapter: Arc::new(adapter),
            max_request_body_bytes: config.limits.max_request_body_bytes,
            request_timeout: Duration::from_secs(config.timeouts.request_secs),
        };

        let router = Self::build_router(&config, state);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router<T: Transport>(config: &ProxyConfig, state: AppState<T>) -> Router {
        Router::new()
            .route(ROUTE_PREFIX, any(proxy_handler::<T>))
            .route("/{*target}", any(proxy_handler::<T>))
            .with_state(state)
            .layer(GlobalConcurrencyLimitLayer::new(
                config.listener.max_concurrent_requests,
            ))
            .layer(cors_layer(&config.cors))
            .layer(PropagateRequestIdLayer::new(X_REQUEST_ID.clone()))
            .layer(TraceLayer::new_for_http().make_span_with(make_request_span::<Body>))
            .layer(SetRequestIdLayer::new(X_REQUEST_ID.clone(), MakeRequestUuid))
    }

    /// Serve plain HTTP until `shutdown` fires.
    pub async fn run(
        &self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router.clone())
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!(address = %addr, "HTTP server stopped");
        Ok(())
    }

    /// Serve HTTPS on `addr` until `shutdown` fires.
    pub async fn run_tls(
        &self,
        addr: SocketAddr,
        tls: RustlsConfig,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        tracing::info!(address = %addr, "HTTPS server starting");

        let handle = axum_server::Handle::new();
        let drain = handle.clone();
        tokio::spawn(async move {
            let _ = shutdown.recv().await;
            drain.graceful_shutdown(Some(TLS_DRAIN_TIMEOUT));
        });

        axum_server::bind_rustls(addr, tls)
            .handle(handle)
            .serve(self.router.clone().into_make_service())
            .await?;

        tracing::info!(address = %addr, "HTTPS server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }
}

/// Main proxy handler.
/// Resolves the target, fetches it and adapts the response.
async fn proxy_handler<T: Transport>(
    State(state): State<AppState<T>>,
    request: Request<Body>,
) -> Response {
    let start_time = Instant::now();
    let (parts, body) = request.into_parts();
    let method = parts.method.to_string();

    let (response, outcome) = match handle(&state, &parts, body).await {
        Ok(handled) => handled,
        Err(e) => {
            let outcome = e.outcome();
            if e.status_code().is_server_error() {
                tracing::warn!(request_id = %parts.request_id(), error = %e, "Proxy request failed");
            } else {
                tracing::info!(request_id = %parts.request_id(), error = %e, "Proxy request rejected");
            }
            (e.into_response(), outcome)
        }
    };

    metrics::record_request(&method, response.status().as_u16(), outcome, start_time);
    response
}

async fn handle<T: Transport>(
    state: &AppState<T>,
    parts: &Parts,
    body: Body,
) -> Result<(Response, &'static str), ProxyError> {
    let raw = raw_request(parts);

    let target = match target::resolve(&raw)? {
        Resolution::Redirect(path) => {
            tracing::debug!(
                request_id = %parts.request_id(),
                path = %raw.path,
                referrer = ?raw.referrer_path,
                location = %path,
                "Redirecting to canonical target"
            );
            return Ok((redirect(&path), "redirect"));
        }
        Resolution::Fetch(target) => target,
    };

    let body = read_request_body(body, state.max_request_body_bytes, state.request_timeout).await?;

    tracing::debug!(
        request_id = %parts.request_id(),
        method = %parts.method,
        target_url = %target.raw(),
        "Fetching target"
    );

    let upstream = UpstreamRequest {
        method: parts.method.clone(),
        url: target.url().clone(),
        headers: forwarded_request_headers(&parts.headers),
        body,
    };
    let fetched = tokio::time::timeout(state.request_timeout, state.transport.fetch(upstream))
        .await
        .map_err(|_| ProxyError::ResponseTimeout(state.request_timeout))?;
    let response = state.adapter.adapt(&target, fetched).await?;

    let outcome = if REDIRECT_CODES.contains(&response.status()) {
        "upstream_redirect"
    } else {
        "rewritten"
    };
    Ok((response, outcome))
}

/// A redirect that clients must replay unchanged and caches must not keep.
fn redirect(path: &ProxyPath) -> Response {
    (
        [(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"))],
        Redirect::temporary(path.as_str()),
    )
        .into_response()
}
