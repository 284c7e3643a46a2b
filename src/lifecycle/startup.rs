//! Startup orchestration.
//!
//! # Responsibilities
//! - Start the metrics exporter when enabled
//! - Build the upstream transport and router
//! - Bind the HTTP listener and, when configured, the HTTPS listener
//! - Serve until shutdown and report the first listener failure
//!
//! # Design Decisions
//! - Fail fast: a bad address, certificate or bind error is fatal
//! - Listeners start last (traffic only when ready)

use std::net::SocketAddr;
use std::path::Path;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::ProxyConfig;
use crate::http::HttpServer;
use crate::lifecycle::Shutdown;
use crate::net::tls::load_tls_config;
use crate::observability::metrics;
use crate::routing::{assume_http, ROUTE_PREFIX};
use crate::upstream::FetchError;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to build the upstream client: {0}")]
    Transport(#[from] FetchError),

    #[error("invalid {kind} address '{address}'")]
    Address { kind: &'static str, address: String },

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to load TLS certificate: {0}")]
    Tls(#[source] std::io::Error),

    #[error("{listener} listener failed: {source}")]
    Serve {
        listener: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// The URL to open in a browser to fetch `target` through a proxy at `base`.
pub fn visit_url(base: &str, target: &str) -> String {
    format!(
        "{}{}{}",
        base.trim_end_matches('/'),
        ROUTE_PREFIX,
        assume_http(target)
    )
}

/// Run the proxy until `shutdown` fires.
///
/// `target`, when given, is only used to log a ready-to-open URL.
pub async fn start(
    config: ProxyConfig,
    shutdown: &Shutdown,
    target: Option<&str>,
) -> Result<(), StartupError> {
    if config.observability.metrics_enabled {
        let addr = parse_addr("metrics", &config.observability.metrics_address)?;
        metrics::init_metrics(addr);
    }

    let tls_listener = match &config.listener.tls {
        Some(tls) => {
            let addr = parse_addr("HTTPS", &tls.bind_address)?;
            let rustls = load_tls_config(Path::new(&tls.cert_path), Path::new(&tls.key_path))
                .await
                .map_err(StartupError::Tls)?;
            Some((addr, rustls))
        }
        None => None,
    };

    let server = HttpServer::new(config.clone())?;

    let listener = TcpListener::bind(&config.listener.bind_address)
        .await
        .map_err(|source| StartupError::Bind {
            address: config.listener.bind_address.clone(),
            source,
        })?;
    let local_addr = listener.local_addr().map_err(|source| StartupError::Bind {
        address: config.listener.bind_address.clone(),
        source,
    })?;

    tracing::info!(
        address = %local_addr,
        https = tls_listener.is_some(),
        request_timeout_secs = config.timeouts.request_secs,
        body_timeout_secs = config.timeouts.body_secs,
        "Listening for connections"
    );

    let tls_task = tls_listener.map(|(addr, rustls)| {
        let server = server.clone();
        let shutdown = shutdown.subscribe();
        if let Some(target) = target {
            tracing::info!(url = %visit_url(&format!("https://{}", addr), target), "Visit");
        }
        tokio::spawn(async move { server.run_tls(addr, rustls, shutdown).await })
    });

    if let Some(target) = target {
        tracing::info!(url = %visit_url(&format!("http://{}", local_addr), target), "Visit");
    }

    let http_result = server.run(listener, shutdown.subscribe()).await;

    if let Some(task) = tls_task {
        match task.await {
            Ok(Err(source)) => {
                return Err(StartupError::Serve {
                    listener: "HTTPS",
                    source,
                })
            }
            Err(e) => tracing::error!(error = %e, "HTTPS listener task panicked"),
            Ok(Ok(())) => {}
        }
    }

    http_result.map_err(|source| StartupError::Serve {
        listener: "HTTP",
        source,
    })
}

fn parse_addr(kind: &'static str, address: &str) -> Result<SocketAddr, StartupError> {
    address.parse().map_err(|_| StartupError::Address {
        kind,
        address: address.to_string(),
    })
}
