//! css-proxy
//!
//! Serves third-party stylesheets (and everything they `@import`) from one
//! origin, so a single cross-origin policy applies to all of them.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request  /http://origin/style.css
//!     ──────────────▶ http::server ──▶ routing::target ──▶ upstream::Transport ──▶ Origin
//!                          │               │ relative?                │
//!                          │               └─▶ 307 to /http://...     │
//!                          ▼                                          ▼
//!     Client Response ◀── http::response (redirects, CSS gate, rewrite::css)
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use css_proxy::config::{load_config, validation::validate_config, ProxyConfig};
use css_proxy::lifecycle::{self, signals::spawn_signal_listener, Shutdown};
use css_proxy::observability::logging::init_logging;

#[derive(Parser, Debug)]
#[command(name = "css-proxy")]
#[command(about = "Proxy stylesheets and their @imports through one origin", long_about = None)]
struct Cli {
    /// Configuration file (TOML); defaults apply when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// HTTPS port (requires [listener.tls] in the configuration)
    #[arg(short, long)]
    port: Option<u16>,

    /// Plain HTTP port
    #[arg(short = 'i', long)]
    insecure_port: Option<u16>,

    /// Log a ready-to-open proxy URL for this stylesheet
    #[arg(short, long)]
    target: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match build_config(&cli) {
        Ok(config) => config,
        Err(message) => {
            eprintln!("css-proxy: {}", message);
            return ExitCode::FAILURE;
        }
    };

    init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "css-proxy starting");

    let shutdown = Shutdown::new();
    spawn_signal_listener(shutdown.clone());

    match lifecycle::start(config, &shutdown, cli.target.as_deref()).await {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "css-proxy failed");
            ExitCode::FAILURE
        }
    }
}

/// Load the configuration file (if any) and apply command-line overrides.
fn build_config(cli: &Cli) -> Result<ProxyConfig, String> {
    let mut config = match &cli.config {
        Some(path) => load_config(path).map_err(|e| format!("{}: {}", path.display(), e))?,
        None => ProxyConfig::default(),
    };

    if let Some(port) = cli.insecure_port {
        config.listener.bind_address = with_port(&config.listener.bind_address, port)?;
    }

    if let Some(port) = cli.port {
        let tls = config
            .listener
            .tls
            .as_mut()
            .ok_or("--port needs a [listener.tls] section with a certificate and key")?;
        tls.bind_address = with_port(&tls.bind_address, port)?;
    }

    validate_config(&config).map_err(|errors| {
        errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    })?;

    Ok(config)
}

fn with_port(address: &str, port: u16) -> Result<String, String> {
    let mut addr: SocketAddr = address
        .parse()
        .map_err(|_| format!("invalid bind address '{}'", address))?;
    addr.set_port(port);
    Ok(addr.to_string())
}
