//! CSS-only rewriting proxy.
//!
//! Fetches a stylesheet named in the request path, refuses anything that
//! is not CSS, and rewrites its `@import` URLs so nested stylesheets are
//! fetched through the proxy as well.

pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod rewrite;
pub mod routing;
pub mod security;
pub mod upstream;

pub use config::schema::ProxyConfig;
pub use error::ProxyError;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
