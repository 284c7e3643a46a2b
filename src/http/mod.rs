//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, middleware, catch-all handler)
//!     → request.rs (request ID, raw path-and-query and Referer)
//!     → [routing::target resolves the target or redirects]
//!     → [upstream::Transport fetches it]
//!     → response.rs (redirects, content-type gate, rewrite)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{raw_request, RequestId, RequestIdExt, X_REQUEST_ID};
pub use response::ResponseAdapter;
pub use server::HttpServer;
