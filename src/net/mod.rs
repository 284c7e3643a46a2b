//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → plain HTTP: accepted by axum::serve
//!     → HTTPS: tls.rs (certificate loading) → axum-server TLS acceptor
//!     → Hand off to HTTP layer
//! ```
//!
//! # Design Decisions
//! - TLS is optional; a missing or unreadable certificate fails startup

pub mod tls;
