//! Upstream fetch subsystem.
//!
//! # Data Flow
//! ```text
//! Resolved Target + inbound method/headers/body
//!     → client.rs (Transport: send, decompress, classify failures)
//!     → UpstreamResponse { status, headers, body stream }
//!     → body.rs (buffer the whole body, bounded in time and size)
//! ```
//!
//! # Design Decisions
//! - The transport is a trait so the adapter and handler can be driven by
//!   an in-memory origin in tests
//! - Redirects are never followed here; the response adapter turns them into
//!   proxy redirects
//! - Nothing is retried and nothing is cached

pub mod body;
pub mod client;

pub use body::read_body;
pub use client::{
    BodyStream, FetchError, HttpTransport, Transport, UpstreamRequest, UpstreamResponse,
};
