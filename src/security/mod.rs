//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → cors.rs (cross-origin policy, preflight answers)
//!     → headers.rs (scrub what is forwarded to the target)
//! Target response:
//!     → headers.rs (drop framing headers the proxy recomputes)
//! ```
//!
//! # Design Decisions
//! - Only CSS leaves the proxy; the content-type gate lives in the response
//!   adapter next to the rewrite it protects
//! - CORS policy comes from configuration, never from the target

pub mod cors;
pub mod headers;
