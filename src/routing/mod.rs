//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (path-and-query, Referer)
//!     → target.rs (strip prefix, classify, resolve)
//!     → Return: Fetch(Target) | Redirect(ProxyPath) | TargetError
//! ```
//!
//! # Design Decisions
//! - Every path under the prefix is a candidate target; there is no route table
//! - Relative targets are never fetched in place, they always round-trip
//!   through a redirect so the client's next `Referer` names the real origin
//! - Pure functions only: no I/O, no shared state

pub mod target;

use std::fmt;

pub use target::{assume_http, resolve, RawRequest, Resolution, Target, TargetError};

/// Prefix under which every proxied target is mounted.
pub const ROUTE_PREFIX: &str = "/";

/// Strip the route prefix from a request path, yielding the candidate target.
pub fn strip_prefix(path: &str) -> &str {
    path.strip_prefix(ROUTE_PREFIX).unwrap_or(path)
}

/// The path under this proxy that makes it fetch a given target URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyPath(String);

impl ProxyPath {
    pub fn new(target_url: &str) -> Self {
        Self(format!("{}{}", ROUTE_PREFIX, target_url))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Recover the target URL this path points at.
    pub fn target_url(&self) -> &str {
        strip_prefix(&self.0)
    }
}

impl fmt::Display for ProxyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
