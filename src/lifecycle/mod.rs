//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Validated config → metrics exporter → transport → bind HTTP/HTTPS → serve
//!
//! Shutdown (shutdown.rs):
//!     Trigger → listeners stop accepting → in-flight requests drain → exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Fail fast: a listener that cannot bind is fatal
//! - Both listeners share one router and one shutdown trigger

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{start, visit_url, StartupError};
