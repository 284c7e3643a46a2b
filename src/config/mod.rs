//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!     → handed to HttpServer::new at construction
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; there is no process-wide config state
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    CorsConfig, LimitsConfig, ListenerConfig, LogFormat, ObservabilityConfig, ProxyConfig,
    TimeoutConfig, TlsConfig,
};
pub use validation::ValidationError;
