//! Stylesheet rewriting.
//!
//! # Data Flow
//! ```text
//! Buffered upstream CSS (text)
//!     → css.rs (locate @import statements, classify their URLs)
//!     → Rewritten CSS with imports routed back through the proxy
//! ```
//!
//! # Design Decisions
//! - Callers only see the `ImportRewriter` trait, so the pattern matcher can
//!   be replaced by a structural CSS parser without touching them
//! - Only the URL text is replaced; quotes, `url(...)` and everything else
//!   stay byte-identical

pub mod css;

pub use css::{proxy_imports, PatternImportRewriter};

/// Per-response input to a rewrite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteContext {
    /// URL of the stylesheet being rewritten; origin-relative imports
    /// are resolved against it.
    pub target_url: String,
}

impl RewriteContext {
    pub fn new(target_url: impl Into<String>) -> Self {
        Self {
            target_url: target_url.into(),
        }
    }
}

/// Rewrites `@import` URLs in a stylesheet so they route through the proxy.
pub trait ImportRewriter: Send + Sync + std::fmt::Debug {
    fn rewrite(&self, css: &str, context: &RewriteContext) -> String;
}
