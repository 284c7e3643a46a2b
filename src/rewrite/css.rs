//! `@import` URL rewriting.
//!
//! Imports are located with a pattern rather than a full CSS parser. Each
//! import URL falls into one of three classes:
//! - absolute (`scheme://host/...`): prefixed with `/` as-is
//! - origin-relative (`/path`, `//host/path`): resolved against the
//!   stylesheet's own URL, then prefixed
//! - page-relative (anything else): left alone, the browser already resolves
//!   it against the proxied stylesheet URL
//!
//! A `/` path that already wraps an absolute URL is a proxy path produced by
//! an earlier pass and is left alone, so rewriting is idempotent.

use std::borrow::Cow;

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

use super::{ImportRewriter, RewriteContext};
use crate::routing::{ProxyPath, ROUTE_PREFIX};

static IMPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"@import\s*(?:url\(\s*)?(?:"(?P<double>[^"\n]*)"|'(?P<single>[^'\n]*)'|(?P<bare>[^\s'"();]+)\s*\))"#,
    )
    .expect("invalid @import regex")
});

static ABSOLUTE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*://").expect("invalid absolute url regex"));

/// The default rewriter, backed by [`proxy_imports`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PatternImportRewriter;

impl ImportRewriter for PatternImportRewriter {
    fn rewrite(&self, css: &str, context: &RewriteContext) -> String {
        proxy_imports(css, context).into_owned()
    }
}

/// Rewrite every `@import` URL in `css` so that it loads through the proxy.
pub fn proxy_imports<'a>(css: &'a str, context: &RewriteContext) -> Cow<'a, str> {
    let base = Url::parse(&context.target_url).ok();
    let mut out = String::new();
    let mut copied = 0;

    for caps in IMPORT.captures_iter(css) {
        let Some(found) = caps
            .name("double")
            .or_else(|| caps.name("single"))
            .or_else(|| caps.name("bare"))
        else {
            continue;
        };

        if let Some(fixed) = proxied_import_url(found.as_str(), base.as_ref()) {
            out.push_str(&css[copied..found.start()]);
            out.push_str(fixed.as_str());
            copied = found.end();
        }
    }

    if copied == 0 {
        return Cow::Borrowed(css);
    }
    out.push_str(&css[copied..]);
    Cow::Owned(out)
}

/// The replacement for one import URL, or `None` to leave it untouched.
fn proxied_import_url(import_url: &str, base: Option<&Url>) -> Option<ProxyPath> {
    if import_url.is_empty() {
        return None;
    }

    if ABSOLUTE.is_match(import_url) {
        return Some(ProxyPath::new(import_url));
    }

    if !import_url.starts_with('/') || is_proxy_path(import_url) {
        return None;
    }

    let resolved = base?.join(import_url).ok()?;
    Some(ProxyPath::new(resolved.as_str()))
}

fn is_proxy_path(path: &str) -> bool {
    path.strip_prefix(ROUTE_PREFIX)
        .is_some_and(|rest| ABSOLUTE.is_match(rest))
}
