//! Target resolution.
//!
//! # Responsibilities
//! - Turn the path after the route prefix into an upstream URL
//! - Recover an origin for relative targets from the client's `Referer`
//! - Normalize bare origins (`http://foo.com`) so they behave as directories
//! - Reject targets that lack a protocol or hostname before anything is fetched
//!
//! # Design Decisions
//! - Classification is textual, resolution uses the `url` crate
//! - Already-canonical absolute targets are fetched byte-for-byte as given
//! - Relative targets always produce a redirect, even when the host is obvious

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;
use url::Url;

use super::{strip_prefix, ProxyPath};

static SCHEME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*:").expect("invalid scheme regex"));

static HAS_AUTHORITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:\w+:)?//").expect("invalid authority regex"));

/// Why a target cannot be fetched. All of these are the client's fault.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TargetError {
    #[error("a target is required but was not provided")]
    Missing,

    #[error("invalid target: no hostname")]
    NoHostname,

    #[error("invalid target: no protocol")]
    NoProtocol,

    #[error("invalid target: {0}")]
    Malformed(String),
}

/// The parts of an inbound request that decide where it goes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRequest {
    /// Path and query as received, route prefix included.
    pub path: String,
    /// Path and query of the `Referer`, if the client sent one.
    pub referrer_path: Option<String>,
}

impl RawRequest {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            referrer_path: None,
        }
    }

    pub fn with_referrer(mut self, referrer_path: impl Into<String>) -> Self {
        self.referrer_path = Some(referrer_path.into());
        self
    }
}

/// A fully-qualified upstream URL, guaranteed to have a scheme and a host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    url: Url,
    raw: String,
}

impl Target {
    /// Validate an absolute target without any normalization.
    pub fn parse(raw: &str) -> Result<Self, TargetError> {
        validate(raw)
    }

    pub fn scheme(&self) -> &str {
        self.url.scheme()
    }

    pub fn host(&self) -> &str {
        self.url.host_str().unwrap_or_default()
    }

    pub fn path(&self) -> &str {
        self.url.path()
    }

    /// The target exactly as the client wrote it.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn proxy_path(&self) -> ProxyPath {
        ProxyPath::new(&self.raw)
    }
}

/// Outcome of a successful resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Fetch this target now.
    Fetch(Target),
    /// Send the client to the canonical proxy path first.
    Redirect(ProxyPath),
}

/// Decide what to do with an inbound request.
pub fn resolve(request: &RawRequest) -> Result<Resolution, TargetError> {
    let target = strip_prefix(&request.path);

    if is_relative(target) {
        let resolved = resolve_relative(target, request.referrer_path.as_deref())?;
        return Ok(Resolution::Redirect(ProxyPath::new(resolved.as_str())));
    }

    if lacks_path(target) {
        if let Ok(normalized) = Url::parse(target) {
            if normalized.as_str() != target {
                return Ok(Resolution::Redirect(ProxyPath::new(normalized.as_str())));
            }
        }
    }

    validate(target).map(Resolution::Fetch)
}

fn resolve_relative(target: &str, referrer_path: Option<&str>) -> Result<Url, TargetError> {
    match referrer_path {
        Some(referrer) => {
            let base = assume_http(strip_prefix(referrer));
            let base = parse_with_host(&base).ok_or_else(|| absent_host(target))?;
            let resolved = base.join(target).map_err(|_| absent_host(target))?;
            match resolved.host_str() {
                Some(host) if !host.is_empty() => Ok(resolved),
                _ => Err(absent_host(target)),
            }
        }
        None => parse_with_host(&assume_http(target)).ok_or_else(|| absent_host(target)),
    }
}

fn validate(target: &str) -> Result<Target, TargetError> {
    if !SCHEME.is_match(target) {
        return Err(TargetError::NoProtocol);
    }
    if authority(target).is_some_and(str::is_empty) {
        return Err(TargetError::NoHostname);
    }

    let url = Url::parse(target).map_err(|e| match e {
        url::ParseError::EmptyHost => TargetError::NoHostname,
        other => TargetError::Malformed(other.to_string()),
    })?;

    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(Target {
            url,
            raw: target.to_owned(),
        }),
        _ => Err(TargetError::NoHostname),
    }
}

/// No scheme and no leading `//`.
fn is_relative(target: &str) -> bool {
    !SCHEME.is_match(target) && !target.starts_with("//")
}

/// Prefix `http://` unless the string already starts with `scheme://` or `//`.
pub fn assume_http(target: &str) -> String {
    if HAS_AUTHORITY.is_match(target) {
        target.to_owned()
    } else {
        format!("http://{}", target)
    }
}

/// Parse a URL that is expected to carry a host, treating `//host` as `http:`.
fn parse_with_host(candidate: &str) -> Option<Url> {
    if authority(candidate).is_some_and(str::is_empty) {
        return None;
    }
    let url = if candidate.starts_with("//") {
        Url::parse(&format!("http:{}", candidate))
    } else {
        Url::parse(candidate)
    }
    .ok()?;

    match url.host_str() {
        Some(host) if !host.is_empty() => Some(url),
        _ => None,
    }
}

/// With nothing to go on, the resolved URL degenerates to `http:///`.
fn absent_host(target: &str) -> TargetError {
    if target.is_empty() || target == "/" {
        TargetError::Missing
    } else {
        TargetError::NoHostname
    }
}

/// Everything after the scheme, or the whole string if there is none.
fn after_scheme(url: &str) -> &str {
    match SCHEME.find(url) {
        Some(m) => &url[m.end()..],
        None => url,
    }
}

/// The authority component, if the URL writes one with `//`.
fn authority(url: &str) -> Option<&str> {
    let rest = after_scheme(url).strip_prefix("//")?;
    let end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    Some(&rest[..end])
}

/// True when nothing (or only a query/fragment) follows the authority.
fn lacks_path(url: &str) -> bool {
    let rest = after_scheme(url);
    match rest.strip_prefix("//") {
        Some(rest) => {
            let end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
            !rest[end..].starts_with('/')
        }
        None => !rest.starts_with('/'),
    }
}
