//! Cross-origin policy.

use axum::http::HeaderName;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::config::CorsConfig;

/// Build the CORS layer applied to every proxied response.
pub fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let origin = if config.allowed_origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(
            config
                .allowed_origins
                .iter()
                .filter_map(|o| o.parse().ok()),
        )
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(Any)
        .allow_headers(header_names(&config.allowed_headers))
        .expose_headers(header_names(&config.exposed_headers))
}

fn header_names(names: &[String]) -> Vec<HeaderName> {
    names
        .iter()
        .filter_map(|name| HeaderName::from_bytes(name.as_bytes()).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_names_are_normalized() {
        let names = header_names(&["Accept".into(), "If-None-Match".into()]);
        assert_eq!(names, [HeaderName::from_static("accept"), HeaderName::from_static("if-none-match")]);
    }
}
