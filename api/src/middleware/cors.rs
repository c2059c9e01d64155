use axum::http::{HeaderName, HeaderValue, Method};
use tower_http::cors::CorsLayer;

const CONNECTOR_ORIGINS: &[&str] = &[
    "https://chatgpt.com",
    "https://chat.openai.com",
    "https://claude.ai",
];

/// Build a CORS layer from the `GALUCHAT_CORS_ORIGINS` env var.
///
/// Origins are a comma-separated list (default `http://localhost:3000`);
/// connector origins are always appended.
pub fn build_cors_layer() -> CorsLayer {
    let origins_str = std::env::var("GALUCHAT_CORS_ORIGINS")
        .unwrap_or_else(|_| "http://localhost:3000".to_string());
    CorsLayer::new()
        .allow_origin(origin_values(&origins_str))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            HeaderName::from_static("content-type"),
            HeaderName::from_static("mcp-protocol-version"),
        ])
        .max_age(std::time::Duration::from_secs(3600))
}

fn origin_values(configured: &str) -> Vec<HeaderValue> {
    let mut origins: Vec<String> = configured
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
        .collect();

    for connector_origin in CONNECTOR_ORIGINS {
        if !origins
            .iter()
            .any(|existing| existing.eq_ignore_ascii_case(connector_origin))
        {
            origins.push((*connector_origin).to_string());
        }
    }

    origins
        .into_iter()
        .filter_map(|origin| origin.parse::<HeaderValue>().ok())
        .collect()
}
