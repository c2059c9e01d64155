use axum::extract::{OriginalUri, State};
use axum::http::header::{HOST, LOCATION};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router, routing::get};
use galuchat_mcp_runtime::definitions;
use serde_json::Value;
use url::Url;

use crate::error::AppError;
use crate::state::{AppState, ServiceSettings};

pub fn router(settings: &ServiceSettings) -> Router<AppState> {
    let mut router = Router::new()
        .route(&settings.path("/manifest.json"), get(get_manifest))
        .route(&settings.path("/"), get(redirect_to_manifest));
    if !settings.url_prefix.is_empty() {
        router = router.route(&settings.url_prefix, get(redirect_to_manifest));
    }
    router
}

/// Tool manifest with absolute endpoint URLs
#[utoipa::path(
    get,
    path = "/mcp/manifest.json",
    responses(
        (status = 200, description = "Tool manifest", body = Object)
    ),
    tag = "mcp"
)]
pub async fn get_manifest(
    headers: HeaderMap,
    OriginalUri(uri): OriginalUri,
) -> Result<Json<Value>, AppError> {
    let raw = format!("{}{}", request_base_url(&headers), uri.path());
    let manifest_url = Url::parse(&raw)
        .map_err(|err| AppError::Internal(format!("cannot build manifest URL '{raw}': {err}")))?;
    Ok(Json(definitions::manifest(&manifest_url)))
}

async fn redirect_to_manifest(State(state): State<AppState>) -> Response {
    (
        StatusCode::FOUND,
        [(LOCATION, state.settings.path("/manifest.json"))],
    )
        .into_response()
}

fn request_base_url(headers: &HeaderMap) -> String {
    let forwarded_proto = first_header_token(headers, "x-forwarded-proto");
    let forwarded_host = first_header_token(headers, "x-forwarded-host");
    let host = forwarded_host.or_else(|| {
        headers
            .get(HOST)
            .and_then(|v| v.to_str().ok())
            .map(ToOwned::to_owned)
    });

    if let Some(host) = host {
        let proto = forwarded_proto.unwrap_or_else(|| {
            if host.contains("localhost") || host.starts_with("127.0.0.1") {
                "http".to_string()
            } else {
                "https".to_string()
            }
        });
        return format!("{}://{}", proto.trim_end_matches(':'), host);
    }

    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    format!("http://127.0.0.1:{}", port.trim())
}

fn first_header_token(headers: &HeaderMap, key: &str) -> Option<String> {
    headers
        .get(key)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToOwned::to_owned)
}
