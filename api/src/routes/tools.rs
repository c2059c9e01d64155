use axum::extract::State;
use axum::{Json, Router, routing::post};
use galuchat_mcp_runtime::definitions::{RESOLVE_POINTS, SUMMARIZE_STAYS};
use galuchat_mcp_runtime::tools::{
    ResolvePointsArgs, ResolvePointsOutput, SummarizeStaysArgs, SummarizeStaysOutput,
};

use crate::error::AppError;
use crate::extract::AppJson;
use crate::state::{AppState, ServiceSettings};

pub fn router(settings: &ServiceSettings) -> Router<AppState> {
    Router::new()
        .route(
            &settings.path(&format!("/tools/{RESOLVE_POINTS}")),
            post(resolve_points),
        )
        .route(
            &settings.path(&format!("/tools/{SUMMARIZE_STAYS}")),
            post(summarize_stays),
        )
}

/// Reverse-geocode a batch of points
///
/// Invalid items are listed in `errors` and skipped; the rest are resolved in
/// one provider call. Provider failures abort the whole call.
#[utoipa::path(
    post,
    path = "/mcp/tools/resolve_points",
    request_body = ResolvePointsArgs,
    responses(
        (status = 200, description = "Resolved batch", body = ResolvePointsOutput),
        (status = 400, description = "Malformed body, strict-mode rejection or oversized batch", body = galuchat_core::error::ApiError),
        (status = 429, description = "Too many requests from this client", body = galuchat_core::error::ApiError),
        (status = 502, description = "Provider failed or returned a short result", body = galuchat_core::error::ApiError),
        (status = 503, description = "Provider rate-limited the batch", body = galuchat_core::error::ApiError)
    ),
    tag = "tools"
)]
pub async fn resolve_points(
    State(state): State<AppState>,
    AppJson(args): AppJson<ResolvePointsArgs>,
) -> Result<Json<ResolvePointsOutput>, AppError> {
    let output = state.mcp.dispatcher().resolve_points(args).await?;
    Ok(Json(output))
}

/// Group a time-ordered trajectory into stays
#[utoipa::path(
    post,
    path = "/mcp/tools/summarize_stays",
    request_body = SummarizeStaysArgs,
    responses(
        (status = 200, description = "Stays in chronological order", body = SummarizeStaysOutput),
        (status = 400, description = "Malformed body, bad params, strict-mode rejection or oversized batch", body = galuchat_core::error::ApiError),
        (status = 429, description = "Too many requests from this client", body = galuchat_core::error::ApiError),
        (status = 502, description = "Provider failed or returned a short result", body = galuchat_core::error::ApiError),
        (status = 503, description = "Provider rate-limited the batch", body = galuchat_core::error::ApiError)
    ),
    tag = "tools"
)]
pub async fn summarize_stays(
    State(state): State<AppState>,
    AppJson(args): AppJson<SummarizeStaysArgs>,
) -> Result<Json<SummarizeStaysOutput>, AppError> {
    let output = state.mcp.dispatcher().summarize_stays(args).await?;
    Ok(Json(output))
}
