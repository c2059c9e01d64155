use std::net::SocketAddr;

use axum::Router;
use galuchat_mcp_runtime::config::{ResolverConfig, ToolLimits};
use galuchat_mcp_runtime::rpc::McpServer;
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod error;
mod extract;
mod middleware;
mod routes;
mod state;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Galuchat Tools API",
        version = "0.1.0",
        description = "Reverse geocoding of coordinate batches and stay summaries over trajectories, for agents and MCP clients."
    ),
    paths(
        routes::health::health_check,
        routes::tools::resolve_points,
        routes::tools::summarize_stays,
        routes::rpc::rpc_post,
        routes::manifest::get_manifest,
    ),
    components(schemas(
        HealthResponse,
        galuchat_core::error::ApiError,
        galuchat_core::error::ErrorCode,
        galuchat_core::points::Granularity,
        galuchat_core::points::GeocodeResult,
        galuchat_core::points::RejectedPoint,
        galuchat_core::stays::Stay,
        galuchat_core::stays::DwellStay,
        galuchat_core::stays::StaySummary,
        galuchat_mcp_runtime::tools::ResolvePointsArgs,
        galuchat_mcp_runtime::tools::ResolvePointsOutput,
        galuchat_mcp_runtime::tools::PointResult,
        galuchat_mcp_runtime::tools::SummarizeStaysArgs,
        galuchat_mcp_runtime::tools::SummarizeStaysOutput,
        galuchat_mcp_runtime::tools::StayParams,
    ))
)]
struct ApiDoc;

#[derive(Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Full router: tool routes and `/rpc` share one per-IP limiter.
fn build_app(app_state: state::AppState) -> Router {
    let settings = app_state.settings.clone();
    let tool_limit = middleware::rate_limit::tool_layer(settings.rate_limit_per_sec);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .merge(routes::health::router())
        .merge(routes::manifest::router(&settings))
        .merge(
            routes::tools::router(&settings)
                .merge(routes::rpc::router(&settings))
                .layer(tool_limit),
        )
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::cors::build_cors_layer()),
        )
        .with_state(app_state)
}

#[tokio::main]
async fn main() {
    // Load .env if present (dev only)
    let _ = dotenvy::dotenv();

    // Structured JSON logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "galuchat_api=debug,galuchat_mcp_runtime=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let dispatcher = ResolverConfig::from_env()
        .map_err(|e| e.to_string())
        .and_then(|resolver| {
            let limits = ToolLimits::from_env().map_err(|e| e.to_string())?;
            galuchat_mcp_runtime::build_dispatcher(resolver, limits)
        });
    let dispatcher = match dispatcher {
        Ok(dispatcher) => dispatcher,
        Err(err) => {
            tracing::error!(event = "config_error", error = %err, "Invalid configuration");
            std::process::exit(1);
        }
    };

    let settings = state::ServiceSettings::from_env();
    tracing::info!(
        event = "service_config",
        url_prefix = %settings.url_prefix,
        rate_limit_per_sec = settings.rate_limit_per_sec,
        max_points = dispatcher.limits().max_points,
        "Loaded configuration"
    );

    let app = build_app(state::AppState {
        mcp: McpServer::new(dispatcher),
        settings,
    });

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3000);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Galuchat API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind listener");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("Server error");
}
