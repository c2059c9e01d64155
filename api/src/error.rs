use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use galuchat_core::error::{ApiError, ErrorCode, InvalidInput};
use galuchat_mcp_runtime::resolver::ResolveError;
use galuchat_mcp_runtime::tools::ToolError;

/// Internal error type that converts to structured API responses
#[derive(Debug)]
pub enum AppError {
    /// Request body could not be decoded (400)
    Validation {
        message: String,
        field: Option<String>,
        docs_hint: Option<String>,
    },
    /// Request rejected before resolution (400)
    InvalidInput(InvalidInput),
    /// Provider failed the whole batch (502, or 503 when it rate-limited us)
    Provider(ResolveError),
    /// Internal error (500)
    Internal(String),
}

impl From<ToolError> for AppError {
    fn from(err: ToolError) -> Self {
        match err {
            ToolError::InvalidInput(invalid) => AppError::InvalidInput(invalid),
            ToolError::Resolve(resolve) => AppError::Provider(resolve),
        }
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation { .. } | AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::Provider(ResolveError::RateLimit) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Provider(_) => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let request_id = uuid::Uuid::now_v7().to_string();
        let status = self.status();

        let api_error = match self {
            AppError::Validation {
                message,
                field,
                docs_hint,
            } => ApiError {
                error: ErrorCode::InvalidInput,
                message,
                location: field.map(|field| serde_json::json!({ "field": field })),
                request_id,
                docs_hint,
            },
            AppError::InvalidInput(invalid) => ApiError {
                error: ErrorCode::InvalidInput,
                message: invalid.to_string(),
                location: Some(invalid.location()),
                request_id,
                docs_hint: Some(
                    "Fix the reported item or field and resend; nothing was resolved.".to_string(),
                ),
            },
            AppError::Provider(err) => {
                tracing::warn!(
                    event = "provider_failure",
                    code = err.code().as_str(),
                    error = %err,
                    request_id = %request_id,
                    "Provider failed the batch"
                );
                let docs_hint = match err {
                    ResolveError::RateLimit | ResolveError::Api(_) => {
                        Some("The geocoding provider is unavailable; retry later.".to_string())
                    }
                    ResolveError::OutOfCoverage(_) => None,
                };
                ApiError {
                    error: err.code(),
                    message: err.to_string(),
                    location: None,
                    request_id,
                    docs_hint,
                }
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                ApiError {
                    error: ErrorCode::Internal,
                    message: "An internal error occurred".to_string(),
                    location: None,
                    request_id,
                    docs_hint: None,
                }
            }
        };

        (status, Json(api_error)).into_response()
    }
}
