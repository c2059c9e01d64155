use axum::http::{HeaderValue, Response, StatusCode};
use galuchat_core::error::ErrorCode;
use tower_governor::{
    GovernorError, GovernorLayer, governor::GovernorConfigBuilder,
    key_extractor::SmartIpKeyExtractor,
};

type RateLimitLayer =
    GovernorLayer<SmartIpKeyExtractor, governor::middleware::NoOpMiddleware, axum::body::Body>;

/// Per-IP limit shared by the tool endpoints and `/rpc`: `per_sec` requests
/// per second, with a burst of the same size.
///
/// Clone the returned layer rather than calling this twice; each call owns
/// its own bucket state.
pub fn tool_layer(per_sec: u32) -> RateLimitLayer {
    let per_sec = per_sec.max(1);
    GovernorLayer::new(
        GovernorConfigBuilder::default()
            .per_millisecond(u64::from((1000 / per_sec).max(1)))
            .burst_size(per_sec)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .expect("invalid governor config for tool routes"),
    )
    .error_handler(json_error_handler)
}

/// Returns the `ApiError` shape with a Retry-After header.
fn json_error_handler(err: GovernorError) -> Response<axum::body::Body> {
    let (status, retry_after, message) = match err {
        GovernorError::TooManyRequests { wait_time, .. } => (
            StatusCode::TOO_MANY_REQUESTS,
            Some(wait_time.max(1)),
            format!("Too many requests. Retry after {} seconds.", wait_time.max(1)),
        ),
        GovernorError::UnableToExtractKey => (
            StatusCode::INTERNAL_SERVER_ERROR,
            None,
            "Unable to determine client identity for rate limiting".to_string(),
        ),
        GovernorError::Other { code, msg, .. } => (code, None, msg.unwrap_or_default()),
    };

    let error = if status == StatusCode::TOO_MANY_REQUESTS {
        ErrorCode::RateLimited
    } else {
        ErrorCode::Internal
    };
    let request_id = uuid::Uuid::now_v7().to_string();
    tracing::warn!(
        event = "rate_limited",
        status = status.as_u16(),
        request_id = %request_id,
        "Request rejected by rate limiter"
    );
    let body = serde_json::json!({
        "error": error.as_str(),
        "message": message,
        "request_id": request_id,
    });

    let mut response = Response::new(axum::body::Body::from(body.to_string()));
    *response.status_mut() = status;
    response.headers_mut().insert(
        axum::http::header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    if let Some(seconds) = retry_after {
        response
            .headers_mut()
            .insert(axum::http::header::RETRY_AFTER, HeaderValue::from(seconds));
    }

    response
}
