use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Stable, machine-readable error codes.
///
/// These strings are part of the public tool contract. Item-level codes are
/// reported inline against the offending index; batch-level codes abort the
/// whole tool call and are reported once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// lat/lon missing, non-numeric or outside the valid range
    InvalidCoord,
    /// ref present but not matching `[A-Za-z0-9._:-]{1,128}`
    InvalidRef,
    /// `t` present but not an ISO-8601 timestamp with offset
    #[serde(rename = "INVALID_T")]
    InvalidT,
    /// position timestamp missing, non-integer or decreasing
    InvalidTimestamp,
    /// point not covered by the provider, or provider response misaligned
    OutOfCoverage,
    /// provider unreachable, timed out or answered with an error status
    ApiError,
    /// provider answered 429
    RateLimit,
    /// request rejected before any item was processed
    InvalidInput,
    /// inbound request rate exceeded for this client
    RateLimited,
    /// unexpected server-side failure
    Internal,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::InvalidCoord => "INVALID_COORD",
            ErrorCode::InvalidRef => "INVALID_REF",
            ErrorCode::InvalidT => "INVALID_T",
            ErrorCode::InvalidTimestamp => "INVALID_TIMESTAMP",
            ErrorCode::OutOfCoverage => "OUT_OF_COVERAGE",
            ErrorCode::ApiError => "API_ERROR",
            ErrorCode::RateLimit => "RATE_LIMIT",
            ErrorCode::InvalidInput => "INVALID_INPUT",
            ErrorCode::RateLimited => "RATE_LIMITED",
            ErrorCode::Internal => "INTERNAL",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request rejected before resolution.
///
/// `Item` comes from the fail-fast validation entry points (first rejected
/// item aborts the call); `Request` covers structural problems with the
/// request as a whole, such as an oversized batch.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InvalidInput {
    #[error("{reason} at index {index}")]
    Item {
        reason: ErrorCode,
        index: usize,
        location: serde_json::Value,
    },
    #[error("{message}")]
    Request { message: String, field: String },
}

impl InvalidInput {
    pub fn request(message: impl Into<String>, field: impl Into<String>) -> Self {
        InvalidInput::Request {
            message: message.into(),
            field: field.into(),
        }
    }

    pub fn location(&self) -> serde_json::Value {
        match self {
            InvalidInput::Item { location, .. } => location.clone(),
            InvalidInput::Request { field, .. } => serde_json::json!({ "field": field }),
        }
    }
}

/// Structured top-level error body, designed for agents.
/// Carries enough for a caller to tell what failed and whether retrying helps.
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiError {
    /// Stable error code (e.g. "API_ERROR", "INVALID_INPUT")
    pub error: ErrorCode,
    /// Human/agent-readable description of what went wrong
    pub message: String,
    /// Where the failure was detected (item index/ref, or request field)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<serde_json::Value>,
    /// Request ID for tracing and debugging
    pub request_id: String,
    /// Hint about what to do next
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docs_hint: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_serialize_to_contract_strings() {
        for code in [
            ErrorCode::InvalidCoord,
            ErrorCode::InvalidRef,
            ErrorCode::InvalidT,
            ErrorCode::InvalidTimestamp,
            ErrorCode::OutOfCoverage,
            ErrorCode::ApiError,
            ErrorCode::RateLimit,
            ErrorCode::InvalidInput,
            ErrorCode::RateLimited,
        ] {
            let serialized = serde_json::to_value(code).unwrap();
            assert_eq!(serialized, serde_json::Value::String(code.as_str().into()));
        }
    }
}
