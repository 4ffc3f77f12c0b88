//! API response types
//!
//! Standard response structures shared by all feature routers.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// Standard success response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Value>,
}

impl<T: Serialize> ApiResponse<T> {
    /// Create a new success response
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data,
            meta: None,
        }
    }

    /// Create a success response with metadata
    pub fn success_with_meta(data: T, meta: serde_json::Value) -> Self {
        Self {
            success: true,
            data,
            meta: Some(meta),
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// Standard error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorResponse {
    /// Create a new error response
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    /// Create an error response with details
    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            success: false,
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }
}

/// Cursor metadata for cursor-paginated list responses
#[derive(Debug, Serialize, Deserialize)]
pub struct CursorMeta {
    /// Last record id in the returned page, fed back as the next cursor.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<i32>,
    pub has_next: bool,
    pub count: usize,
    /// Whether the page came from the Redis cache.
    pub cached: bool,
}

impl CursorMeta {
    pub fn new(next_cursor: Option<i32>, has_next: bool, count: usize, cached: bool) -> Self {
        Self {
            next_cursor,
            has_next,
            count,
            cached,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_meta_serializes_compactly() {
        let meta = CursorMeta::new(None, false, 3, true);
        let json = serde_json::to_value(&meta).unwrap();
        assert!(json.get("next_cursor").is_none());
        assert_eq!(json["has_next"], false);
        assert_eq!(json["count"], 3);
        assert_eq!(json["cached"], true);
    }

    #[test]
    fn test_error_response_shape() {
        let resp = ErrorResponse::new("NOT_FOUND", "employee 7 not found");
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"]["code"], "NOT_FOUND");
    }
}
