//! Error-to-HTTP response conversion.
//!
//! Implements `IntoResponse` for [`eb_core::Error`] so that route handlers
//! can return `Result<T, AppError>` and use `?` on core results.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Wrapper so we can implement `IntoResponse` for an external type.
#[derive(Debug)]
pub struct AppError {
    inner: eb_core::Error,
}

impl AppError {
    pub fn new(inner: eb_core::Error) -> Self {
        Self { inner }
    }
}

impl From<eb_core::Error> for AppError {
    fn from(e: eb_core::Error) -> Self {
        Self::new(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.inner.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            tracing::error!(
                status = %status,
                error = %self.inner,
                "Server error in API handler"
            );
        }

        let code = match &self.inner {
            eb_core::Error::Validation(_) => "validation_error",
            eb_core::Error::Download { .. } => "download_error",
            eb_core::Error::Recipe(_) => "recipe_error",
            eb_core::Error::Tool { .. } => "tool_error",
            eb_core::Error::Storage { .. } => "storage_error",
            eb_core::Error::Cleanup { .. } => "cleanup_error",
            eb_core::Error::Cancelled => "cancelled",
            eb_core::Error::Io { .. } => "io_error",
            eb_core::Error::Json { .. } => "invalid_json",
            eb_core::Error::Internal(_) => "internal_error",
        };

        let body = json!({
            "error": self.inner.to_string(),
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_produces_400() {
        let response = AppError::new(eb_core::Error::Validation("no audio track provided".into())).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn tool_failure_produces_502() {
        let response = AppError::new(eb_core::Error::tool("ffmpeg", "boom")).into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn cancelled_produces_503() {
        let response = AppError::from(eb_core::Error::Cancelled).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
