//! Application error type, rendered as JSON over HTTP.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::config::ConfigError;

/// Errors surfaced by handlers and middleware.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration parsing/validation failed
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Invalid request data
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Admin API key missing or mismatched
    #[error("Unauthorized")]
    Unauthorized,

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Config(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => "invalid_config",
            Self::BadRequest(_) => "bad_request",
            Self::Unauthorized => "unauthorized",
            Self::NotFound(_) => "not_found",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Detail echoed to the client. Config and bad-request payloads are
    /// client-supplied, so their parse errors are safe to return; internal
    /// errors are logged and withheld.
    fn detail(&self) -> Option<String> {
        match self {
            Self::Config(e) => Some(e.to_string()),
            Self::BadRequest(msg) => Some(msg.clone()),
            Self::NotFound(resource) => Some(resource.clone()),
            Self::Unauthorized => None,
            Self::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                None
            }
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.code(),
            message: self.detail(),
        };
        (self.status(), Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_match_error_kinds() {
        let cases = [
            (AppError::Config(ConfigError::NoNodes), StatusCode::BAD_REQUEST),
            (AppError::BadRequest("x".into()), StatusCode::BAD_REQUEST),
            (AppError::Unauthorized, StatusCode::UNAUTHORIZED),
            (AppError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (AppError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (error, expected) in cases {
            assert_eq!(error.into_response().status(), expected);
        }
    }

    #[test]
    fn internal_detail_is_withheld() {
        assert!(AppError::Internal("secret".into()).detail().is_none());
    }

    #[test]
    fn config_detail_is_echoed() {
        let detail = AppError::Config(ConfigError::NoNodes).detail();
        assert_eq!(detail.as_deref(), Some("no nodes configured"));
    }
}
