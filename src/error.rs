use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use rust_decimal::Decimal;
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum SubmeterError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Authentication required")]
    Unauthenticated,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("{0}")]
    Validation(String),

    #[error("Invalid subtitle file: {0}")]
    Subtitle(String),

    #[error("Upload exceeds the size limit")]
    PayloadTooLarge,

    #[error("Insufficient credits: {required} required, {available} available")]
    InsufficientCredits { required: Decimal, available: Decimal },

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("{resource} not found: {id}")]
    NotFound { resource: String, id: String },

    #[error("Account already exists: {0}")]
    AccountExists(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Translation failed: {0}")]
    Provider(String),

    #[error("Ledger error: {0}")]
    Persistence(String),
}

pub type Result<T> = std::result::Result<T, SubmeterError>;

impl SubmeterError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Validation(_) | Self::Subtitle(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::InsufficientCredits { .. } => StatusCode::PAYMENT_REQUIRED,
            Self::UserNotFound(_) | Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::AccountExists(_) => StatusCode::CONFLICT,
            Self::Config(_)
            | Self::Provider(_)
            | Self::Persistence(_)
            | Self::Io(_)
            | Self::Json(_)
            | Self::Toml(_)
            | Self::Http(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable error code. Lets clients tell a missing provider
    /// credential apart from a failed provider call, both of which are 500s.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "authentication_required",
            Self::Forbidden(_) => "forbidden",
            Self::Validation(_) => "invalid_request",
            Self::Subtitle(_) => "invalid_subtitle",
            Self::PayloadTooLarge => "payload_too_large",
            Self::InsufficientCredits { .. } => "insufficient_credits",
            Self::UserNotFound(_) | Self::NotFound { .. } => "not_found",
            Self::AccountExists(_) => "conflict",
            Self::Config(_) => "provider_not_configured",
            Self::Provider(_) => "translation_failed",
            Self::Persistence(_) | Self::Io(_) | Self::Json(_) | Self::Toml(_) | Self::Http(_) => {
                "internal_error"
            }
        }
    }
}

impl IntoResponse for SubmeterError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed with {}: {}", status, self);
        }

        let body = json!({
            "error": self.to_string(),
            "code": self.code(),
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes_follow_taxonomy() {
        assert_eq!(SubmeterError::Unauthenticated.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            SubmeterError::Validation("no file".to_string()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            SubmeterError::InsufficientCredits {
                required: Decimal::new(7, 1),
                available: Decimal::new(5, 1),
            }
            .status_code(),
            StatusCode::PAYMENT_REQUIRED
        );
        assert_eq!(
            SubmeterError::UserNotFound("u1".to_string()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(SubmeterError::PayloadTooLarge.status_code(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(
            SubmeterError::Config("missing key".to_string()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_provider_errors_are_distinguishable() {
        let missing = SubmeterError::Config("missing key".to_string());
        let failed = SubmeterError::Provider("timeout".to_string());
        assert_eq!(missing.status_code(), failed.status_code());
        assert_ne!(missing.code(), failed.code());
    }
}
