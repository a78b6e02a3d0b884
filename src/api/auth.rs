use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use tracing::warn;

use super::AppState;
use crate::error::SubmeterError;

/// Header carrying the caller identity set by the upstream identity provider
pub const USER_ID_HEADER: &str = "x-user-id";

/// Read a non-blank user id from the request headers
pub fn user_id_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get(USER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Caller identified by the `X-User-Id` header
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user_id: String,
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = SubmeterError;

    async fn from_request_parts(parts: &mut Parts, _state: &AppState) -> Result<Self, Self::Rejection> {
        user_id_from_headers(&parts.headers)
            .map(|user_id| CurrentUser { user_id })
            .ok_or(SubmeterError::Unauthenticated)
    }
}

/// Proof that the request carried the configured admin bearer token
#[derive(Debug, Clone, Copy)]
pub struct AdminAccess;

impl FromRequestParts<AppState> for AdminAccess {
    type Rejection = SubmeterError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(expected) = state.admin_token.as_deref() else {
            return Err(SubmeterError::Forbidden("Admin API is disabled".to_string()));
        };

        let provided = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .ok_or(SubmeterError::Unauthenticated)?;

        if provided != expected {
            warn!("Rejected admin request with invalid token");
            return Err(SubmeterError::Forbidden("Invalid admin token".to_string()));
        }

        Ok(AdminAccess)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_user_id_from_headers_ignores_blank() {
        let mut headers = HeaderMap::new();
        assert_eq!(user_id_from_headers(&headers), None);

        headers.insert(USER_ID_HEADER, HeaderValue::from_static("   "));
        assert_eq!(user_id_from_headers(&headers), None);

        headers.insert(USER_ID_HEADER, HeaderValue::from_static(" user-7 "));
        assert_eq!(user_id_from_headers(&headers), Some("user-7".to_string()));
    }
}
