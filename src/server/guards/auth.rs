use crate::error::ApiErrorBody;
use crate::error::ApiErrorObject;
use crate::server::router::MeridianState;
use axum::{
    Json,
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};
use subtle::ConstantTimeEq;

pub const ADMIN_KEY_HEADER: &str = "x-api-key";

fn extract_header_token(headers: &axum::http::HeaderMap) -> Option<String> {
    if let Some(k) = headers.get(ADMIN_KEY_HEADER).and_then(|v| v.to_str().ok()) {
        return Some(k.to_string());
    }
    headers
        .typed_get::<Authorization<Bearer>>()
        .map(|auth| auth.token().to_string())
}

/// Guards mutating routes when `basic.admin_key` is configured; a no-op otherwise.
#[derive(Debug, Clone, Copy)]
pub struct RequireAdminKey;

impl FromRequestParts<MeridianState> for RequireAdminKey {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &MeridianState,
    ) -> Result<Self, Self::Rejection> {
        let Some(expected) = state.admin_key.as_deref() else {
            return Ok(RequireAdminKey);
        };

        match extract_header_token(&parts.headers) {
            Some(key) if bool::from(key.as_bytes().ct_eq(expected.as_bytes())) => {
                Ok(RequireAdminKey)
            }
            Some(_) => Err(AuthError::InvalidKey),
            None => Err(AuthError::MissingKey),
        }
    }
}

#[derive(Debug)]
pub enum AuthError {
    MissingKey,
    InvalidKey,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let message = match self {
            AuthError::MissingKey => "Missing API key",
            AuthError::InvalidKey => "Invalid API key",
        };
        let body = ApiErrorBody {
            inner: ApiErrorObject {
                code: "UNAUTHORIZED".to_string(),
                message: message.to_string(),
                details: None,
            },
        };
        (StatusCode::UNAUTHORIZED, Json(body)).into_response()
    }
}
