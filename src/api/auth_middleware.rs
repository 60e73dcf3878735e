use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use crate::api::error::ApiError;

#[derive(Debug, Clone)]
pub struct AuthState {
    pub enabled: bool,
    pub token: String,
}

/// Bearer-token gate. Layered over every route; a disabled gate admits
/// everything.
#[derive(Debug)]
pub struct AuthenticatedClient;

#[async_trait]
impl FromRequestParts<AuthState> for AuthenticatedClient {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AuthState) -> Result<Self, ApiError> {
        if !state.enabled {
            return Ok(AuthenticatedClient);
        }

        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok());

        match header.and_then(|h| h.strip_prefix("Bearer ")) {
            Some(token) if token == state.token => Ok(AuthenticatedClient),
            _ => Err(ApiError::Unauthorized),
        }
    }
}
