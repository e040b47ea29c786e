// src/server/extract.rs

//! Request-scoped extractors for the HTTP surface.

use super::error::ApiError;
use crate::core::auth::{self, AuthResult};
use crate::core::state::AppState;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

/// Verifies the Authorization header against the user store. Extraction
/// itself never rejects; handlers and the rate limiter decide which
/// outcomes pass, so probes and mixed-auth routes share one code path.
pub struct Auth(pub AuthResult);

impl FromRequestParts<AppState> for Auth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok());
        let result = auth::authorized(&state.db, &state.config.jwt_secret, header).await?;
        Ok(Auth(result))
    }
}

/// Returns the value of the `token` cookie, if any.
pub fn token_cookie(headers: &axum::http::HeaderMap) -> Option<String> {
    let raw = headers.get(axum::http::header::COOKIE)?.to_str().ok()?;
    raw.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == "token").then(|| value.to_string())
    })
}
