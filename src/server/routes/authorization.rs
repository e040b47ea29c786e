// src/server/routes/authorization.rs

//! The OAuth2 flow: consent redirect, code exchange, and token display.

use crate::core::PixeldError;
use crate::core::auth::oauth;
use crate::core::auth::tokens::{self, COOKIE_MAX_AGE};
use crate::core::state::AppState;
use crate::server::ApiError;
use crate::server::extract::token_cookie;
use axum::extract::{Query, State};
use axum::http::header::SET_COOKIE;
use axum::http::{HeaderMap, HeaderValue};
use axum::response::{Html, IntoResponse, Redirect, Response};
use serde::Deserialize;

/// Redirect the user to the provider's consent page; the flow continues in
/// `/callback`.
pub async fn authorize(State(state): State<AppState>) -> Redirect {
    Redirect::temporary(&state.config.auth_url)
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    code: Option<String>,
}

/// Create the user given the authorization code and hand the minted token
/// over via a short-lived cookie.
///
/// The 303 redirect exists so a user refreshing the page doesn't replay the
/// exchange against the provider.
pub async fn callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> Result<Response, ApiError> {
    let code = query
        .code
        .ok_or_else(|| PixeldError::BadExchange("callback had no code parameter".into()))?;

    // Provider failures of any shape fold into one 401; the detail only
    // reaches the logs.
    let provider_id = oauth::exchange_code(&state.http, &state.config, &code)
        .await
        .map_err(|e| match e {
            e @ PixeldError::BadExchange(_) => e,
            other => PixeldError::BadExchange(other.to_string()),
        })?;
    let user_id: i64 = provider_id
        .parse()
        .map_err(|_| PixeldError::BadExchange(format!("provider id '{provider_id}' not numeric")))?;

    let token = tokens::reset_user_token(
        &state.db,
        &state.config.jwt_secret,
        &state.config.mods,
        user_id,
    )
    .await?;

    let sealed = state.sealer.seal(&token)?;
    let cookie = format!("token={sealed}; HttpOnly; Max-Age={COOKIE_MAX_AGE}; Path=/show_token");
    let mut response = Redirect::to("/show_token").into_response();
    response.headers_mut().insert(
        SET_COOKIE,
        HeaderValue::from_str(&cookie)
            .map_err(|e| PixeldError::Internal(format!("cookie encoding failed: {e}")))?,
    );
    Ok(response)
}

/// Show the freshly minted token to the user, or explain that the cookie is
/// gone (blocked, expired, or a restart rotated the sealer key).
pub async fn show_token(State(state): State<AppState>, headers: HeaderMap) -> Html<String> {
    let token = token_cookie(&headers).and_then(|sealed| state.sealer.unseal(&sealed).ok());

    match token {
        Some(token) => Html(
            include_str!("../../../templates/api_token.html").replace("{{ token }}", &token),
        ),
        None => Html(include_str!("../../../templates/cookie_disabled.html").to_string()),
    }
}
