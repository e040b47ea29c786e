// src/server/routes/moderation.rs

//! Moderation endpoints. Every handler requires a moderator token before
//! doing anything else.

use crate::core::models::{Message, ModBanResponse, PixelHistoryBody, UserRef};
use crate::core::moderation::{self, SetModOutcome};
use crate::core::state::AppState;
use crate::core::webhook;
use crate::core::{PixeldError, auth};
use crate::server::ApiError;
use crate::server::extract::Auth;
use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

/// Check if the authenticated user is a mod.
pub async fn mod_check(Auth(auth): Auth) -> Result<Json<Message>, ApiError> {
    auth.require_mod()?;
    Ok(Json(Message::new("Hello fellow moderator!")))
}

/// Make another user a mod.
pub async fn set_mod(
    State(state): State<AppState>,
    Auth(auth): Auth,
    payload: Result<Json<UserRef>, JsonRejection>,
) -> Result<Json<Message>, ApiError> {
    auth.require_mod()?;
    let Json(user) = payload.map_err(|e| PixeldError::Validation(e.body_text()))?;
    let user_id = user.validate()?;

    let message = match moderation::set_mod(&state.db, user_id).await? {
        SetModOutcome::Missing => format!("User with user_id {user_id} does not exist."),
        SetModOutcome::Already => format!("User with user_id {user_id} is already a mod."),
        SetModOutcome::Ok => format!("Successfully set user with user_id {user_id} to mod"),
    };
    Ok(Json(Message::new(message)))
}

/// Ban users from using the API and scrub their pixels from the canvas.
pub async fn mod_ban(
    State(state): State<AppState>,
    Auth(auth): Auth,
    payload: Result<Json<Vec<UserRef>>, JsonRejection>,
) -> Result<Json<ModBanResponse>, ApiError> {
    auth.require_mod()?;
    let Json(users) = payload.map_err(|e| PixeldError::Validation(e.body_text()))?;
    let user_ids = users
        .iter()
        .map(UserRef::validate)
        .collect::<Result<Vec<i64>, _>>()?;

    let outcome = moderation::ban_users(&state.db, &state.canvas, &user_ids).await?;
    Ok(Json(ModBanResponse {
        banned: outcome.banned,
        not_found: outcome.not_found,
    }))
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    x: Option<i64>,
    y: Option<i64>,
}

/// Get the user who placed the visible pixel at the given coordinates.
pub async fn pixel_history(
    State(state): State<AppState>,
    Auth(auth): Auth,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    auth.require_mod()?;
    let Query(query) = query.map_err(|e| PixeldError::Validation(e.body_text()))?;
    let (width, height) = (state.config.width, state.config.height);
    let x = validated_coordinate(query.x, "x", width)?;
    let y = validated_coordinate(query.y, "y", height)?;

    match moderation::pixel_history(&state.db, x, y).await? {
        Some(user_id) => Ok(Json(PixelHistoryBody {
            user_id: user_id.to_string(),
        })
        .into_response()),
        None => Ok(Json(Message::new(format!(
            "No user history for pixel ({x}, {y})"
        )))
        .into_response()),
    }
}

fn validated_coordinate(value: Option<i64>, name: &str, bound: u32) -> Result<u32, PixeldError> {
    match value {
        Some(v) if v >= 0 && v < i64::from(bound) => Ok(v as u32),
        _ => Err(PixeldError::Validation(format!(
            "{name} must be inside range(0, {bound})"
        ))),
    }
}

/// Send or update the canvas snapshot on the external webhook.
pub async fn webhook(
    State(state): State<AppState>,
    Auth(auth): Auth,
) -> Result<Json<Message>, ApiError> {
    auth.require_mod()?;
    webhook::push_snapshot(&state).await?;
    Ok(Json(Message::new("Webhook posted successfully.")))
}

/// Reset the calling moderator's own API token.
pub async fn reset_token(
    State(state): State<AppState>,
    Auth(auth): Auth,
) -> Result<StatusCode, ApiError> {
    let user_id = auth.require_mod()?;
    auth::tokens::reset_user_token(
        &state.db,
        &state.config.jwt_secret,
        &state.config.mods,
        user_id,
    )
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Force a full canvas cache rebuild.
pub async fn refresh_cache(
    State(state): State<AppState>,
    Auth(auth): Auth,
) -> Result<Json<Message>, ApiError> {
    auth.require_mod()?;
    state.canvas.sync_cache(&state.db, true).await?;
    Ok(Json(Message::new("Canvas cache refreshed.")))
}
