// src/server/routes/general.rs

//! The canvas endpoints and the unauthenticated service pages.

use super::dispatch;
use crate::core::PixeldError;
use crate::core::models::{Message, PixelBody, PixelPayload, SizeResponse};
use crate::core::state::AppState;
use crate::server::ApiError;
use crate::server::extract::Auth;
use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::header::{CONTENT_TYPE, LOCATION};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use serde::Deserialize;
use tracing::info;

/// Redirect the index page to `/info`, which is served upstream.
pub async fn index() -> Response {
    (
        StatusCode::MOVED_PERMANENTLY,
        [(LOCATION, HeaderValue::from_static("/info"))],
    )
        .into_response()
}

/// Return the API docs. The moderation section is hidden in production.
pub async fn docs(State(state): State<AppState>) -> Html<String> {
    let mod_docs = if state.config.production {
        ""
    } else {
        include_str!("../../../templates/mod_docs.html")
    };
    Html(include_str!("../../../templates/docs.html").replace("{{ mod_docs }}", mod_docs))
}

/// Get the size of the canvas. No authentication required.
pub async fn size(State(state): State<AppState>) -> Json<SizeResponse> {
    Json(SizeResponse {
        width: state.config.width,
        height: state.config.height,
    })
}

/// Get the current state of all pixels as one flat binary snapshot.
pub async fn canvas_pixels(
    State(state): State<AppState>,
    Auth(auth): Auth,
) -> Result<Response, ApiError> {
    let limiter = state.limiters.get_pixels.clone();
    dispatch(&state, &limiter, &auth, || async {
        let buffer = state.canvas.get_pixels().await?;
        Ok((
            [(CONTENT_TYPE, HeaderValue::from_static("application/octet-stream"))],
            buffer,
        )
            .into_response())
    })
    .await
}

#[derive(Debug, Deserialize)]
pub struct CoordinateQuery {
    x: Option<i64>,
    y: Option<i64>,
}

impl CoordinateQuery {
    fn require(
        query: Result<Query<CoordinateQuery>, QueryRejection>,
    ) -> Result<(i64, i64), PixeldError> {
        let Query(query) = query.map_err(|e| PixeldError::Validation(e.body_text()))?;
        match (query.x, query.y) {
            (Some(x), Some(y)) => Ok((x, y)),
            _ => Err(PixeldError::Validation(
                "x and y query parameters are required".to_string(),
            )),
        }
    }
}

/// Get a single pixel given the x and y coordinates.
pub async fn get_pixel(
    State(state): State<AppState>,
    Auth(auth): Auth,
    query: Result<Query<CoordinateQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let (x, y) = CoordinateQuery::require(query)?;
    if x < 0 || x >= i64::from(state.config.width) || y < 0 || y >= i64::from(state.config.height) {
        return Err(PixeldError::OutOfBounds.into());
    }
    let (x, y) = (x as u32, y as u32);

    let limiter = state.limiters.get_pixel.clone();
    dispatch(&state, &limiter, &auth, || async {
        let rgb = state.canvas.get_pixel(x, y).await?;
        Ok(Json(PixelBody {
            x,
            y,
            rgb: rgb.to_string(),
        })
        .into_response())
    })
    .await
}

/// Override the pixel at the specified coordinate with the specified color.
pub async fn put_pixel(
    State(state): State<AppState>,
    Auth(auth): Auth,
    payload: Result<Json<PixelPayload>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(payload) = payload.map_err(|e| PixeldError::Validation(e.body_text()))?;
    let pixel = payload.validate(state.config.width, state.config.height)?;

    let limiter = state.limiters.put_pixel.clone();
    dispatch(&state, &limiter, &auth, || async {
        let user_id = auth.require_user()?;
        info!(
            "{} is setting {}, {} to {}",
            user_id, pixel.x, pixel.y, pixel.rgb
        );
        state
            .canvas
            .set_pixel(&state.db, pixel.x, pixel.y, pixel.rgb, user_id)
            .await?;
        Ok(Json(Message::new(format!(
            "Set pixel at x={},y={} to color {}.",
            pixel.x, pixel.y, pixel.rgb
        )))
        .into_response())
    })
    .await
}
