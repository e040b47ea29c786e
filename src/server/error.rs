// src/server/error.rs

//! Maps service errors onto HTTP responses at the edge of the system.

use crate::core::PixeldError;
use crate::core::models::AuthState;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use serde_json::json;
use tracing::error;

/// Message returned for any unexpected backend failure.
const INTERNAL_DETAIL: &str = "Unknown error occurred, please contact staff.";

/// The HTTP-facing error wrapper. Every handler returns this; the mapping
/// from service errors to transport codes lives here and nowhere else.
#[derive(Debug)]
pub struct ApiError(pub PixeldError);

impl From<PixeldError> for ApiError {
    fn from(e: PixeldError) -> Self {
        ApiError(e)
    }
}

fn json_message(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "message": message }))).into_response()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self.0 {
            PixeldError::Auth(state) => {
                let status = match state {
                    AuthState::NoToken | AuthState::BadHeader => StatusCode::UNAUTHORIZED,
                    _ => StatusCode::FORBIDDEN,
                };
                json_message(status, state.detail())
            }
            PixeldError::Banned => json_message(StatusCode::UNAUTHORIZED, "You are banned"),
            PixeldError::BadExchange(detail) => {
                error!("OAuth exchange failed: {}", detail);
                json_message(
                    StatusCode::UNAUTHORIZED,
                    "Unknown error while creating token",
                )
            }
            PixeldError::OutOfBounds => {
                json_message(StatusCode::BAD_REQUEST, "Pixel is out of the canvas bounds.")
            }
            PixeldError::Validation(detail) => {
                json_message(StatusCode::UNPROCESSABLE_ENTITY, detail)
            }
            e => {
                error!("Request failed: {}", e);
                json_message(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_DETAIL)
            }
        }
    }
}

/// Global 404 handler: humans get a page, not a JSON blob.
pub async fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Html(include_str!("../../templates/not_found.html")),
    )
        .into_response()
}
