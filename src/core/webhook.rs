// src/core/webhook.rs

//! Pushes canvas snapshots to the configured external image webhook,
//! editing the previously posted message when one is remembered.

use crate::core::PixeldError;
use crate::core::state::AppState;
use deadpool_redis::redis::AsyncCommands;
use image::DynamicImage;
use serde_json::json;
use std::io::Cursor;
use tracing::warn;

/// Cache key remembering the id of the last posted webhook message.
const LAST_MESSAGE_KEY: &str = "last-webhook-message";

/// Renders the flat buffer into an upscaled PNG. Blocking; runs on the
/// worker thread pool, off the request's latency-critical path.
fn render_png(
    buffer: Vec<u8>,
    width: u32,
    height: u32,
    target: (u32, u32),
) -> Result<Vec<u8>, PixeldError> {
    let image = image::RgbImage::from_raw(width, height, buffer).ok_or_else(|| {
        PixeldError::Internal("canvas buffer does not match the configured dimensions".into())
    })?;
    let upscaled = DynamicImage::ImageRgb8(image).resize_exact(
        target.0,
        target.1,
        image::imageops::FilterType::Nearest,
    );

    let mut out = Vec::new();
    upscaled.write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)?;
    Ok(out)
}

/// Sends or updates the webhook image.
///
/// The last message id is remembered in the cache; when present we PATCH
/// that message, falling back to a fresh POST when the edit is rejected.
pub async fn push_snapshot(state: &AppState) -> Result<(), PixeldError> {
    let buffer = state.canvas.get_pixels().await?;
    let (width, height) = (state.canvas.width(), state.canvas.height());
    let target = crate::config::WEBHOOK_SIZE;

    let png = tokio::task::spawn_blocking(move || render_png(buffer, width, height, target))
        .await
        .map_err(|e| PixeldError::Internal(format!("image render task failed: {e}")))??;

    let now = chrono::Utc::now();
    let filename = format!("pixels_{}.png", now.timestamp());
    let mut payload = json!({
        "content": "",
        "embeds": [{
            "title": "Pixels State",
            "image": { "url": format!("attachment://{filename}") },
            "footer": { "text": "Last updated" },
            "timestamp": now.to_rfc3339(),
        }],
    });

    let mut conn = state.redis.get().await?;
    let mut last_message_id: Option<String> = conn.get(LAST_MESSAGE_KEY).await?;

    let form = |payload_json: String| -> Result<reqwest::multipart::Form, PixeldError> {
        let part = reqwest::multipart::Part::bytes(png.clone())
            .file_name(filename.clone())
            .mime_str("image/png")?;
        Ok(reqwest::multipart::Form::new()
            .text("payload_json", payload_json)
            .part("file", part))
    };

    // If a previous message is remembered, try to edit it in place.
    if let Some(id) = last_message_id.clone() {
        payload["attachments"] = json!([]);
        let edit_resp = state
            .http
            .patch(format!("{}/messages/{}", state.config.webhook_url, id))
            .multipart(form(payload.to_string())?)
            .send()
            .await?;
        if edit_resp.status() != reqwest::StatusCode::OK {
            warn!(
                "non-200 editing webhook message: {} {}",
                edit_resp.status(),
                edit_resp.text().await.unwrap_or_default()
            );
            last_message_id = None;
        }
    }

    // No message remembered, or the edit was rejected: create a new one.
    if last_message_id.is_none() {
        if let Some(map) = payload.as_object_mut() {
            map.remove("attachments");
        }
        // The username can only be set when sending.
        payload["username"] = json!("Pixels");
        let created: serde_json::Value = state
            .http
            .post(format!("{}?wait=true", state.config.webhook_url))
            .multipart(form(payload.to_string())?)
            .send()
            .await?
            .json()
            .await?;
        let id = created["id"]
            .as_str()
            .ok_or_else(|| PixeldError::Internal("webhook response had no message id".into()))?;
        let _: () = conn.set(LAST_MESSAGE_KEY, id).await?;
    }

    Ok(())
}
