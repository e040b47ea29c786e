// src/core/canvas/mod.rs

//! The canvas engine: reads and writes against the derived flat buffer in
//! the shared cache, with the authoritative history in the relational store.

mod sync;

use crate::core::PixeldError;
use crate::core::models::Rgb;
use deadpool_redis::redis::AsyncCommands;
use sqlx::PgPool;
use tracing::debug;

/// A handle on the shared canvas. Cheap to clone; all state lives in the
/// external cache and the database.
#[derive(Debug, Clone)]
pub struct Canvas {
    redis: deadpool_redis::Pool,
    /// Cache key of the flat buffer, namespaced per deployment.
    key: String,
    width: u32,
    height: u32,
}

/// Byte offset of a pixel inside the flat buffer.
pub fn buffer_index(width: u32, x: u32, y: u32) -> usize {
    (y as usize * width as usize + x as usize) * 3
}

/// Writes one pixel into an in-memory flat buffer. Used by the rebuild pass.
pub fn write_pixel(buffer: &mut [u8], width: u32, x: u32, y: u32, rgb: Rgb) {
    let at = buffer_index(width, x, y);
    buffer[at..at + 3].copy_from_slice(&rgb.bytes());
}

impl Canvas {
    pub fn new(redis: deadpool_redis::Pool, key: String, width: u32, height: u32) -> Self {
        Self {
            redis,
            key,
            width,
            height,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// The length the flat buffer must have to be considered intact.
    pub fn flat_len(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }

    pub fn in_bounds(&self, x: u32, y: u32) -> bool {
        x < self.width && y < self.height
    }

    /// Returns the whole board verbatim. An absent key reads as empty, which
    /// every caller of the freshness check treats as stale.
    pub async fn get_pixels(&self) -> Result<Vec<u8>, PixeldError> {
        let mut conn = self.redis.get().await?;
        let buffer: Option<Vec<u8>> = conn.get(&self.key).await?;
        Ok(buffer.unwrap_or_default())
    }

    /// Returns a single pixel from the board.
    pub async fn get_pixel(&self, x: u32, y: u32) -> Result<Rgb, PixeldError> {
        if !self.in_bounds(x, y) {
            return Err(PixeldError::OutOfBounds);
        }
        let at = buffer_index(self.width, x, y) as isize;
        let mut conn = self.redis.get().await?;
        let bytes: Vec<u8> = conn.getrange(&self.key, at, at + 2).await?;
        let bytes: [u8; 3] = bytes
            .try_into()
            .map_err(|_| PixeldError::Internal("canvas cache is missing or truncated".into()))?;
        Ok(Rgb::from_bytes(bytes))
    }

    /// Sets the provided pixel: ensures cache freshness, appends the history
    /// row inside a transaction, patches the 3-byte cache range, and records
    /// that the cache already reflects this write.
    pub async fn set_pixel(
        &self,
        db: &PgPool,
        x: u32,
        y: u32,
        rgb: Rgb,
        user_id: i64,
    ) -> Result<(), PixeldError> {
        if !self.in_bounds(x, y) {
            return Err(PixeldError::OutOfBounds);
        }
        self.sync_cache(db, false).await?;

        let mut tx = db.begin().await?;
        sqlx::query(
            "INSERT INTO pixel_history (x, y, rgb, user_id, deleted) \
             VALUES ($1, $2, $3, $4, false)",
        )
        .bind(x as i32)
        .bind(y as i32)
        .bind(rgb.to_string())
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        // Point update on a disjoint byte range, safe with concurrent
        // writers to other coordinates.
        let at = buffer_index(self.width, x, y) as isize;
        let patch = rgb.bytes().to_vec();
        let mut conn = self.redis.get().await?;
        let _: i64 = conn.setrange(&self.key, at, patch).await?;

        // The cache already reflects this write. The history insert advanced
        // last_modified via trigger; without this touch every other worker
        // would see the cache as stale and rebuild for nothing.
        sqlx::query("UPDATE cache_state SET last_synced = now()")
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        debug!("pixel ({}, {}) set to {} by {}", x, y, rgb, user_id);
        Ok(())
    }
}
