// src/core/canvas/sync.rs

//! The cache coherence protocol: freshness detection and the cross-process
//! mutual exclusion around the full rebuild.

use super::{Canvas, write_pixel};
use crate::core::PixeldError;
use crate::core::models::Rgb;
use chrono::{DateTime, Utc};
use deadpool_redis::redis::AsyncCommands;
use futures::TryStreamExt;
use sqlx::PgPool;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// How long before a held sync lock is considered deadlocked and stolen.
const DEADLOCK_TIMEOUT_SECS: f64 = 10.0;

/// How often a waiting worker polls the lock.
const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(100);

impl Canvas {
    /// Return true if the cache can be considered out of date.
    ///
    /// A buffer of the wrong length (canvas size changed, or the key is
    /// absent) is stale unconditionally, regardless of the recorded sync
    /// state.
    pub async fn is_cache_stale(&self, db: &PgPool) -> Result<bool, PixeldError> {
        let buffer = self.get_pixels().await?;
        if buffer.len() != self.flat_len() {
            return Ok(true);
        }

        let (last_modified, last_synced): (DateTime<Utc>, DateTime<Utc>) =
            sqlx::query_as("SELECT last_modified, last_synced FROM cache_state")
                .fetch_one(db)
                .await?;
        Ok(last_modified > last_synced)
    }

    /// Try to acquire the sync lock from the cache state.
    ///
    /// The lock functions as a spinlock: we set it unconditionally but use a
    /// self join under row-level lock to observe the previous state. The
    /// caller is the leader only when the previous state was NULL.
    async fn try_acquire_lock(&self, db: &PgPool) -> Result<bool, PixeldError> {
        let (previous_state,): (Option<DateTime<Utc>>,) = sqlx::query_as(
            "UPDATE cache_state x \
             SET sync_lock = now() \
             FROM (SELECT sync_lock FROM cache_state FOR UPDATE) y \
             RETURNING y.sync_lock AS previous_state",
        )
        .fetch_one(db)
        .await?;
        Ok(previous_state.is_none())
    }

    async fn release_lock(&self, db: &PgPool) -> Result<(), PixeldError> {
        sqlx::query("UPDATE cache_state SET sync_lock = NULL")
            .execute(db)
            .await?;
        Ok(())
    }

    /// Rebuilds the flat buffer from the current-pixel projection in one
    /// pass and advances `last_synced`.
    async fn populate_cache(&self, db: &PgPool) -> Result<(), PixeldError> {
        let started = Instant::now();
        // Pixels never placed stay at the white background.
        let mut buffer = Rgb::WHITE.bytes().repeat(self.flat_len() / 3);

        // Stream the projection inside a read transaction so the pass sees
        // one consistent snapshot of history.
        let mut tx = db.begin().await?;
        {
            let mut rows = sqlx::query_as::<_, (i32, i32, String)>(
                "SELECT x, y, rgb FROM current_pixel WHERE x < $1 AND y < $2",
            )
            .bind(self.width() as i32)
            .bind(self.height() as i32)
            .fetch(&mut *tx);

            while let Some((x, y, rgb)) = rows.try_next().await? {
                let rgb: Rgb = rgb.parse().map_err(|_| {
                    PixeldError::Internal(format!("corrupt color '{rgb}' in pixel history"))
                })?;
                write_pixel(&mut buffer, self.width(), x as u32, y as u32, rgb);
            }
        }
        tx.commit().await?;

        let mut conn = self.redis.get().await?;
        let _: () = conn.set(&self.key, buffer).await?;

        info!("cache update finished (took {:?})", started.elapsed());
        sqlx::query("UPDATE cache_state SET last_synced = now()")
            .execute(db)
            .await?;
        Ok(())
    }

    /// Make sure that the cache is up-to-date.
    ///
    /// `force` skips the freshness check once, for callers that already know
    /// the cache is invalid (ban cascades, administrative refresh).
    pub async fn sync_cache(&self, db: &PgPool, force: bool) -> Result<(), PixeldError> {
        let mut force = force;
        let mut lock_cleared = false;

        loop {
            if !force && !self.is_cache_stale(db).await? {
                // A stolen lock is still ours even when the rebuild turned
                // out to be unnecessary.
                if lock_cleared {
                    self.release_lock(db).await?;
                }
                debug!("cache is up-to-date");
                return Ok(());
            }
            info!("cache will be updated");

            if lock_cleared || self.try_acquire_lock(db).await? {
                info!("sync lock acquired, starting synchronisation");
                lock_cleared = false;
                // Don't loop forever after a forced refresh.
                force = false;

                let result = self.populate_cache(db).await;
                // The lock is freed on every exit path, success or not.
                self.release_lock(db).await?;
                result?;
            } else {
                // Another process is already syncing the cache; wait for it,
                // stealing the lock if the holder looks deadlocked.
                info!("sync lock in use, waiting for holder to finish");
                lock_cleared = self.wait_for_lock(db).await?;
            }
        }
    }

    /// Polls until the lock is free. Returns true when this worker stole a
    /// deadlocked lock and now holds it.
    async fn wait_for_lock(&self, db: &PgPool) -> Result<bool, PixeldError> {
        loop {
            let (sync_lock,): (Option<DateTime<Utc>>,) =
                sqlx::query_as("SELECT sync_lock FROM cache_state")
                    .fetch_one(db)
                    .await?;
            if sync_lock.is_none() {
                return Ok(false);
            }

            // If the lock has been held for too long we consider the holder
            // dead and take it over. The update is conditional on age, so at
            // most one stealer succeeds.
            let stolen = sqlx::query(
                "UPDATE cache_state SET sync_lock = now() \
                 WHERE sync_lock IS NOT NULL \
                 AND now() - sync_lock > make_interval(secs => $1)",
            )
            .bind(DEADLOCK_TIMEOUT_SECS)
            .execute(db)
            .await?;
            if stolen.rows_affected() == 1 {
                warn!("sync lock considered deadlocked, stealing it");
                return Ok(true);
            }

            tokio::time::sleep(LOCK_POLL_INTERVAL).await;
        }
    }
}
