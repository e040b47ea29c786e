// src/core/tasks/janitor.rs

//! A task that periodically deletes expired rate-limit entries from the
//! shared cache so abandoned windows don't accumulate forever.

use crate::core::PixeldError;
use crate::core::state::AppState;
use chrono::Utc;
use deadpool_redis::redis::AsyncCommands;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, error, info};

/// The interval at which the janitor sweeps.
const SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// How long to back off after a failed sweep before restarting.
const RETRY_BACKOFF: Duration = Duration::from_secs(60);

/// Prefix of every sliding-window key in the cache.
const WINDOW_KEY_PATTERN: &str = "interaction-*";

pub struct RateLimitJanitor {
    state: AppState,
}

impl RateLimitJanitor {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /// Runs the main loop for the janitor task. A failed sweep logs, backs
    /// off, and restarts; cooperative shutdown exits cleanly.
    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) {
        info!(
            "Rate limit janitor started. Sweep interval: {:?}",
            SWEEP_INTERVAL
        );
        let mut interval = tokio::time::interval(SWEEP_INTERVAL);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match self.sweep().await {
                        Ok(removed) if removed > 0 => {
                            debug!("Rate limit janitor: removed {} expired entries.", removed);
                        }
                        Ok(_) => {}
                        Err(e) => {
                            error!("Rate limit sweep failed: {}. Restarting after backoff.", e);
                            tokio::select! {
                                _ = tokio::time::sleep(RETRY_BACKOFF) => {}
                                _ = shutdown_rx.recv() => {
                                    info!("Rate limit janitor shutting down.");
                                    return;
                                }
                            }
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Rate limit janitor shutting down.");
                    return;
                }
            }
        }
    }

    /// One sweep: prune expired marks from every window key, deleting keys
    /// that end up empty. Runs on a single cache connection.
    async fn sweep(&self) -> Result<u64, PixeldError> {
        let mut conn = self.state.redis.get().await?;
        let now = Utc::now().timestamp() as f64;
        let mut removed = 0u64;

        let mut cursor: u64 = 0;
        loop {
            let (next, keys): (u64, Vec<String>) = deadpool_redis::redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(WINDOW_KEY_PATTERN)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut conn)
                .await?;

            for key in keys {
                let pruned: i64 = conn.zrembyscore(&key, f64::NEG_INFINITY, now).await?;
                removed += pruned.max(0) as u64;
                let left: i64 = conn.zcard(&key).await?;
                if left == 0 {
                    let _: i64 = conn.del(&key).await?;
                }
            }

            if next == 0 {
                break;
            }
            cursor = next;
        }

        Ok(removed)
    }
}
