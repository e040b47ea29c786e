// src/server/initialization.rs

//! Handles the complete server initialization process: connection pools,
//! schema migrations, shared state, and the initial cache sync.

use crate::config::Config;
use crate::core::auth::tokens::CookieSealer;
use crate::core::canvas::Canvas;
use crate::core::limiter::Limiters;
use crate::core::state::AppState;
use anyhow::{Context, Result};
use deadpool_redis::Runtime;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing::info;

/// Initializes all server components before starting the main loop.
pub async fn setup(config: Config) -> Result<AppState> {
    let db = PgPoolOptions::new()
        .min_connections(config.min_pool_size)
        .max_connections(config.max_pool_size)
        .connect(&config.database_url)
        .await
        .context("failed to connect to the database")?;
    info!(
        "Database pool ready (min {}, max {}).",
        config.min_pool_size, config.max_pool_size
    );

    sqlx::migrate!("./migrations")
        .run(&db)
        .await
        .context("failed to run database migrations")?;

    let redis = deadpool_redis::Config::from_url(&config.redis_url)
        .create_pool(Some(Runtime::Tokio1))
        .context("failed to create the cache pool")?;

    let canvas = Canvas::new(
        redis.clone(),
        config.canvas_key(),
        config.width,
        config.height,
    );

    let mut limiters = Limiters::from_config(&config);
    super::routes::register_probes(&mut limiters);

    let state = AppState {
        db,
        redis,
        canvas,
        config: Arc::new(config),
        http: reqwest::Client::new(),
        sealer: Arc::new(CookieSealer::new_random()),
        limiters: Arc::new(limiters),
    };

    // A fresh deployment, a canvas size change, or writes that landed while
    // this worker was down all surface here as a rebuild before serving.
    state.canvas.sync_cache(&state.db, false).await?;
    info!("Server state initialized.");

    Ok(state)
}
