// src/server/mod.rs

use crate::config::Config;
use crate::core::tasks::janitor::RateLimitJanitor;
use anyhow::Result;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::info;

mod error;
mod extract;
mod initialization;
mod routes;

pub use error::ApiError;

/// The main server startup function, orchestrating all setup phases.
pub async fn run(config: Config) -> Result<()> {
    // 1. Initialize pools, migrations, shared state, and the first cache sync.
    let state = initialization::setup(config).await?;

    // 2. Spawn the background janitor and wire up shutdown signalling.
    let (shutdown_tx, _) = broadcast::channel(1);

    let janitor = RateLimitJanitor::new(state.clone());
    let janitor_rx = shutdown_tx.subscribe();
    let janitor_handle = tokio::spawn(janitor.run(janitor_rx));

    let signal_tx = shutdown_tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received.");
            signal_tx.send(()).ok();
        }
    });

    // 3. Serve the HTTP surface until shutdown.
    let addr = (state.config.host.clone(), state.config.port);
    let listener = TcpListener::bind(addr).await?;
    info!(
        "Pixeld server listening on {}:{}",
        state.config.host, state.config.port
    );

    let app = routes::router(state);
    let mut shutdown_rx = shutdown_tx.subscribe();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_rx.recv().await.ok();
        })
        .await?;

    janitor_handle.await.ok();
    info!("Server stopped.");
    Ok(())
}
