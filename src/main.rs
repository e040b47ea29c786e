// src/main.rs

//! The main entry point for the Pixeld canvas server.

use anyhow::Result;
use pixeld::config::Config;
use pixeld::server;
use std::env;
use tracing::error;
use tracing_subscriber::filter::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Define version information.
    const VERSION: &str = env!("CARGO_PKG_VERSION");

    // Collect command-line arguments to decide the execution mode.
    let args: Vec<String> = env::args().collect();

    // Handle the --version flag.
    if args.contains(&"--version".to_string()) {
        println!("Pixeld version {VERSION}");
        return Ok(());
    }

    // Load optional .env overrides before reading the environment.
    dotenvy::dotenv().ok();

    // Load the server configuration from the environment.
    // If loading fails, print the error and exit, as the server
    // cannot run without a valid configuration.
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration from environment: {e}");
            std::process::exit(1);
        }
    };

    // Get initial log level from env var or config.
    let initial_log_level = env::var("RUST_LOG").unwrap_or_else(|_| config.log_level.clone());

    // Setup logging with compact format and ANSI colors.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(initial_log_level))
        .compact()
        .with_ansi(true)
        .init();

    if let Err(e) = server::run(config).await {
        error!("Server runtime error: {}", e);
        return Err(e);
    }

    Ok(())
}
