// src/core/errors.rs

//! Defines the primary error type for the entire application.

use crate::core::models::AuthState;
use thiserror::Error;

/// The main error enum, representing all possible failures within the server.
/// Using `thiserror` allows for clean error definitions and automatic `From`
/// trait implementations for the backend drivers.
#[derive(Error, Debug)]
pub enum PixeldError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Cache error: {0}")]
    Cache(#[from] deadpool_redis::redis::RedisError),

    #[error("Cache pool error: {0}")]
    CachePool(String),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("JSON serialization/deserialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image encoding error: {0}")]
    Image(String),

    /// An authentication or authorization outcome that short-circuits the
    /// handler. Carries the outcome so the HTTP edge can pick the status and
    /// detail message.
    #[error("{}", .0.detail())]
    Auth(AuthState),

    /// The subject is banned; minting a token for them is refused.
    #[error("You are banned")]
    Banned,

    /// The OAuth provider response was missing an expected field.
    #[error("Unknown error while creating token")]
    BadExchange(String),

    #[error("Pixel is out of the canvas bounds.")]
    OutOfBounds,

    #[error("{0}")]
    Validation(String),

    #[error("Internal Server Error: {0}")]
    Internal(String),
}

impl From<deadpool_redis::PoolError> for PixeldError {
    fn from(e: deadpool_redis::PoolError) -> Self {
        PixeldError::CachePool(e.to_string())
    }
}

impl From<image::ImageError> for PixeldError {
    fn from(e: image::ImageError) -> Self {
        PixeldError::Image(e.to_string())
    }
}
