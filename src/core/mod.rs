// src/core/mod.rs

//! The central module containing the core logic and data structures of Pixeld.

pub mod auth;
pub mod canvas;
pub mod errors;
pub mod limiter;
pub mod models;
pub mod moderation;
pub mod state;
pub mod tasks;
pub mod webhook;

pub use errors::PixeldError;
pub use state::AppState;
