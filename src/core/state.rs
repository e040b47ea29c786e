// src/core/state.rs

//! Defines the central `AppState` struct, holding all shared server-wide
//! state. Constructed once at startup and threaded explicitly into the
//! middleware and handler contexts.

use crate::config::Config;
use crate::core::auth::tokens::CookieSealer;
use crate::core::canvas::Canvas;
use crate::core::limiter::Limiters;
use sqlx::PgPool;
use std::sync::Arc;

/// The central struct holding all shared, server-wide state. Cloned into
/// every handler; all fields are cheap handles.
#[derive(Clone)]
pub struct AppState {
    /// The relational store holding users and the append-only pixel history.
    pub db: PgPool,
    /// The shared cache holding the flat canvas buffer and all quota state.
    pub redis: deadpool_redis::Pool,
    /// The canvas engine.
    pub canvas: Canvas,
    /// The resolved, immutable server configuration.
    pub config: Arc<Config>,
    /// Outgoing HTTP client, shared by the OAuth exchange and the webhook.
    pub http: reqwest::Client,
    /// Wraps minted tokens for the `/show_token` redirect cookie.
    pub sealer: Arc<CookieSealer>,
    /// Every rate-limit bucket plus the route→limiter map for HEAD probes.
    pub limiters: Arc<Limiters>,
}
