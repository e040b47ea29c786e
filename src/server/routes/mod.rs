// src/server/routes/mod.rs

//! Route registration and the rate-limit dispatch glue between the HTTP
//! surface and the limiter capability.

mod authorization;
mod general;
mod moderation;

use super::error::{self, ApiError};
use super::extract::Auth;
use crate::core::PixeldError;
use crate::core::auth::AuthResult;
use crate::core::limiter::{Limiters, QuotaHeaders, RateLimitDecision, RouteLimiter};
use crate::core::state::AppState;
use axum::extract::{MatchedPath, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, head, post};
use axum::{Json, Router};
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

const REQUESTS_REMAINING: HeaderName = HeaderName::from_static("requests-remaining");
const REQUESTS_LIMIT: HeaderName = HeaderName::from_static("requests-limit");
const REQUESTS_PERIOD: HeaderName = HeaderName::from_static("requests-period");
const REQUESTS_RESET: HeaderName = HeaderName::from_static("requests-reset");
const COOLDOWN_RESET: HeaderName = HeaderName::from_static("cooldown-reset");

/// Fills the route→limiter map consumed by the HEAD quota probes. Called by
/// initialization before the state is frozen; the limiter itself never
/// touches the router.
pub fn register_probes(limiters: &mut Limiters) {
    let get_pixels = limiters.get_pixels.clone();
    let get_pixel = limiters.get_pixel.clone();
    limiters.register("/canvas/pixels", &get_pixels);
    // Two limited methods share this path; the probe reports the GET bucket.
    limiters.register("/canvas/pixel", &get_pixel);
}

/// Builds the complete HTTP surface.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::HEAD])
        .allow_headers(Any);

    let mut router = Router::new()
        .route("/", get(general::index))
        .route("/docs", get(general::docs))
        .route("/authorize", get(authorization::authorize))
        .route("/callback", get(authorization::callback))
        .route("/show_token", get(authorization::show_token))
        .route("/size", get(general::size))
        .route("/canvas/pixels", get(general::canvas_pixels))
        .route(
            "/canvas/pixel",
            get(general::get_pixel).put(general::put_pixel),
        )
        .route("/mod", get(moderation::mod_check))
        .route("/set_mod", post(moderation::set_mod))
        .route("/mod_ban", post(moderation::mod_ban))
        .route("/pixel_history", get(moderation::pixel_history))
        .route("/webhook", post(moderation::webhook))
        .route("/token", delete(moderation::reset_token))
        .route("/refresh_cache", post(moderation::refresh_cache));

    // Every rate-limited path gets a HEAD twin that reports quota headers
    // without executing the route.
    for path in state.limiters.probe_paths() {
        router = router.route(path, head(quota_probe));
    }

    router
        .fallback(error::not_found)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn apply_quota_headers(headers: &mut HeaderMap, quota: &QuotaHeaders) {
    headers.insert(REQUESTS_REMAINING, HeaderValue::from(quota.remaining));
    headers.insert(REQUESTS_LIMIT, HeaderValue::from(quota.limit));
    headers.insert(REQUESTS_PERIOD, HeaderValue::from(quota.period));
    headers.insert(REQUESTS_RESET, HeaderValue::from(quota.reset));
}

fn cooldown_response(reset: i64) -> Response {
    let mut response = (
        StatusCode::TOO_MANY_REQUESTS,
        Json(json!({ "message": "You are currently on cooldown. Try again later." })),
    )
        .into_response();
    response
        .headers_mut()
        .insert(COOLDOWN_RESET, HeaderValue::from(reset));
    response
}

/// Gates and accounts one request against a bucket, then runs the route.
///
/// Auth requirements and cooldowns short-circuit before the handler body;
/// backend failures surface as 500, never as a silent bypass. When the
/// bucket does not count failed requests, a 4xx response hands its
/// recorded mark back.
async fn dispatch<F, Fut>(
    state: &AppState,
    limiter: &Arc<RouteLimiter>,
    auth: &AuthResult,
    run: F,
) -> Result<Response, ApiError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Response, ApiError>>,
{
    let subject = limiter.subject(auth)?;
    let mut conn = state.redis.get().await.map_err(PixeldError::from)?;

    match limiter.acquire(&mut conn, subject).await? {
        RateLimitDecision::Bypassed => run().await,
        RateLimitDecision::Cooldown { reset } => Ok(cooldown_response(reset)),
        RateLimitDecision::Allowed(grant) => {
            let mut response = match run().await {
                Ok(response) => response,
                Err(e) => e.into_response(),
            };
            if !limiter.count_failed && response.status().is_client_error() {
                if let Err(e) = limiter.forgive(&mut conn, subject, &grant).await {
                    warn!("failed to refund rate limit mark: {}", e);
                }
            }
            apply_quota_headers(response.headers_mut(), &grant.headers);
            Ok(response)
        }
    }
}

/// The HEAD twin of a rate-limited route: same quota headers (or
/// `Cooldown-Reset`), nothing accounted, route not executed.
async fn quota_probe(
    State(state): State<AppState>,
    matched: MatchedPath,
    Auth(auth): Auth,
) -> Result<Response, ApiError> {
    let Some(limiter) = state.limiters.probe_target(matched.as_str()) else {
        return Ok(StatusCode::NOT_FOUND.into_response());
    };
    let subject = limiter.subject(&auth)?;
    let mut conn = state.redis.get().await.map_err(PixeldError::from)?;

    let mut response = StatusCode::OK.into_response();
    match limiter.check(&mut conn, subject).await? {
        RateLimitDecision::Bypassed => {}
        RateLimitDecision::Cooldown { reset } => {
            response
                .headers_mut()
                .insert(COOLDOWN_RESET, HeaderValue::from(reset));
        }
        RateLimitDecision::Allowed(grant) => {
            apply_quota_headers(response.headers_mut(), &grant.headers);
        }
    }
    Ok(response)
}
