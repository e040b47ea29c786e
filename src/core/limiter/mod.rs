// src/core/limiter/mod.rs

//! The distributed rate limiter: per-subject sliding windows plus cooldown
//! penalties, backed by the shared cache so every worker enforces the same
//! limits.
//!
//! Window accounting uses a sorted set per `(route, subject)`: members are
//! random marks, scores are the instant each mark leaves the window. A
//! cooldown is a single key with a TTL. Both tiers live only in the cache;
//! the relational store is not involved.
//!
//! The prune/count/record sequence is not atomic across workers, so two
//! racing admits can both observe occupancy just below the limit. At most
//! one extra admit slips through under contention.

use crate::config::{Config, RateKnobs};
use crate::core::PixeldError;
use crate::core::auth::AuthResult;
use crate::core::models::AuthState;
use chrono::Utc;
use deadpool_redis::redis::AsyncCommands;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Which subject a bucket accounts against, and what authentication the
/// route requires before any accounting happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketKind {
    /// Per authenticated user.
    User,
    /// Per authenticated moderator.
    Mod,
    /// One shared bucket for everyone; no authentication requirement.
    Global,
}

/// Quota headers attached to every accounted response and to HEAD probes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaHeaders {
    /// Requests left in the current window; never below zero on a response.
    pub remaining: i64,
    pub limit: u32,
    pub period: u64,
    /// Seconds until the oldest in-window entry expires, -1 for an empty
    /// window.
    pub reset: i64,
}

/// A successful admit. Carries the recorded mark so a later 4xx response can
/// be forgiven when the bucket does not count failed requests.
#[derive(Debug, Clone)]
pub struct Grant {
    pub mark: Option<String>,
    pub headers: QuotaHeaders,
}

/// The outcome of consulting a bucket. Explicit data, not control flow: the
/// HTTP edge maps each case onto status codes and headers.
#[derive(Debug, Clone)]
pub enum RateLimitDecision {
    /// The bucket's bypass predicate fired; nothing was accounted.
    Bypassed,
    Allowed(Grant),
    /// Blocked. `reset` is the number of seconds until the cooldown ends.
    Cooldown { reset: i64 },
}

/// A first-class rate limit bucket attached to a route at registration time.
pub struct RouteLimiter {
    /// Stable route identity; namespaces all cache keys for this bucket.
    name: String,
    pub limits: RateKnobs,
    pub kind: BucketKind,
    /// When false, 4xx responses hand their quota back.
    pub count_failed: bool,
    bypass: Option<Box<dyn Fn() -> bool + Send + Sync>>,
}

impl RouteLimiter {
    pub fn new(name: &str, limits: RateKnobs, kind: BucketKind) -> Self {
        Self {
            name: name.to_string(),
            limits,
            kind,
            count_failed: true,
            bypass: None,
        }
    }

    /// Joins another handler onto this bucket. Shared buckets concatenate
    /// their route identities so the cache keys stay stable no matter which
    /// handler records first.
    pub fn shared_with(mut self, name: &str) -> Self {
        self.name.push('|');
        self.name.push_str(name);
        self
    }

    pub fn with_count_failed(mut self, count_failed: bool) -> Self {
        self.count_failed = count_failed;
        self
    }

    pub fn with_bypass(mut self, bypass: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        self.bypass = Some(Box::new(bypass));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this bucket's bypass predicate currently waves requests
    /// through without any accounting.
    pub fn bypassed(&self) -> bool {
        self.bypass.as_ref().is_some_and(|f| f())
    }

    /// Cache key for the sliding-window sorted set.
    pub fn window_key(&self, subject: Option<i64>) -> String {
        match subject {
            Some(user) => format!("interaction-{}-{}", self.name, user),
            None => format!("interaction-{}", self.name),
        }
    }

    /// Cache key for the cooldown marker.
    pub fn cooldown_key(&self, subject: Option<i64>) -> String {
        match subject {
            Some(user) => format!("cooldown-{}-{}", self.name, user),
            None => format!("cooldown-{}", self.name),
        }
    }

    /// Resolves the accounting subject from the request's auth outcome,
    /// enforcing the authentication this bucket kind requires.
    pub fn subject(&self, auth: &AuthResult) -> Result<Option<i64>, PixeldError> {
        match self.kind {
            BucketKind::Global => Ok(None),
            BucketKind::User => auth.require_user().map(Some),
            BucketKind::Mod => auth.require_mod().map(Some),
        }
    }

    /// Consults and consumes quota for one request.
    pub async fn acquire(
        &self,
        conn: &mut deadpool_redis::Connection,
        subject: Option<i64>,
    ) -> Result<RateLimitDecision, PixeldError> {
        if self.bypassed() {
            return Ok(RateLimitDecision::Bypassed);
        }
        if let Some(reset) = self.cooldown_remaining(conn, subject).await? {
            debug!("subject {:?} of {} is already on cooldown", subject, self.name);
            return Ok(RateLimitDecision::Cooldown { reset });
        }

        let now = epoch_now();
        let key = self.window_key(subject);
        // An over-full window can only be left behind by a tripped cooldown,
        // so reaching here with one means that cooldown has expired. Wipe
        // both tiers and let the subject start a fresh window.
        if self.remaining_requests(conn, &key, now).await? < 0 {
            self.clear_bucket(conn, subject).await?;
            debug!(
                "collapsed expired cooldown state for {:?} on {}",
                subject, self.name
            );
        }

        let mark = Uuid::new_v4().to_string();
        let _: () = conn
            .zadd(&key, &mark, now + self.limits.window_secs as f64)
            .await?;
        let _: bool = conn.expire(&key, self.limits.window_secs as i64).await?;
        debug!("recorded interaction of {:?} on {}", subject, self.name);

        let remaining = self.remaining_requests(conn, &key, now).await?;
        if remaining < 0 {
            self.trigger_cooldown(conn, subject).await?;
            let reset = self
                .cooldown_remaining(conn, subject)
                .await?
                .unwrap_or(self.limits.cooldown_secs as i64);
            return Ok(RateLimitDecision::Cooldown { reset });
        }

        let reset = self.reset_time(conn, &key, now).await?;
        Ok(RateLimitDecision::Allowed(Grant {
            mark: Some(mark),
            headers: QuotaHeaders {
                remaining,
                limit: self.limits.amount,
                period: self.limits.window_secs,
                reset,
            },
        }))
    }

    /// The probe variant of [`RouteLimiter::acquire`] for the HEAD twin:
    /// same headers, no interaction recorded.
    pub async fn check(
        &self,
        conn: &mut deadpool_redis::Connection,
        subject: Option<i64>,
    ) -> Result<RateLimitDecision, PixeldError> {
        if self.bypassed() {
            return Ok(RateLimitDecision::Bypassed);
        }
        if let Some(reset) = self.cooldown_remaining(conn, subject).await? {
            return Ok(RateLimitDecision::Cooldown { reset });
        }

        let now = epoch_now();
        let key = self.window_key(subject);
        let mut remaining = self.remaining_requests(conn, &key, now).await?;
        // Same collapse as the accounted path, so the probe reports what an
        // accounted call would actually see.
        if remaining < 0 {
            self.clear_bucket(conn, subject).await?;
            remaining = self.limits.amount as i64;
        }
        let reset = self.reset_time(conn, &key, now).await?;
        Ok(RateLimitDecision::Allowed(Grant {
            mark: None,
            headers: QuotaHeaders {
                remaining,
                limit: self.limits.amount,
                period: self.limits.window_secs,
                reset,
            },
        }))
    }

    /// Hands a recorded interaction back, for 4xx responses on buckets that
    /// do not count failed requests.
    pub async fn forgive(
        &self,
        conn: &mut deadpool_redis::Connection,
        subject: Option<i64>,
        grant: &Grant,
    ) -> Result<(), PixeldError> {
        if let Some(mark) = &grant.mark {
            let _: i64 = conn.zrem(self.window_key(subject), mark).await?;
        }
        Ok(())
    }

    /// Wipes both tiers of state for a subject: window marks and cooldown.
    /// Invoked when an expired cooldown leaves an over-full window behind.
    async fn clear_bucket(
        &self,
        conn: &mut deadpool_redis::Connection,
        subject: Option<i64>,
    ) -> Result<(), PixeldError> {
        let _: i64 = conn
            .del(vec![self.window_key(subject), self.cooldown_key(subject)])
            .await?;
        Ok(())
    }

    /// Prunes expired marks and returns the remaining quota. Negative means
    /// the window is over-full and a cooldown is due.
    async fn remaining_requests(
        &self,
        conn: &mut deadpool_redis::Connection,
        key: &str,
        now: f64,
    ) -> Result<i64, PixeldError> {
        let _: i64 = conn.zrembyscore(key, f64::NEG_INFINITY, now).await?;
        let count: i64 = conn.zcard(key).await?;
        Ok(self.limits.amount as i64 - count)
    }

    /// Seconds until the oldest in-window entry expires, or -1 for an empty
    /// window.
    async fn reset_time(
        &self,
        conn: &mut deadpool_redis::Connection,
        key: &str,
        now: f64,
    ) -> Result<i64, PixeldError> {
        let oldest: Vec<(String, f64)> = conn.zrange_withscores(key, 0, 0).await?;
        Ok(match oldest.first() {
            Some((_, score)) => (score - now).ceil() as i64,
            None => -1,
        })
    }

    async fn trigger_cooldown(
        &self,
        conn: &mut deadpool_redis::Connection,
        subject: Option<i64>,
    ) -> Result<(), PixeldError> {
        info!(
            "triggering cooldown for {:?} on {} for {} seconds",
            subject, self.name, self.limits.cooldown_secs
        );
        let _: () = conn
            .set_ex(self.cooldown_key(subject), 1, self.limits.cooldown_secs)
            .await?;
        Ok(())
    }

    async fn cooldown_remaining(
        &self,
        conn: &mut deadpool_redis::Connection,
        subject: Option<i64>,
    ) -> Result<Option<i64>, PixeldError> {
        let key = self.cooldown_key(subject);
        let active: Option<String> = conn.get(&key).await?;
        if active.is_none() {
            return Ok(None);
        }
        let ttl: i64 = conn.ttl(&key).await?;
        Ok(Some(ttl.max(0)))
    }
}

/// Wall-clock seconds since the epoch, with millisecond precision. Window
/// scores are expiry instants on this axis.
fn epoch_now() -> f64 {
    let now = Utc::now();
    now.timestamp() as f64 + f64::from(now.timestamp_subsec_millis()) / 1000.0
}

/// Every bucket in the service, plus the route→limiter map the HTTP surface
/// uses to mount HEAD quota probes. The limiter never reaches for the
/// router; registration is a hook the surface calls.
pub struct Limiters {
    pub get_pixels: Arc<RouteLimiter>,
    pub get_pixel: Arc<RouteLimiter>,
    pub put_pixel: Arc<RouteLimiter>,
    by_path: HashMap<&'static str, Arc<RouteLimiter>>,
}

impl Limiters {
    pub fn from_config(config: &Config) -> Self {
        // Dev and load-test instances can switch accounting off entirely.
        let bypass_all = config.rate_limit_bypass;
        Self {
            get_pixels: Arc::new(
                RouteLimiter::new("canvas_pixels", config.quotas.get_pixels, BucketKind::User)
                    .with_bypass(move || bypass_all),
            ),
            get_pixel: Arc::new(
                RouteLimiter::new("get_pixel", config.quotas.get_pixel, BucketKind::User)
                    .with_bypass(move || bypass_all),
            ),
            put_pixel: Arc::new(
                RouteLimiter::new("put_pixel", config.quotas.put_pixel, BucketKind::User)
                    .with_bypass(move || bypass_all),
            ),
            by_path: HashMap::new(),
        }
    }

    /// Registers the bucket probed at `path`. The first registration wins
    /// when several limited methods share one path.
    pub fn register(&mut self, path: &'static str, limiter: &Arc<RouteLimiter>) {
        self.by_path.entry(path).or_insert_with(|| limiter.clone());
    }

    pub fn probe_target(&self, path: &str) -> Option<&Arc<RouteLimiter>> {
        self.by_path.get(path)
    }

    pub fn probe_paths(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.by_path.keys().copied()
    }
}
