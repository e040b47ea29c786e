// src/config.rs

//! Manages server configuration: loading from the environment, resolving
//! defaults, and validation.

use anyhow::{Context, Result, anyhow};
use std::env;
use std::fs;
use std::str::FromStr;
use tracing::warn;

/// The multiplier the default canvas dimensions are derived from. The canvas
/// keeps a 16:9 shape so the webhook upscale stays distortion-free.
const SIZE_MULTIPLIER: u32 = 17;

fn default_width() -> u32 {
    16 * SIZE_MULTIPLIER
}
fn default_height() -> u32 {
    9 * SIZE_MULTIPLIER
}

/// The pixel dimensions of the image pushed to the external webhook.
pub const WEBHOOK_SIZE: (u32, u32) = (1600, 900);

/// Sliding-window quota knobs for one rate-limited route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateKnobs {
    /// Maximum accounted requests inside one window.
    pub amount: u32,
    /// Window length in seconds.
    pub window_secs: u64,
    /// Penalty cooldown in seconds once the window is exceeded.
    pub cooldown_secs: u64,
}

/// Quota knobs for every rate-limited route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaConfig {
    pub put_pixel: RateKnobs,
    pub get_pixel: RateKnobs,
    pub get_pixels: RateKnobs,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            put_pixel: RateKnobs {
                amount: 6,
                window_secs: 120,
                cooldown_secs: 180,
            },
            get_pixel: RateKnobs {
                amount: 8,
                window_secs: 10,
                cooldown_secs: 120,
            },
            get_pixels: RateKnobs {
                amount: 5,
                window_secs: 10,
                cooldown_secs: 60,
            },
        }
    }
}

/// Represents the final, validated, and resolved server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP surface binds to.
    pub host: String,
    pub port: u16,

    // --- Backend connections ---
    pub database_url: String,
    pub redis_url: String,
    /// Connection pool bounds for the relational store.
    pub min_pool_size: u32,
    pub max_pool_size: u32,

    // --- OAuth provider ---
    pub client_id: String,
    pub client_secret: String,
    /// The provider consent URL, stored percent-decoded. The value copied out
    /// of the provider dashboard arrives double-encoded.
    pub auth_url: String,
    pub token_url: String,
    pub user_url: String,

    // --- Service identity ---
    pub base_url: String,
    pub jwt_secret: String,
    /// Namespaces the canvas cache key so a new deployment never adopts a
    /// stale buffer.
    pub git_sha: String,
    pub webhook_url: String,

    pub log_level: String,
    pub production: bool,

    // --- Canvas ---
    pub width: u32,
    pub height: u32,

    /// Snowflakes granted moderator on first token mint.
    pub mods: Vec<i64>,

    pub quotas: QuotaConfig,
    /// Skips all rate-limit accounting. For dev instances and load tests.
    pub rate_limit_bypass: bool,
}

impl Config {
    /// Creates a new `Config` instance by reading the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Creates a new `Config` from an arbitrary variable lookup. Split out
    /// from [`Config::from_env`] so configuration parsing is testable without
    /// mutating the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mods_file = optional(&lookup, "MODS_FILE", "mods.txt");

        let config = Config {
            host: optional(&lookup, "HOST", "0.0.0.0"),
            port: parsed(&lookup, "PORT", 8000)?,
            database_url: required(&lookup, "DATABASE_URL")?,
            redis_url: required(&lookup, "REDIS_URL")?,
            min_pool_size: parsed(&lookup, "MIN_POOL_SIZE", 2)?,
            max_pool_size: parsed(&lookup, "MAX_POOL_SIZE", 5)?,
            client_id: required(&lookup, "CLIENT_ID")?,
            client_secret: required(&lookup, "CLIENT_SECRET")?,
            auth_url: urlencoding::decode(&required(&lookup, "AUTH_URL")?)
                .context("AUTH_URL is not valid percent-encoded UTF-8")?
                .into_owned(),
            token_url: optional(
                &lookup,
                "TOKEN_URL",
                "https://discord.com/api/oauth2/token",
            ),
            user_url: optional(&lookup, "USER_URL", "https://discord.com/api/users/@me"),
            base_url: optional(&lookup, "BASE_URL", "http://127.0.0.1:8000"),
            jwt_secret: required(&lookup, "JWT_SECRET")?,
            git_sha: required(&lookup, "GIT_SHA")?,
            webhook_url: required(&lookup, "WEBHOOK_URL")?,
            log_level: optional(&lookup, "LOG_LEVEL", "info"),
            production: optional(&lookup, "PRODUCTION", "false") == "true",
            width: parsed(&lookup, "CANVAS_WIDTH", default_width())?,
            height: parsed(&lookup, "CANVAS_HEIGHT", default_height())?,
            mods: load_mods(&mods_file)?,
            quotas: QuotaConfig {
                put_pixel: RateKnobs {
                    amount: parsed(&lookup, "PUT_PIXEL_AMOUNT", 6)?,
                    window_secs: parsed(&lookup, "PUT_PIXEL_RATE_LIMIT", 120)?,
                    cooldown_secs: parsed(&lookup, "PUT_PIXEL_RATE_COOLDOWN", 180)?,
                },
                get_pixel: RateKnobs {
                    amount: parsed(&lookup, "GET_PIXEL_AMOUNT", 8)?,
                    window_secs: parsed(&lookup, "GET_PIXEL_RATE_LIMIT", 10)?,
                    cooldown_secs: parsed(&lookup, "GET_PIXEL_RATE_COOLDOWN", 120)?,
                },
                get_pixels: RateKnobs {
                    amount: parsed(&lookup, "GET_PIXELS_AMOUNT", 5)?,
                    window_secs: parsed(&lookup, "GET_PIXELS_RATE_LIMIT", 10)?,
                    cooldown_secs: parsed(&lookup, "GET_PIXELS_RATE_COOLDOWN", 60)?,
                },
            },
            rate_limit_bypass: optional(&lookup, "RATE_LIMIT_BYPASS", "false") == "true",
        };

        config.validate()?;
        Ok(config)
    }

    /// Validates the resolved configuration to ensure logical consistency.
    fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(anyhow!("PORT cannot be 0"));
        }
        if self.host.trim().is_empty() {
            return Err(anyhow!("HOST cannot be empty"));
        }
        if self.width == 0 || self.height == 0 {
            return Err(anyhow!("canvas dimensions cannot be 0"));
        }
        if self.min_pool_size == 0 || self.max_pool_size == 0 {
            return Err(anyhow!("pool sizes cannot be 0"));
        }
        if self.min_pool_size > self.max_pool_size {
            return Err(anyhow!(
                "MIN_POOL_SIZE ({}) cannot exceed MAX_POOL_SIZE ({})",
                self.min_pool_size,
                self.max_pool_size
            ));
        }
        if self.jwt_secret.trim().is_empty() {
            return Err(anyhow!("JWT_SECRET cannot be empty"));
        }
        if self.git_sha.trim().is_empty() {
            return Err(anyhow!("GIT_SHA cannot be empty"));
        }
        for (name, knobs) in [
            ("PUT_PIXEL", self.quotas.put_pixel),
            ("GET_PIXEL", self.quotas.get_pixel),
            ("GET_PIXELS", self.quotas.get_pixels),
        ] {
            if knobs.amount == 0 {
                return Err(anyhow!("{name}_AMOUNT cannot be 0"));
            }
            if knobs.window_secs == 0 {
                return Err(anyhow!("{name}_RATE_LIMIT cannot be 0"));
            }
            if knobs.cooldown_secs == 0 {
                return Err(anyhow!("{name}_RATE_COOLDOWN cannot be 0"));
            }
        }
        if self.production && self.rate_limit_bypass {
            warn!("RATE_LIMIT_BYPASS is enabled on a production instance");
        }
        Ok(())
    }

    /// Byte length the flat canvas buffer must have to be considered fresh.
    pub fn flat_len(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }

    /// The cache key holding the flat canvas buffer, namespaced per build.
    pub fn canvas_key(&self) -> String {
        format!("{}-canvas-cache", self.git_sha)
    }
}

fn required(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<String> {
    lookup(key).ok_or_else(|| anyhow!("missing required environment variable {key}"))
}

fn optional(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> String {
    lookup(key).unwrap_or_else(|| default.to_string())
}

fn parsed<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid value for {key}: '{raw}'")),
        None => Ok(default),
    }
}

/// Loads the moderator allow-list. A missing file is not a startup failure;
/// a malformed entry is.
fn load_mods(path: &str) -> Result<Vec<i64>> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!("mods file '{}' not found, starting with no moderators", path);
            return Ok(Vec::new());
        }
        Err(e) => return Err(e).with_context(|| format!("failed to read mods file '{path}'")),
    };

    contents
        .split_whitespace()
        .map(|entry| {
            entry
                .parse()
                .with_context(|| format!("invalid moderator id '{entry}' in '{path}'"))
        })
        .collect()
}
