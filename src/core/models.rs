// src/core/models.rs

//! Request and response bodies shared by the HTTP surface, plus the color
//! and snowflake validation rules they enforce.

use crate::core::PixeldError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

static RGB_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9a-fA-F]{6}$").unwrap());

/// A 24-bit color. Parsed from the 6-hex-character wire format and
/// re-emitted lowercase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb([u8; 3]);

impl Rgb {
    pub const WHITE: Rgb = Rgb([0xFF, 0xFF, 0xFF]);

    pub fn from_bytes(bytes: [u8; 3]) -> Self {
        Rgb(bytes)
    }

    pub fn bytes(&self) -> [u8; 3] {
        self.0
    }
}

impl FromStr for Rgb {
    type Err = PixeldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if !RGB_RE.is_match(s) {
            return Err(PixeldError::Validation(format!(
                "'{s}' is not a valid color, please use the hexadecimal format RRGGBB, \
                 for example FF00ff for purple."
            )));
        }
        let mut bytes = [0u8; 3];
        hex::decode_to_slice(s, &mut bytes)
            .map_err(|e| PixeldError::Internal(format!("hex decode of validated color: {e}")))?;
        Ok(Rgb(bytes))
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02x}{:02x}{:02x}", self.0[0], self.0[1], self.0[2])
    }
}

/// A pixel as used by the API. `validate` enforces the canvas bounds and the
/// color format before any handler logic runs.
#[derive(Debug, Clone, Deserialize)]
pub struct PixelPayload {
    pub x: i64,
    pub y: i64,
    pub rgb: String,
}

/// A validated pixel placement.
#[derive(Debug, Clone, Copy)]
pub struct Pixel {
    pub x: u32,
    pub y: u32,
    pub rgb: Rgb,
}

impl PixelPayload {
    /// Validates coordinates against the canvas dimensions and parses the
    /// color. Violations map to 422 at the HTTP edge.
    pub fn validate(&self, width: u32, height: u32) -> Result<Pixel, PixeldError> {
        if self.x < 0 || self.x >= i64::from(width) {
            return Err(PixeldError::Validation(format!(
                "x must be inside range(0, {width})"
            )));
        }
        if self.y < 0 || self.y >= i64::from(height) {
            return Err(PixeldError::Validation(format!(
                "y must be inside range(0, {height})"
            )));
        }
        Ok(Pixel {
            x: self.x as u32,
            y: self.y as u32,
            rgb: self.rgb.parse()?,
        })
    }
}

/// A user reference as accepted by the moderation endpoints.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct UserRef {
    pub user_id: i64,
}

impl UserRef {
    /// Ensure the id is a valid snowflake. The serde layer already rejects
    /// values beyond 64 bits; a snowflake is additionally non-negative.
    pub fn validate(&self) -> Result<i64, PixeldError> {
        if self.user_id < 0 {
            return Err(PixeldError::Validation(
                "user_id must fit within a 64 bit int.".to_string(),
            ));
        }
        Ok(self.user_id)
    }
}

/// Represents possible outcomes of a user attempting to authorize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    NoToken,
    BadHeader,
    InvalidToken,
    Banned,
    NeedsModerator,
    User,
    Moderator,
}

impl AuthState {
    /// The human-readable detail returned alongside a failed outcome.
    pub fn detail(&self) -> &'static str {
        match self {
            AuthState::NoToken => {
                "There is no token provided, provide one in an Authorization header in the \
                 format 'Bearer {your token here}' or navigate to /authorize to get one"
            }
            AuthState::BadHeader => "The Authorization header does not specify the Bearer scheme.",
            AuthState::InvalidToken => {
                "The token provided is not a valid token or has expired, navigate to /authorize \
                 to get a new one."
            }
            AuthState::Banned => "You are banned.",
            AuthState::NeedsModerator => "This endpoint is limited to moderators",
            AuthState::User | AuthState::Moderator => "",
        }
    }

    /// Whether this outcome allows the request to proceed at all.
    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthState::User | AuthState::Moderator)
    }
}

/// An API response message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub message: String,
}

impl Message {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Users who were banned from the API, or were not found.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModBanResponse {
    pub banned: Vec<i64>,
    pub not_found: Vec<i64>,
}

/// Pixel provenance for a canvas coordinate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PixelHistoryBody {
    pub user_id: String,
}

/// The size of the pixels canvas.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SizeResponse {
    pub width: u32,
    pub height: u32,
}

/// A pixel read response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PixelBody {
    pub x: u32,
    pub y: u32,
    pub rgb: String,
}
