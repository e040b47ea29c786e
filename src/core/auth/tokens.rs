// src/core/auth/tokens.rs

//! Bearer token mint and the short-lived cookie wrap used by the OAuth
//! callback redirect.
//!
//! Tokens are HS256 JWTs over `{id, salt}`. The salt lives on the user row;
//! re-minting rotates it, which invalidates every previously issued token
//! for that user without a revocation list.

use crate::core::PixeldError;
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

/// How long the `/show_token` cookie lives, in seconds.
pub const COOKIE_MAX_AGE: i64 = 10;

/// The claims embedded in an issued bearer token. Tokens carry no expiry;
/// salt rotation is the invalidation mechanism.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    pub id: String,
    pub salt: String,
}

/// Generates a fresh URL-safe salt from 16 random bytes (22 characters).
pub fn generate_salt() -> String {
    let mut bytes = [0u8; 16];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

pub fn encode_token(secret: &str, claims: &TokenClaims) -> Result<String, PixeldError> {
    Ok(jsonwebtoken::encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?)
}

pub fn decode_token(secret: &str, token: &str) -> Result<TokenClaims, PixeldError> {
    // Bearer tokens carry no expiry claim, so required-claim validation is
    // disabled. Integrity still rests on the signature.
    let mut validation = Validation::new(Algorithm::HS256);
    validation.required_spec_claims.clear();
    validation.validate_exp = false;
    let data = jsonwebtoken::decode::<TokenClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )?;
    Ok(data.claims)
}

/// Ensure a user exists and create a new token for them.
///
/// If the user already exists, their salt is rotated and all outstanding
/// tokens are invalidated. A banned user cannot have a token minted.
pub async fn reset_user_token(
    db: &PgPool,
    jwt_secret: &str,
    mods: &[i64],
    user_id: i64,
) -> Result<String, PixeldError> {
    let is_banned: Option<bool> = sqlx::query_scalar("SELECT is_banned FROM users WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(db)
        .await?;
    if is_banned == Some(true) {
        return Err(PixeldError::Banned);
    }

    let salt = generate_salt();
    let is_mod = mods.contains(&user_id);
    sqlx::query(
        "INSERT INTO users (user_id, key_salt, is_mod) VALUES ($1, $2, $3) \
         ON CONFLICT (user_id) DO UPDATE SET key_salt = EXCLUDED.key_salt",
    )
    .bind(user_id)
    .bind(&salt)
    .bind(is_mod)
    .execute(db)
    .await?;

    encode_token(
        jwt_secret,
        &TokenClaims {
            id: user_id.to_string(),
            salt,
        },
    )
}

#[derive(Debug, Serialize, Deserialize)]
struct CookieClaims {
    token: String,
    exp: i64,
}

/// Wraps freshly minted tokens for the `/show_token` redirect cookie.
///
/// The key is random per process, so the wrap only survives within one
/// deployment. That is acceptable: the cookie lives ten seconds. This is a
/// transport confidentiality measure, not an auth measure.
pub struct CookieSealer {
    secret: [u8; 32],
}

impl CookieSealer {
    pub fn new_random() -> Self {
        let mut secret = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut secret);
        Self { secret }
    }

    pub fn seal(&self, token: &str) -> Result<String, PixeldError> {
        let claims = CookieClaims {
            token: token.to_string(),
            exp: chrono::Utc::now().timestamp() + COOKIE_MAX_AGE,
        };
        Ok(jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(&self.secret),
        )?)
    }

    pub fn unseal(&self, sealed: &str) -> Result<String, PixeldError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        let data = jsonwebtoken::decode::<CookieClaims>(
            sealed,
            &DecodingKey::from_secret(&self.secret),
            &validation,
        )?;
        Ok(data.claims.token)
    }
}
