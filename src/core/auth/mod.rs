// src/core/auth/mod.rs

//! Token verification and the bearer-token lifecycle.

pub mod oauth;
pub mod tokens;

use crate::core::PixeldError;
use crate::core::models::AuthState;
use sqlx::PgPool;

/// The relevant columns of a `users` row for classification.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    pub key_salt: String,
    pub is_mod: bool,
    pub is_banned: bool,
}

/// The outcome of verifying an Authorization header.
#[derive(Debug, Clone, Copy)]
pub struct AuthResult {
    pub state: AuthState,
    pub user_id: Option<i64>,
}

impl AuthResult {
    fn failed(state: AuthState) -> Self {
        Self {
            state,
            user_id: None,
        }
    }

    /// Returns the authenticated user id, or the failed outcome as an error.
    pub fn require_user(&self) -> Result<i64, PixeldError> {
        match self.state {
            AuthState::User | AuthState::Moderator => Ok(self
                .user_id
                .expect("authenticated outcome always carries a user id")),
            state => Err(PixeldError::Auth(state)),
        }
    }

    /// Returns the authenticated moderator id, or the failed outcome as an
    /// error. A plain user maps to `NeedsModerator`.
    pub fn require_mod(&self) -> Result<i64, PixeldError> {
        match self.state {
            AuthState::Moderator => Ok(self
                .user_id
                .expect("authenticated outcome always carries a user id")),
            AuthState::User => Err(PixeldError::Auth(AuthState::NeedsModerator)),
            state => Err(PixeldError::Auth(state)),
        }
    }
}

/// Classifies a user row against the salt embedded in a decoded token.
/// `Banned` outranks `Moderator`.
pub fn classify(row: Option<&UserRow>, token_salt: &str) -> AuthState {
    match row {
        None => AuthState::InvalidToken,
        Some(row) if row.key_salt != token_salt => AuthState::InvalidToken,
        Some(row) if row.is_banned => AuthState::Banned,
        Some(row) if row.is_mod => AuthState::Moderator,
        Some(_) => AuthState::User,
    }
}

/// Attempt to authorize the user given the raw Authorization header value.
pub async fn authorized(
    db: &PgPool,
    jwt_secret: &str,
    authorization: Option<&str>,
) -> Result<AuthResult, PixeldError> {
    let Some(header) = authorization else {
        return Ok(AuthResult::failed(AuthState::NoToken));
    };

    let mut parts = header.splitn(2, ' ');
    let scheme = parts.next().unwrap_or_default();
    let token = parts.next().unwrap_or_default();
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Ok(AuthResult::failed(AuthState::BadHeader));
    }

    let Ok(claims) = tokens::decode_token(jwt_secret, token) else {
        return Ok(AuthResult::failed(AuthState::InvalidToken));
    };
    let Ok(user_id) = claims.id.parse::<i64>() else {
        return Ok(AuthResult::failed(AuthState::InvalidToken));
    };

    let row: Option<UserRow> =
        sqlx::query_as("SELECT key_salt, is_mod, is_banned FROM users WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(db)
            .await?;

    let state = classify(row.as_ref(), &claims.salt);
    let user_id = match state {
        AuthState::InvalidToken => None,
        _ => Some(user_id),
    };
    Ok(AuthResult { state, user_id })
}
