// src/core/moderation.rs

//! Moderator operations: promoting users, the ban cascade, and pixel
//! provenance.

use crate::core::PixeldError;
use crate::core::canvas::Canvas;
use sqlx::PgPool;
use std::collections::HashSet;
use tracing::info;

/// Outcome of a `set_mod` request; the endpoint reports each as a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetModOutcome {
    Missing,
    Already,
    Ok,
}

/// Sets `is_mod` for an existing user. Idempotent.
pub async fn set_mod(db: &PgPool, user_id: i64) -> Result<SetModOutcome, PixeldError> {
    let mut tx = db.begin().await?;
    let is_mod: Option<bool> = sqlx::query_scalar("SELECT is_mod FROM users WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;
    let outcome = match is_mod {
        None => SetModOutcome::Missing,
        Some(true) => SetModOutcome::Already,
        Some(false) => {
            sqlx::query("UPDATE users SET is_mod = true WHERE user_id = $1")
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
            SetModOutcome::Ok
        }
    };
    tx.commit().await?;
    Ok(outcome)
}

/// Which of the requested users were banned, and which don't exist.
#[derive(Debug, Clone)]
pub struct BanOutcome {
    pub banned: Vec<i64>,
    pub not_found: Vec<i64>,
}

/// Bans users and retroactively removes their pixels.
///
/// The user flags and the history cascade commit in a single transaction,
/// then the cache is force-rebuilt so the canvas stops showing their work.
pub async fn ban_users(
    db: &PgPool,
    canvas: &Canvas,
    user_ids: &[i64],
) -> Result<BanOutcome, PixeldError> {
    let found: Vec<i64> = sqlx::query_scalar("SELECT user_id FROM users WHERE user_id = ANY($1)")
        .bind(user_ids)
        .fetch_all(db)
        .await?;
    let found_set: HashSet<i64> = found.iter().copied().collect();
    let not_found = user_ids
        .iter()
        .copied()
        .filter(|id| !found_set.contains(id))
        .collect();

    let mut tx = db.begin().await?;
    sqlx::query("UPDATE users SET is_banned = TRUE WHERE user_id = ANY($1)")
        .bind(&found)
        .execute(&mut *tx)
        .await?;
    sqlx::query("UPDATE pixel_history SET deleted = TRUE WHERE user_id = ANY($1)")
        .bind(&found)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    info!("banned users {:?}", found);
    canvas.sync_cache(db, true).await?;

    Ok(BanOutcome {
        banned: found,
        not_found,
    })
}

/// Returns the id of the user who placed the visible pixel at (x, y), or
/// `None` when no non-deleted placement exists there.
pub async fn pixel_history(db: &PgPool, x: u32, y: u32) -> Result<Option<i64>, PixeldError> {
    let user_id: Option<i64> = sqlx::query_scalar(
        "SELECT user_id FROM pixel_history \
         WHERE x = $1 AND y = $2 AND NOT deleted \
         ORDER BY pixel_history_id DESC LIMIT 1",
    )
    .bind(x as i32)
    .bind(y as i32)
    .fetch_optional(db)
    .await?;
    Ok(user_id)
}
