use pixeld::PixeldError;
use pixeld::core::auth::{AuthResult, UserRow, classify};
use pixeld::core::models::AuthState;

fn row(salt: &str, is_mod: bool, is_banned: bool) -> UserRow {
    UserRow {
        key_salt: salt.to_string(),
        is_mod,
        is_banned,
    }
}

#[test]
fn test_classify_unknown_user_is_invalid() {
    assert_eq!(classify(None, "salt"), AuthState::InvalidToken);
}

#[test]
fn test_classify_rotated_salt_is_invalid() {
    let user = row("current-salt", false, false);
    assert_eq!(classify(Some(&user), "old-salt"), AuthState::InvalidToken);
}

#[test]
fn test_classify_matching_salt_is_user() {
    let user = row("salt", false, false);
    assert_eq!(classify(Some(&user), "salt"), AuthState::User);
}

#[test]
fn test_classify_mod() {
    let user = row("salt", true, false);
    assert_eq!(classify(Some(&user), "salt"), AuthState::Moderator);
}

#[test]
fn test_classify_banned_outranks_moderator() {
    let user = row("salt", true, true);
    assert_eq!(classify(Some(&user), "salt"), AuthState::Banned);
}

#[test]
fn test_classify_salt_mismatch_outranks_banned() {
    // A rotated salt means the token is dead, whatever else the row says.
    let user = row("salt", true, true);
    assert_eq!(classify(Some(&user), "stale"), AuthState::InvalidToken);
}

#[test]
fn test_require_user_accepts_user_and_mod() {
    let auth = AuthResult {
        state: AuthState::User,
        user_id: Some(7),
    };
    assert_eq!(auth.require_user().unwrap(), 7);

    let auth = AuthResult {
        state: AuthState::Moderator,
        user_id: Some(8),
    };
    assert_eq!(auth.require_user().unwrap(), 8);
}

#[test]
fn test_require_user_rejects_failed_outcomes() {
    let auth = AuthResult {
        state: AuthState::NoToken,
        user_id: None,
    };
    assert!(matches!(
        auth.require_user().unwrap_err(),
        PixeldError::Auth(AuthState::NoToken)
    ));

    let auth = AuthResult {
        state: AuthState::Banned,
        user_id: Some(9),
    };
    assert!(matches!(
        auth.require_user().unwrap_err(),
        PixeldError::Auth(AuthState::Banned)
    ));
}

#[test]
fn test_require_mod_rejects_plain_user() {
    let auth = AuthResult {
        state: AuthState::User,
        user_id: Some(7),
    };
    assert!(matches!(
        auth.require_mod().unwrap_err(),
        PixeldError::Auth(AuthState::NeedsModerator)
    ));
}

#[test]
fn test_require_mod_accepts_moderator() {
    let auth = AuthResult {
        state: AuthState::Moderator,
        user_id: Some(8),
    };
    assert_eq!(auth.require_mod().unwrap(), 8);
}
