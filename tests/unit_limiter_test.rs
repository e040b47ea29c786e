use pixeld::PixeldError;
use pixeld::config::RateKnobs;
use pixeld::core::auth::AuthResult;
use pixeld::core::limiter::{BucketKind, RouteLimiter};
use pixeld::core::models::AuthState;

const KNOBS: RateKnobs = RateKnobs {
    amount: 2,
    window_secs: 10,
    cooldown_secs: 5,
};

fn auth(state: AuthState, user_id: Option<i64>) -> AuthResult {
    AuthResult { state, user_id }
}

#[test]
fn test_window_key_includes_route_and_user() {
    let limiter = RouteLimiter::new("put_pixel", KNOBS, BucketKind::User);
    assert_eq!(limiter.window_key(Some(42)), "interaction-put_pixel-42");
    assert_eq!(limiter.cooldown_key(Some(42)), "cooldown-put_pixel-42");
}

#[test]
fn test_global_keys_omit_user_segment() {
    let limiter = RouteLimiter::new("burst", KNOBS, BucketKind::Global);
    assert_eq!(limiter.window_key(None), "interaction-burst");
    assert_eq!(limiter.cooldown_key(None), "cooldown-burst");
}

#[test]
fn test_shared_buckets_join_route_names() {
    let limiter = RouteLimiter::new("get_pixel", KNOBS, BucketKind::User).shared_with("put_pixel");
    assert_eq!(limiter.name(), "get_pixel|put_pixel");
    assert_eq!(
        limiter.window_key(Some(7)),
        "interaction-get_pixel|put_pixel-7"
    );
}

#[test]
fn test_user_bucket_requires_authentication() {
    let limiter = RouteLimiter::new("put_pixel", KNOBS, BucketKind::User);

    let err = limiter
        .subject(&auth(AuthState::NoToken, None))
        .unwrap_err();
    assert!(matches!(err, PixeldError::Auth(AuthState::NoToken)));

    let err = limiter.subject(&auth(AuthState::Banned, Some(1))).unwrap_err();
    assert!(matches!(err, PixeldError::Auth(AuthState::Banned)));

    assert_eq!(
        limiter.subject(&auth(AuthState::User, Some(42))).unwrap(),
        Some(42)
    );
}

#[test]
fn test_mod_bucket_rejects_plain_user() {
    let limiter = RouteLimiter::new("webhook", KNOBS, BucketKind::Mod);

    let err = limiter.subject(&auth(AuthState::User, Some(1))).unwrap_err();
    assert!(matches!(err, PixeldError::Auth(AuthState::NeedsModerator)));

    assert_eq!(
        limiter
            .subject(&auth(AuthState::Moderator, Some(9)))
            .unwrap(),
        Some(9)
    );
}

#[test]
fn test_global_bucket_has_no_auth_requirement() {
    let limiter = RouteLimiter::new("size", KNOBS, BucketKind::Global);
    assert_eq!(limiter.subject(&auth(AuthState::NoToken, None)).unwrap(), None);
}

#[test]
fn test_limits_are_carried_verbatim() {
    let limiter = RouteLimiter::new("put_pixel", KNOBS, BucketKind::User);
    assert_eq!(limiter.limits.amount, 2);
    assert_eq!(limiter.limits.window_secs, 10);
    assert_eq!(limiter.limits.cooldown_secs, 5);
    assert!(limiter.count_failed);
}

#[test]
fn test_count_failed_toggle() {
    let limiter =
        RouteLimiter::new("put_pixel", KNOBS, BucketKind::User).with_count_failed(false);
    assert!(!limiter.count_failed);
}

#[test]
fn test_bypass_defaults_off() {
    let limiter = RouteLimiter::new("put_pixel", KNOBS, BucketKind::User);
    assert!(!limiter.bypassed());
}

#[test]
fn test_bypass_predicate_is_consulted() {
    let limiter = RouteLimiter::new("put_pixel", KNOBS, BucketKind::User).with_bypass(|| true);
    assert!(limiter.bypassed());

    let limiter = RouteLimiter::new("put_pixel", KNOBS, BucketKind::User).with_bypass(|| false);
    assert!(!limiter.bypassed());
}
