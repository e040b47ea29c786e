use pixeld::core::auth::tokens::{CookieSealer, TokenClaims, decode_token, encode_token, generate_salt};

const SECRET: &str = "unit-test-secret";

#[test]
fn test_token_round_trip() {
    let claims = TokenClaims {
        id: "80528701850124288".to_string(),
        salt: generate_salt(),
    };
    let token = encode_token(SECRET, &claims).unwrap();
    let decoded = decode_token(SECRET, &token).unwrap();
    assert_eq!(decoded.id, claims.id);
    assert_eq!(decoded.salt, claims.salt);
}

#[test]
fn test_token_rejected_with_wrong_secret() {
    let claims = TokenClaims {
        id: "1".to_string(),
        salt: generate_salt(),
    };
    let token = encode_token(SECRET, &claims).unwrap();
    assert!(decode_token("another-secret", &token).is_err());
}

#[test]
fn test_token_rejected_when_garbage() {
    assert!(decode_token(SECRET, "not-a-token").is_err());
    assert!(decode_token(SECRET, "").is_err());
}

#[test]
fn test_salt_is_url_safe_and_unique() {
    let salt = generate_salt();
    assert_eq!(salt.len(), 22);
    assert!(
        salt.chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    );
    assert_ne!(salt, generate_salt());
}

#[test]
fn test_cookie_seal_round_trip() {
    let sealer = CookieSealer::new_random();
    let sealed = sealer.seal("my-api-token").unwrap();
    assert_ne!(sealed, "my-api-token");
    assert_eq!(sealer.unseal(&sealed).unwrap(), "my-api-token");
}

#[test]
fn test_cookie_seal_does_not_survive_restart() {
    // A new process gets a new sealer key, so cookies minted before a
    // restart stop unsealing.
    let sealed = CookieSealer::new_random().seal("my-api-token").unwrap();
    assert!(CookieSealer::new_random().unseal(&sealed).is_err());
}
