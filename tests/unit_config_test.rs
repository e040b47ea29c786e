use pixeld::config::Config;
use std::collections::HashMap;
use std::io::Write;

fn base_env() -> HashMap<String, String> {
    let mut env = HashMap::new();
    for (k, v) in [
        ("DATABASE_URL", "postgres://localhost/pixeld"),
        ("REDIS_URL", "redis://localhost"),
        ("CLIENT_ID", "client-id"),
        ("CLIENT_SECRET", "client-secret"),
        ("AUTH_URL", "https://provider/authorize"),
        ("JWT_SECRET", "jwt-secret"),
        ("GIT_SHA", "deadbeef"),
        ("WEBHOOK_URL", "https://hooks.example/1"),
        ("MODS_FILE", "/nonexistent/mods.txt"),
    ] {
        env.insert(k.to_string(), v.to_string());
    }
    env
}

fn load(env: &HashMap<String, String>) -> anyhow::Result<Config> {
    Config::from_lookup(|key| env.get(key).cloned())
}

#[test]
fn test_config_defaults() {
    let config = load(&base_env()).unwrap();
    assert_eq!(config.host, "0.0.0.0");
    assert_eq!(config.port, 8000);
    assert_eq!(config.width, 272);
    assert_eq!(config.height, 153);
    assert_eq!(config.min_pool_size, 2);
    assert_eq!(config.max_pool_size, 5);
    assert_eq!(config.log_level, "info");
    assert!(!config.production);
    assert!(config.mods.is_empty());

    assert_eq!(config.quotas.put_pixel.amount, 6);
    assert_eq!(config.quotas.put_pixel.window_secs, 120);
    assert_eq!(config.quotas.put_pixel.cooldown_secs, 180);
    assert_eq!(config.quotas.get_pixel.amount, 8);
    assert_eq!(config.quotas.get_pixels.cooldown_secs, 60);
}

#[test]
fn test_config_canvas_key_includes_build_identifier() {
    let config = load(&base_env()).unwrap();
    assert_eq!(config.canvas_key(), "deadbeef-canvas-cache");
    assert_eq!(config.flat_len(), 272 * 153 * 3);
}

#[test]
fn test_config_missing_required_variable() {
    let mut env = base_env();
    env.remove("JWT_SECRET");
    let err = load(&env).unwrap_err();
    assert!(err.to_string().contains("JWT_SECRET"));
}

#[test]
fn test_config_auth_url_is_percent_decoded() {
    let mut env = base_env();
    env.insert(
        "AUTH_URL".into(),
        "https://provider/authorize%3Fclient_id%3D1%26scope%3Didentify".into(),
    );
    let config = load(&env).unwrap();
    assert_eq!(
        config.auth_url,
        "https://provider/authorize?client_id=1&scope=identify"
    );
}

#[test]
fn test_config_quota_overrides() {
    let mut env = base_env();
    env.insert("PUT_PIXEL_AMOUNT".into(), "2".into());
    env.insert("PUT_PIXEL_RATE_LIMIT".into(), "10".into());
    env.insert("PUT_PIXEL_RATE_COOLDOWN".into(), "5".into());
    let config = load(&env).unwrap();
    assert_eq!(config.quotas.put_pixel.amount, 2);
    assert_eq!(config.quotas.put_pixel.window_secs, 10);
    assert_eq!(config.quotas.put_pixel.cooldown_secs, 5);
}

#[test]
fn test_config_rate_limit_bypass_defaults_off() {
    let config = load(&base_env()).unwrap();
    assert!(!config.rate_limit_bypass);

    let mut env = base_env();
    env.insert("RATE_LIMIT_BYPASS".into(), "true".into());
    assert!(load(&env).unwrap().rate_limit_bypass);
}

#[test]
fn test_config_rejects_invalid_numbers() {
    let mut env = base_env();
    env.insert("PORT".into(), "not-a-port".into());
    assert!(load(&env).is_err());
}

#[test]
fn test_config_rejects_zero_canvas() {
    let mut env = base_env();
    env.insert("CANVAS_WIDTH".into(), "0".into());
    assert!(load(&env).is_err());
}

#[test]
fn test_config_rejects_inverted_pool_bounds() {
    let mut env = base_env();
    env.insert("MIN_POOL_SIZE".into(), "6".into());
    env.insert("MAX_POOL_SIZE".into(), "5".into());
    assert!(load(&env).is_err());
}

#[test]
fn test_config_size_change_changes_flat_len() {
    let mut env = base_env();
    env.insert("CANVAS_WIDTH".into(), "4".into());
    env.insert("CANVAS_HEIGHT".into(), "2".into());
    let config = load(&env).unwrap();
    assert_eq!(config.flat_len(), 24);

    env.insert("CANVAS_WIDTH".into(), "8".into());
    let config = load(&env).unwrap();
    assert_eq!(config.flat_len(), 48);
}

#[test]
fn test_config_loads_mods_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "80528701850124288 1234\n5678").unwrap();

    let mut env = base_env();
    env.insert(
        "MODS_FILE".into(),
        file.path().to_str().unwrap().to_string(),
    );
    let config = load(&env).unwrap();
    assert_eq!(config.mods, vec![80528701850124288, 1234, 5678]);
}

#[test]
fn test_config_rejects_malformed_mods_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "80528701850124288 not-a-snowflake").unwrap();

    let mut env = base_env();
    env.insert(
        "MODS_FILE".into(),
        file.path().to_str().unwrap().to_string(),
    );
    assert!(load(&env).is_err());
}
