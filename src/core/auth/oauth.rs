// src/core/auth/oauth.rs

//! The authorization-code half of the OAuth2 flow against the external
//! identity provider.

use crate::config::Config;
use crate::core::PixeldError;
use serde_json::Value;

/// Exchanges an authorization code for the provider's user id.
///
/// Two calls: a form-encoded POST for the access token, then an identity GET.
/// Any missing field in either response is a `BadExchange`.
pub async fn exchange_code(
    http: &reqwest::Client,
    config: &Config,
    code: &str,
) -> Result<String, PixeldError> {
    let redirect_uri = format!("{}/callback", config.base_url);
    let form = [
        ("client_id", config.client_id.as_str()),
        ("client_secret", config.client_secret.as_str()),
        ("grant_type", "authorization_code"),
        ("code", code),
        ("redirect_uri", redirect_uri.as_str()),
        ("scope", "identify"),
    ];

    let token_body: Value = http
        .post(&config.token_url)
        .form(&form)
        .send()
        .await?
        .json()
        .await?;
    let access_token = token_body["access_token"]
        .as_str()
        .ok_or_else(|| PixeldError::BadExchange("provider response had no access_token".into()))?;

    let user_body: Value = http
        .get(&config.user_url)
        .bearer_auth(access_token)
        .send()
        .await?
        .json()
        .await?;
    let user_id = user_body["id"]
        .as_str()
        .ok_or_else(|| PixeldError::BadExchange("provider identity had no id".into()))?;

    Ok(user_id.to_string())
}
