//! Shared HTTP, config and webhook helpers for the adapters.

use std::time::Duration;

use mediagen_core::channels::Channel;
use mediagen_core::webhook_auth;
use serde_json::Value;

use crate::error::ProviderError;
use crate::request::WebhookAuth;

/// Default provider HTTP timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Build the HTTP client an adapter uses. Provider calls carry only this
/// client-side timeout.
pub fn build_client(timeout_secs: u64) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .unwrap_or_default()
}

/// Read a response body as JSON, keeping the HTTP status.
///
/// A non-JSON error body becomes a status-mapped error; a non-JSON success
/// body is an invalid response.
pub async fn read_json(
    channel: Channel,
    response: reqwest::Response,
) -> Result<(u16, Value), ProviderError> {
    let status = response.status();
    let text = response.text().await?;
    match serde_json::from_str::<Value>(&text) {
        Ok(value) => Ok((status.as_u16(), value)),
        Err(_) if !status.is_success() => {
            Err(ProviderError::from_status(channel, status.as_u16(), text))
        }
        Err(e) => Err(ProviderError::invalid_response(
            channel,
            format!("response is not JSON: {e}"),
        )),
    }
}

/// Append the webhook secret as a percent-encoded `token` query parameter.
pub fn callback_url_with_token(
    channel: Channel,
    url: &str,
    secret: Option<&str>,
) -> Result<String, ProviderError> {
    let mut parsed = reqwest::Url::parse(url).map_err(|e| {
        ProviderError::InvalidRequest(format!("{channel} callback URL '{url}' is invalid: {e}"))
    })?;
    if let Some(secret) = secret.filter(|s| !s.is_empty()) {
        parsed.query_pairs_mut().append_pair("token", secret);
    }
    Ok(parsed.into())
}

/// Check a webhook's token or signature against the configured secret.
///
/// A channel without a secret cannot authenticate anything, so all of its
/// webhooks are rejected and its tasks resolve through polling.
pub fn verify_webhook(
    channel: Channel,
    secret: Option<&str>,
    auth: &WebhookAuth,
    body: &[u8],
) -> Result<(), ProviderError> {
    let Some(secret) = secret.filter(|s| !s.is_empty()) else {
        tracing::warn!(%channel, "Rejected webhook: no webhook secret configured");
        return Err(ProviderError::WebhookAuth { channel });
    };

    let token_ok = auth
        .token
        .as_deref()
        .is_some_and(|t| webhook_auth::verify_token(secret, t));
    let signature_ok = auth
        .signature
        .as_deref()
        .is_some_and(|s| webhook_auth::verify_signature(secret, body, s));

    if token_ok || signature_ok {
        Ok(())
    } else {
        tracing::warn!(%channel, "Rejected webhook with bad or missing credentials");
        Err(ProviderError::WebhookAuth { channel })
    }
}

/// Parse a webhook body as a JSON object.
pub fn parse_json_body(channel: Channel, body: &[u8]) -> Result<Value, ProviderError> {
    let value: Value = serde_json::from_slice(body).map_err(|e| {
        ProviderError::invalid_response(channel, format!("webhook body is not JSON: {e}"))
    })?;
    if !value.is_object() {
        return Err(ProviderError::invalid_response(
            channel,
            "webhook body is not a JSON object",
        ));
    }
    Ok(value)
}

/// Non-empty environment variable.
pub fn env_opt(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Environment variable parsed as an integer, with a default.
pub fn env_u64(name: &str, default: u64) -> u64 {
    env_opt(name)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Join a base URL and a path without doubling slashes.
pub fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn token_is_appended_to_callback_url() {
        let url = |base: &str, secret: Option<&str>| {
            callback_url_with_token(Channel::Kling, base, secret).unwrap()
        };
        assert_eq!(url("https://h/cb", Some("s")), "https://h/cb?token=s");
        assert_eq!(url("https://h/cb?a=1", Some("s")), "https://h/cb?a=1&token=s");
        assert_eq!(url("https://h/cb", None), "https://h/cb");
    }

    #[test]
    fn callback_token_is_percent_encoded() {
        let secret = "a&b#c+d e";
        let url = callback_url_with_token(Channel::Sora2, "https://h/cb", Some(secret)).unwrap();
        assert_eq!(url, "https://h/cb?token=a%26b%23c%2Bd+e");

        let parsed = reqwest::Url::parse(&url).unwrap();
        let token = parsed
            .query_pairs()
            .find(|(k, _)| k == "token")
            .map(|(_, v)| v.into_owned());
        assert_eq!(token.as_deref(), Some(secret));
    }

    #[test]
    fn malformed_callback_url_is_rejected() {
        assert_matches!(
            callback_url_with_token(Channel::Kling, "not a url", Some("s")),
            Err(ProviderError::InvalidRequest(_))
        );
    }

    #[test]
    fn webhook_without_secret_is_rejected() {
        let body = b"{}";
        let token = WebhookAuth {
            token: Some("anything".into()),
            signature: None,
        };
        assert_matches!(
            verify_webhook(Channel::Kling, None, &WebhookAuth::default(), body),
            Err(ProviderError::WebhookAuth { channel: Channel::Kling })
        );
        assert!(verify_webhook(Channel::Kling, None, &token, body).is_err());
        assert!(verify_webhook(Channel::Kling, Some(""), &token, body).is_err());
    }

    #[test]
    fn webhook_token_or_signature_is_required_with_secret() {
        let body = br#"{"id":"1"}"#;
        let none = WebhookAuth::default();
        assert!(verify_webhook(Channel::Sora2, Some("k"), &none, body).is_err());

        let token = WebhookAuth {
            token: Some("k".into()),
            signature: None,
        };
        assert!(verify_webhook(Channel::Sora2, Some("k"), &token, body).is_ok());

        let signed = WebhookAuth {
            token: None,
            signature: Some(webhook_auth::sign_payload("k", body)),
        };
        assert!(verify_webhook(Channel::Sora2, Some("k"), &signed, body).is_ok());
    }

    #[test]
    fn non_object_webhook_body_is_rejected() {
        assert!(parse_json_body(Channel::Kling, b"[1,2]").is_err());
        assert!(parse_json_body(Channel::Kling, b"not json").is_err());
    }

    #[test]
    fn join_url_handles_slashes() {
        assert_eq!(join_url("https://a/", "/v1/x"), "https://a/v1/x");
        assert_eq!(join_url("https://a", "v1/x"), "https://a/v1/x");
    }
}
