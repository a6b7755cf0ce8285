//! Kling video generation API.
//!
//! Requests are authenticated with a short-lived HS256 JWT built from the
//! access/secret key pair (or the bare access key when no secret is set).
//! Every response is wrapped as `{ code, message, request_id, data }` with
//! `code == 0` on success; query payloads are unwrapped to `data` so they
//! share the webhook's shape.

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use mediagen_core::channels::Channel;
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::adapter::ProviderAdapter;
use crate::error::ProviderError;
use crate::http::{self, DEFAULT_TIMEOUT_SECS};
use crate::request::{CanonicalRequest, CreatedTask, WebhookAuth};

pub const ACTION_TEXT2VIDEO: &str = "text2video";
pub const ACTION_IMAGE2VIDEO: &str = "image2video";
pub const ACTION_MULTI_IMAGE2VIDEO: &str = "multi-image2video";

const ACTIONS: [&str; 3] = [ACTION_TEXT2VIDEO, ACTION_IMAGE2VIDEO, ACTION_MULTI_IMAGE2VIDEO];

const DEFAULT_BASE_URL: &str = "https://api-beijing.klingai.com";

/// JWT lifetime in seconds.
const TOKEN_TTL_SECS: i64 = 1800;

/// Metadata keys passed through to the provider body untouched.
const PASSTHROUGH_KEYS: [&str; 5] = [
    "cfg_scale",
    "camera_control",
    "static_mask",
    "dynamic_masks",
    "external_task_id",
];

/// Kling connection settings.
///
/// | Env var                | Required | Default                            |
/// |------------------------|----------|------------------------------------|
/// | `KLING_ACCESS_KEY`     | yes      | --                                 |
/// | `KLING_SECRET_KEY`     | no       | (bare access key used as token)    |
/// | `KLING_BASE_URL`       | no       | `https://api-beijing.klingai.com`  |
/// | `KLING_CALLBACK_URL`   | no       | (no webhook registration)          |
/// | `KLING_WEBHOOK_SECRET` | no       | (webhooks accepted unverified)     |
/// | `KLING_TIMEOUT_SECS`   | no       | `30`                               |
#[derive(Debug, Clone)]
pub struct KlingConfig {
    pub base_url: String,
    pub access_key: String,
    pub secret_key: Option<String>,
    pub callback_url: Option<String>,
    pub webhook_secret: Option<String>,
    pub timeout_secs: u64,
}

impl KlingConfig {
    pub fn new(base_url: impl Into<String>, access_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            access_key: access_key.into(),
            secret_key: None,
            callback_url: None,
            webhook_secret: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Load from the environment; `None` when the channel is not configured.
    pub fn from_env() -> Option<Self> {
        Some(Self {
            base_url: http::env_opt("KLING_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.into()),
            access_key: http::env_opt("KLING_ACCESS_KEY")?,
            secret_key: http::env_opt("KLING_SECRET_KEY"),
            callback_url: http::env_opt("KLING_CALLBACK_URL"),
            webhook_secret: http::env_opt("KLING_WEBHOOK_SECRET"),
            timeout_secs: http::env_u64("KLING_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS),
        })
    }
}

#[derive(Serialize)]
struct Claims<'a> {
    iss: &'a str,
    exp: i64,
    nbf: i64,
}

pub struct KlingAdapter {
    http: reqwest::Client,
    config: KlingConfig,
}

impl KlingAdapter {
    pub fn new(config: KlingConfig) -> Self {
        Self {
            http: http::build_client(config.timeout_secs),
            config,
        }
    }

    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    /// Bearer token for the next request.
    pub fn auth_token(&self) -> Result<String, ProviderError> {
        let Some(secret) = self.config.secret_key.as_deref() else {
            return Ok(self.config.access_key.clone());
        };
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            iss: &self.config.access_key,
            exp: now + TOKEN_TTL_SECS,
            nbf: now - 5,
        };
        jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .map_err(|e| ProviderError::Signing {
            channel: Channel::Kling,
            message: e.to_string(),
        })
    }

    fn action_url(&self, action: &str) -> Result<String, ProviderError> {
        if !ACTIONS.contains(&action) {
            return Err(ProviderError::InvalidRequest(format!(
                "Unknown Kling action '{action}'"
            )));
        }
        Ok(http::join_url(
            &self.config.base_url,
            &format!("/v1/videos/{action}"),
        ))
    }

    fn build_body(&self, request: &CanonicalRequest, action: &str) -> Result<Value, ProviderError> {
        let mut body = Map::new();
        body.insert("model_name".into(), json!(request.model));
        if !request.prompt.is_empty() {
            body.insert("prompt".into(), json!(request.prompt));
        }
        if let Some(negative) = &request.negative_prompt {
            body.insert("negative_prompt".into(), json!(negative));
        }
        if let Some(mode) = &request.mode {
            body.insert("mode".into(), json!(mode));
        }
        if let Some(duration) = request.duration {
            // Kling expects the duration as a string enum ("5" / "10").
            body.insert("duration".into(), json!(duration.to_string()));
        }

        match action {
            ACTION_TEXT2VIDEO => {
                if let Some(ratio) = &request.aspect_ratio {
                    body.insert("aspect_ratio".into(), json!(ratio));
                }
            }
            ACTION_IMAGE2VIDEO => {
                let image = request.image.as_ref().or(request.images.first()).ok_or_else(|| {
                    ProviderError::InvalidRequest("image2video requires an image".into())
                })?;
                body.insert("image".into(), json!(image));
                if let Some(tail) = &request.image_tail {
                    body.insert("image_tail".into(), json!(tail));
                }
            }
            ACTION_MULTI_IMAGE2VIDEO => {
                let images = request.all_images();
                if images.is_empty() {
                    return Err(ProviderError::InvalidRequest(
                        "multi-image2video requires at least one image".into(),
                    ));
                }
                let list: Vec<Value> = images.iter().map(|i| json!({ "image": i })).collect();
                body.insert("image_list".into(), Value::Array(list));
                if let Some(ratio) = &request.aspect_ratio {
                    body.insert("aspect_ratio".into(), json!(ratio));
                }
            }
            other => {
                return Err(ProviderError::InvalidRequest(format!(
                    "Unknown Kling action '{other}'"
                )))
            }
        }

        for key in PASSTHROUGH_KEYS {
            if let Some(value) = request.metadata.get(key) {
                body.insert(key.into(), value.clone());
            }
        }

        if let Some(url) = &self.config.callback_url {
            body.insert(
                "callback_url".into(),
                json!(http::callback_url_with_token(
                    Channel::Kling,
                    url,
                    self.config.webhook_secret.as_deref()
                )?),
            );
        }

        Ok(Value::Object(body))
    }

    /// Send a request and unwrap the `{ code, message, data }` envelope.
    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<Value, ProviderError> {
        let token = self.auth_token()?;
        let response = builder.bearer_auth(token).send().await?;
        let (status, body) = http::read_json(Channel::Kling, response).await?;

        if let Some(code) = body.get("code").and_then(Value::as_i64) {
            if code != 0 {
                let message = body
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                tracing::warn!(code, %message, "Kling API call failed");
                return Err(map_error_code(code, message));
            }
        }
        if !(200..300).contains(&status) {
            return Err(ProviderError::from_status(
                Channel::Kling,
                status,
                body.to_string(),
            ));
        }

        body.get("data")
            .filter(|d| d.is_object())
            .cloned()
            .ok_or_else(|| ProviderError::invalid_response(Channel::Kling, "missing data object"))
    }
}

/// Map a Kling business error code.
fn map_error_code(code: i64, message: String) -> ProviderError {
    let channel = Channel::Kling;
    match code {
        1000..=1004 | 1103 | 1304 => ProviderError::Unauthorized { channel, message },
        1100..=1102 => ProviderError::QuotaExhausted { channel, message },
        1302 | 1303 => ProviderError::RateLimited { channel, message },
        5000..=5999 => ProviderError::Unavailable { channel, message },
        _ => ProviderError::Rejected {
            channel,
            code: code.to_string(),
            message,
        },
    }
}

#[async_trait]
impl ProviderAdapter for KlingAdapter {
    fn channel(&self) -> Channel {
        Channel::Kling
    }

    fn resolve_action(&self, request: &CanonicalRequest) -> Result<String, ProviderError> {
        let action = match request.action.as_deref() {
            Some(action) if ACTIONS.contains(&action) => action,
            Some(other) => {
                return Err(ProviderError::InvalidRequest(format!(
                    "Unknown Kling action '{other}'"
                )))
            }
            None if !request.images.is_empty() => ACTION_MULTI_IMAGE2VIDEO,
            None if request.image.is_some() => ACTION_IMAGE2VIDEO,
            None => ACTION_TEXT2VIDEO,
        };

        match action {
            ACTION_TEXT2VIDEO if request.prompt.trim().is_empty() => Err(
                ProviderError::InvalidRequest("text2video requires a prompt".into()),
            ),
            ACTION_IMAGE2VIDEO if request.image.is_none() && request.images.is_empty() => Err(
                ProviderError::InvalidRequest("image2video requires an image".into()),
            ),
            ACTION_MULTI_IMAGE2VIDEO if request.all_images().is_empty() => {
                Err(ProviderError::InvalidRequest(
                    "multi-image2video requires at least one image".into(),
                ))
            }
            _ => Ok(action.to_string()),
        }
    }

    async fn create(
        &self,
        request: &CanonicalRequest,
        action: &str,
    ) -> Result<CreatedTask, ProviderError> {
        let url = self.action_url(action)?;
        let body = self.build_body(request, action)?;
        let data = self.send(self.http.post(url).json(&body)).await?;

        let provider_task_id = data
            .get("task_id")
            .and_then(Value::as_str)
            .ok_or_else(|| ProviderError::invalid_response(Channel::Kling, "missing task_id"))?
            .to_string();

        Ok(CreatedTask {
            provider_task_id,
            raw: data,
        })
    }

    async fn query(&self, provider_task_id: &str, action: &str) -> Result<Value, ProviderError> {
        let url = format!("{}/{}", self.action_url(action)?, provider_task_id);
        self.send(self.http.get(url)).await
    }

    fn parse_webhook(&self, auth: &WebhookAuth, body: &[u8]) -> Result<Value, ProviderError> {
        http::verify_webhook(
            Channel::Kling,
            self.config.webhook_secret.as_deref(),
            auth,
            body,
        )?;
        let value = http::parse_json_body(Channel::Kling, body)?;
        // Some deliveries arrive in the API envelope.
        match value.get("data") {
            Some(data) if data.get("task_id").is_some() => Ok(data.clone()),
            _ => Ok(value),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn adapter() -> KlingAdapter {
        KlingAdapter::new(KlingConfig::new("http://localhost", "ak"))
    }

    fn request() -> CanonicalRequest {
        CanonicalRequest {
            model: "kling-v2-1".into(),
            prompt: "a cat".into(),
            ..Default::default()
        }
    }

    #[test]
    fn action_is_inferred_from_images() {
        let a = adapter();
        assert_eq!(a.resolve_action(&request()).unwrap(), ACTION_TEXT2VIDEO);

        let single = CanonicalRequest {
            image: Some("https://img/1.png".into()),
            ..request()
        };
        assert_eq!(a.resolve_action(&single).unwrap(), ACTION_IMAGE2VIDEO);

        let multi = CanonicalRequest {
            images: vec!["https://img/1.png".into(), "https://img/2.png".into()],
            ..request()
        };
        assert_eq!(a.resolve_action(&multi).unwrap(), ACTION_MULTI_IMAGE2VIDEO);
    }

    #[test]
    fn explicit_action_is_validated() {
        let a = adapter();
        let bad = CanonicalRequest {
            action: Some("lip-sync".into()),
            ..request()
        };
        assert_matches!(a.resolve_action(&bad), Err(ProviderError::InvalidRequest(_)));

        let missing_image = CanonicalRequest {
            action: Some(ACTION_IMAGE2VIDEO.into()),
            ..request()
        };
        assert_matches!(
            a.resolve_action(&missing_image),
            Err(ProviderError::InvalidRequest(_))
        );
    }

    #[test]
    fn body_carries_string_duration_and_tokenized_callback() {
        let mut config = KlingConfig::new("http://localhost", "ak");
        config.callback_url = Some("https://me/api/v1/callbacks/kling".into());
        config.webhook_secret = Some("s3".into());
        let a = KlingAdapter::new(config);

        let req = CanonicalRequest {
            duration: Some(5),
            mode: Some("std".into()),
            ..request()
        };
        let body = a.build_body(&req, ACTION_TEXT2VIDEO).unwrap();
        assert_eq!(body["duration"], "5");
        assert_eq!(body["mode"], "std");
        assert_eq!(
            body["callback_url"],
            "https://me/api/v1/callbacks/kling?token=s3"
        );
    }

    #[test]
    fn jwt_is_used_when_secret_is_set() {
        let mut config = KlingConfig::new("http://localhost", "ak");
        assert_eq!(KlingAdapter::new(config.clone()).auth_token().unwrap(), "ak");

        config.secret_key = Some("sk".into());
        let token = KlingAdapter::new(config).auth_token().unwrap();
        assert_eq!(token.split('.').count(), 3);
    }

    #[test]
    fn error_codes_map_to_categories() {
        assert_matches!(
            map_error_code(1002, "bad token".into()),
            ProviderError::Unauthorized { .. }
        );
        assert_matches!(
            map_error_code(1102, "no pack".into()),
            ProviderError::QuotaExhausted { .. }
        );
        assert_matches!(
            map_error_code(1303, "qps".into()),
            ProviderError::RateLimited { .. }
        );
        assert_matches!(
            map_error_code(5001, "down".into()),
            ProviderError::Unavailable { .. }
        );
        assert_matches!(
            map_error_code(1301, "policy".into()),
            ProviderError::Rejected { .. }
        );
    }

    fn adapter_with_secret(secret: &str) -> KlingAdapter {
        let mut config = KlingConfig::new("http://localhost", "ak");
        config.webhook_secret = Some(secret.into());
        KlingAdapter::new(config)
    }

    #[test]
    fn webhook_envelope_is_unwrapped() {
        let body = br#"{"code":0,"data":{"task_id":"k1","task_status":"succeed"}}"#;
        let auth = WebhookAuth {
            token: Some("hook".into()),
            signature: None,
        };
        let value = adapter_with_secret("hook").parse_webhook(&auth, body).unwrap();
        assert_eq!(value["task_id"], "k1");
    }

    #[test]
    fn webhook_is_rejected_without_a_secret() {
        let body = br#"{"task_id":"k1","task_status":"failed"}"#;
        let auth = WebhookAuth {
            token: Some("guess".into()),
            signature: None,
        };
        assert_matches!(
            adapter().parse_webhook(&auth, body),
            Err(ProviderError::WebhookAuth { .. })
        );
    }
}
