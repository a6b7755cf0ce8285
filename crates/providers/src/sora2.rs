//! Sora 2 video generation through an OpenAI-compatible relay.
//!
//! The relay has no public default endpoint, so the channel is only enabled
//! when `SORA2_BASE_URL` and `SORA2_API_KEY` are both set.

use async_trait::async_trait;
use mediagen_core::channels::Channel;
use mediagen_core::pricing::PricingDimensions;
use serde_json::{json, Map, Value};

use crate::adapter::{default_pricing_dimensions, ProviderAdapter};
use crate::error::ProviderError;
use crate::http::{self, DEFAULT_TIMEOUT_SECS};
use crate::request::{CanonicalRequest, CreatedTask, WebhookAuth};

pub const ACTION_GENERATION: &str = "generation";

const GENERATIONS_PATH: &str = "/v1/videos/generations";
const ALLOWED_DURATIONS: [u32; 2] = [10, 15];
const DEFAULT_SIZE: &str = "large";
const DEFAULT_ORIENTATION: &str = "landscape";

#[derive(Debug, Clone)]
pub struct Sora2Config {
    pub base_url: String,
    pub api_key: String,
    pub callback_url: Option<String>,
    pub webhook_secret: Option<String>,
    pub timeout_secs: u64,
}

impl Sora2Config {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            callback_url: None,
            webhook_secret: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    pub fn from_env() -> Option<Self> {
        Some(Self {
            base_url: http::env_opt("SORA2_BASE_URL")?,
            api_key: http::env_opt("SORA2_API_KEY")?,
            callback_url: http::env_opt("SORA2_CALLBACK_URL"),
            webhook_secret: http::env_opt("SORA2_WEBHOOK_SECRET"),
            timeout_secs: http::env_u64("SORA2_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS),
        })
    }
}

pub struct Sora2Adapter {
    http: reqwest::Client,
    config: Sora2Config,
}

impl Sora2Adapter {
    pub fn new(config: Sora2Config) -> Self {
        Self {
            http: http::build_client(config.timeout_secs),
            config,
        }
    }

    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    fn build_body(&self, request: &CanonicalRequest) -> Result<Value, ProviderError> {
        let mut body = Map::new();
        body.insert("model".into(), json!(request.model));
        body.insert("prompt".into(), json!(request.prompt));
        body.insert("images".into(), json!(request.all_images()));
        if let Some(duration) = request.duration {
            body.insert("duration".into(), json!(duration));
        }
        body.insert(
            "size".into(),
            json!(request.size.as_deref().unwrap_or(DEFAULT_SIZE)),
        );
        body.insert(
            "orientation".into(),
            json!(request
                .metadata_str("orientation")
                .unwrap_or(DEFAULT_ORIENTATION)),
        );
        if let Some(url) = &self.config.callback_url {
            body.insert(
                "callback_url".into(),
                json!(http::callback_url_with_token(
                    Channel::Sora2,
                    url,
                    self.config.webhook_secret.as_deref()
                )?),
            );
        }
        Ok(Value::Object(body))
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<Value, ProviderError> {
        let response = builder.bearer_auth(&self.config.api_key).send().await?;
        let (status, body) = http::read_json(Channel::Sora2, response).await?;
        if (200..300).contains(&status) {
            return Ok(body);
        }
        let message = body
            .pointer("/error/message")
            .or_else(|| body.get("message"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| body.to_string());
        tracing::warn!(status, %message, "Sora2 API call failed");
        Err(match status {
            400 | 422 => ProviderError::Rejected {
                channel: Channel::Sora2,
                code: status.to_string(),
                message,
            },
            _ => ProviderError::from_status(Channel::Sora2, status, message),
        })
    }
}

#[async_trait]
impl ProviderAdapter for Sora2Adapter {
    fn channel(&self) -> Channel {
        Channel::Sora2
    }

    fn resolve_action(&self, request: &CanonicalRequest) -> Result<String, ProviderError> {
        if let Some(action) = request.action.as_deref().filter(|a| *a != ACTION_GENERATION) {
            return Err(ProviderError::InvalidRequest(format!(
                "Unknown Sora2 action '{action}'"
            )));
        }
        if request.all_images().is_empty() {
            return Err(ProviderError::InvalidRequest(
                "Sora2 requests require an image".into(),
            ));
        }
        if let Some(duration) = request.duration {
            if !ALLOWED_DURATIONS.contains(&duration) {
                return Err(ProviderError::InvalidRequest(format!(
                    "Sora2 duration must be 10 or 15 seconds, got {duration}"
                )));
            }
        }
        Ok(ACTION_GENERATION.to_string())
    }

    fn pricing_dimensions(&self, request: &CanonicalRequest) -> PricingDimensions {
        PricingDimensions {
            resolution: request.size.clone().or_else(|| request.resolution.clone()),
            ..default_pricing_dimensions(request)
        }
    }

    async fn create(
        &self,
        request: &CanonicalRequest,
        _action: &str,
    ) -> Result<CreatedTask, ProviderError> {
        let url = http::join_url(&self.config.base_url, GENERATIONS_PATH);
        let body = self.build_body(request)?;
        let raw = self.send(self.http.post(url).json(&body)).await?;

        let provider_task_id = raw
            .get("id")
            .or_else(|| raw.get("task_id"))
            .and_then(Value::as_str)
            .ok_or_else(|| ProviderError::invalid_response(Channel::Sora2, "missing id"))?
            .to_string();
        Ok(CreatedTask {
            provider_task_id,
            raw,
        })
    }

    async fn query(&self, provider_task_id: &str, _action: &str) -> Result<Value, ProviderError> {
        let url = http::join_url(
            &self.config.base_url,
            &format!("{GENERATIONS_PATH}/{provider_task_id}"),
        );
        self.send(self.http.get(url)).await
    }

    fn parse_webhook(&self, auth: &WebhookAuth, body: &[u8]) -> Result<Value, ProviderError> {
        http::verify_webhook(
            Channel::Sora2,
            self.config.webhook_secret.as_deref(),
            auth,
            body,
        )?;
        http::parse_json_body(Channel::Sora2, body)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn adapter() -> Sora2Adapter {
        Sora2Adapter::new(Sora2Config::new("http://localhost", "key"))
    }

    fn request() -> CanonicalRequest {
        CanonicalRequest {
            model: "sora-2".into(),
            prompt: "a lighthouse at dusk".into(),
            image: Some("https://img/ref.png".into()),
            duration: Some(10),
            ..Default::default()
        }
    }

    #[test]
    fn image_is_required() {
        let req = CanonicalRequest {
            image: None,
            ..request()
        };
        assert_matches!(
            adapter().resolve_action(&req),
            Err(ProviderError::InvalidRequest(_))
        );
    }

    #[test]
    fn duration_is_limited() {
        let req = CanonicalRequest {
            duration: Some(5),
            ..request()
        };
        assert_matches!(
            adapter().resolve_action(&req),
            Err(ProviderError::InvalidRequest(_))
        );
        assert_eq!(adapter().resolve_action(&request()).unwrap(), ACTION_GENERATION);
    }

    #[test]
    fn body_defaults_size_and_orientation() {
        let body = adapter().build_body(&request()).unwrap();
        assert_eq!(body["size"], "large");
        assert_eq!(body["orientation"], "landscape");
        assert_eq!(body["images"][0], "https://img/ref.png");
        assert_eq!(body["duration"], 10);
    }

    #[test]
    fn pricing_uses_size_as_resolution() {
        let req = CanonicalRequest {
            size: Some("small".into()),
            ..request()
        };
        let dims = adapter().pricing_dimensions(&req);
        assert_eq!(dims.resolution.as_deref(), Some("small"));
        assert_eq!(dims.duration, Some(10));
    }
}
