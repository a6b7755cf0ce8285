//! Volcengine Ark content generation (Seedance video models).
//!
//! Generation parameters travel as text commands appended to the prompt;
//! explicit request fields take precedence over commands typed into the
//! prompt itself.

use async_trait::async_trait;
use mediagen_core::channels::Channel;
use mediagen_core::pricing::PricingDimensions;
use serde_json::{json, Map, Value};

use crate::adapter::ProviderAdapter;
use crate::error::ProviderError;
use crate::http::{self, DEFAULT_TIMEOUT_SECS};
use crate::request::{CanonicalRequest, CreatedTask, WebhookAuth};
use crate::text_command::{self, TextCommand};

pub const ACTION_GENERATION: &str = "generation";

const DEFAULT_BASE_URL: &str = "https://ark.cn-beijing.volces.com/api/v3";
const TASKS_PATH: &str = "/contents/generations/tasks";

/// Volcengine connection settings.
///
/// `VOLCENGINE_API_KEY` is required; `VOLCENGINE_BASE_URL`,
/// `VOLCENGINE_CALLBACK_URL`, `VOLCENGINE_WEBHOOK_SECRET` and
/// `VOLCENGINE_TIMEOUT_SECS` are optional.
#[derive(Debug, Clone)]
pub struct VolcengineConfig {
    pub base_url: String,
    pub api_key: String,
    pub callback_url: Option<String>,
    pub webhook_secret: Option<String>,
    pub timeout_secs: u64,
}

impl VolcengineConfig {
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
            base_url: http::env_opt("VOLCENGINE_BASE_URL")
                .unwrap_or_else(|| DEFAULT_BASE_URL.into()),
            api_key: http::env_opt("VOLCENGINE_API_KEY")?,
            callback_url: http::env_opt("VOLCENGINE_CALLBACK_URL"),
            webhook_secret: http::env_opt("VOLCENGINE_WEBHOOK_SECRET"),
            timeout_secs: http::env_u64("VOLCENGINE_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS),
        })
    }
}

pub struct VolcengineAdapter {
    http: reqwest::Client,
    config: VolcengineConfig,
}

impl VolcengineAdapter {
    pub fn new(config: VolcengineConfig) -> Self {
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
        let command = effective_command(request);

        let mut text = command.prompt.clone();
        let rendered = text_command::serialize(&command.params);
        if !rendered.is_empty() {
            if !text.is_empty() {
                text.push(' ');
            }
            text.push_str(&rendered);
        }

        let mut content = vec![json!({ "type": "text", "text": text })];
        if let Some(first) = &request.image {
            content.push(image_part(first, Some("first_frame")));
        }
        if let Some(last) = &request.image_tail {
            content.push(image_part(last, Some("last_frame")));
        }
        for reference in &request.images {
            content.push(image_part(reference, Some("reference_image")));
        }

        let mut body = Map::new();
        body.insert("model".into(), json!(request.model));
        body.insert("content".into(), Value::Array(content));
        if let Some(flag) = request.metadata.get("return_last_frame") {
            body.insert("return_last_frame".into(), flag.clone());
        }
        if let Some(url) = &self.config.callback_url {
            body.insert(
                "callback_url".into(),
                json!(http::callback_url_with_token(
                    Channel::Volcengine,
                    url,
                    self.config.webhook_secret.as_deref()
                )?),
            );
        }
        Ok(Value::Object(body))
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<Value, ProviderError> {
        let response = builder.bearer_auth(&self.config.api_key).send().await?;
        let (status, body) = http::read_json(Channel::Volcengine, response).await?;
        if (200..300).contains(&status) && body.get("error").is_none() {
            return Ok(body);
        }
        Err(map_error(status, &body))
    }
}

fn image_part(url: &str, role: Option<&str>) -> Value {
    let mut part = json!({ "type": "image_url", "image_url": { "url": url } });
    if let (Some(role), Some(obj)) = (role, part.as_object_mut()) {
        obj.insert("role".into(), json!(role));
    }
    part
}

/// Prompt commands overlaid with the explicit request fields.
fn effective_command(request: &CanonicalRequest) -> TextCommand {
    let mut command = text_command::parse(&request.prompt);
    let params = &mut command.params;

    if let Some(resolution) = request.resolution.as_ref().or(request.size.as_ref()) {
        params.resolution = Some(resolution.clone());
    }
    if let Some(ratio) = &request.aspect_ratio {
        params.ratio = Some(ratio.clone());
    }
    if request.duration.is_some() {
        params.duration = request.duration;
    }
    if let Some(seed) = request.metadata.get("seed").and_then(Value::as_i64) {
        params.seed = Some(seed);
    }
    if let Some(watermark) = request.metadata.get("watermark").and_then(Value::as_bool) {
        params.watermark = Some(watermark);
    }
    if let Some(fixed) = request.metadata.get("camera_fixed").and_then(Value::as_bool) {
        params.camera_fixed = Some(fixed);
    }
    command
}

fn map_error(status: u16, body: &Value) -> ProviderError {
    let channel = Channel::Volcengine;
    let code = body
        .pointer("/error/code")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let message = body
        .pointer("/error/message")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| body.to_string());

    tracing::warn!(status, %code, %message, "Volcengine API call failed");

    if code == "QuotaExceeded" || code == "AccountOverdueError" {
        return ProviderError::QuotaExhausted { channel, message };
    }
    if code.starts_with("AuthenticationError") || status == 401 || status == 403 {
        return ProviderError::Unauthorized { channel, message };
    }
    if status == 429 || code.starts_with("RateLimitExceeded") {
        return ProviderError::RateLimited { channel, message };
    }
    if status >= 500 {
        return ProviderError::Unavailable { channel, message };
    }
    if !code.is_empty() {
        return ProviderError::Rejected {
            channel,
            code,
            message,
        };
    }
    ProviderError::from_status(channel, status, message)
}

#[async_trait]
impl ProviderAdapter for VolcengineAdapter {
    fn channel(&self) -> Channel {
        Channel::Volcengine
    }

    fn resolve_action(&self, request: &CanonicalRequest) -> Result<String, ProviderError> {
        if let Some(action) = request.action.as_deref().filter(|a| *a != ACTION_GENERATION) {
            return Err(ProviderError::InvalidRequest(format!(
                "Unknown Volcengine action '{action}'"
            )));
        }
        if text_command::parse(&request.prompt).prompt.is_empty() {
            return Err(ProviderError::InvalidRequest(
                "Volcengine requests require a prompt".into(),
            ));
        }
        Ok(ACTION_GENERATION.to_string())
    }

    fn pricing_dimensions(&self, request: &CanonicalRequest) -> PricingDimensions {
        let params = effective_command(request).params;
        PricingDimensions {
            resolution: params.resolution,
            aspect_ratio: params.ratio,
            mode: request.mode.clone(),
            duration: params.duration,
        }
    }

    async fn create(
        &self,
        request: &CanonicalRequest,
        _action: &str,
    ) -> Result<CreatedTask, ProviderError> {
        let url = http::join_url(&self.config.base_url, TASKS_PATH);
        let body = self.build_body(request)?;
        let raw = self.send(self.http.post(url).json(&body)).await?;

        let provider_task_id = raw
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| ProviderError::invalid_response(Channel::Volcengine, "missing id"))?
            .to_string();
        Ok(CreatedTask {
            provider_task_id,
            raw,
        })
    }

    async fn query(&self, provider_task_id: &str, _action: &str) -> Result<Value, ProviderError> {
        let url = http::join_url(
            &self.config.base_url,
            &format!("{TASKS_PATH}/{provider_task_id}"),
        );
        self.send(self.http.get(url)).await
    }

    fn parse_webhook(&self, auth: &WebhookAuth, body: &[u8]) -> Result<Value, ProviderError> {
        http::verify_webhook(
            Channel::Volcengine,
            self.config.webhook_secret.as_deref(),
            auth,
            body,
        )?;
        http::parse_json_body(Channel::Volcengine, body)
    }
}
