//! Alibaba Dashscope (Wan) asynchronous video synthesis.
//!
//! Dashscope has no callback registration: tasks are observed by polling
//! `GET /tasks/{id}` only, so any configured callback URL is ignored.

use async_trait::async_trait;
use mediagen_core::channels::Channel;
use serde_json::{json, Map, Value};

use crate::adapter::ProviderAdapter;
use crate::error::ProviderError;
use crate::http::{self, DEFAULT_TIMEOUT_SECS};
use crate::request::{CanonicalRequest, CreatedTask, WebhookAuth};

pub const ACTION_TEXT2VIDEO: &str = "text2video";
pub const ACTION_IMAGE2VIDEO: &str = "image2video";
pub const ACTION_KEYFRAME2VIDEO: &str = "keyframe2video";

const DEFAULT_BASE_URL: &str = "https://dashscope.aliyuncs.com/api/v1";
const VIDEO_SYNTHESIS_PATH: &str = "/services/aigc/video-generation/video-synthesis";
const KEYFRAME_SYNTHESIS_PATH: &str = "/services/aigc/image2video/video-synthesis";

/// Dashscope connection settings (`DASHSCOPE_API_KEY`, optional
/// `DASHSCOPE_BASE_URL` and `DASHSCOPE_TIMEOUT_SECS`).
#[derive(Debug, Clone)]
pub struct DashscopeConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout_secs: u64,
}

impl DashscopeConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    pub fn from_env() -> Option<Self> {
        Some(Self {
            base_url: http::env_opt("DASHSCOPE_BASE_URL")
                .unwrap_or_else(|| DEFAULT_BASE_URL.into()),
            api_key: http::env_opt("DASHSCOPE_API_KEY")?,
            timeout_secs: http::env_u64("DASHSCOPE_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS),
        })
    }
}

pub struct DashscopeAdapter {
    http: reqwest::Client,
    config: DashscopeConfig,
}

impl DashscopeAdapter {
    pub fn new(config: DashscopeConfig) -> Self {
        Self {
            http: http::build_client(config.timeout_secs),
            config,
        }
    }

    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    fn build_body(request: &CanonicalRequest, action: &str) -> Result<Value, ProviderError> {
        let mut input = Map::new();
        if !request.prompt.is_empty() {
            input.insert("prompt".into(), json!(request.prompt));
        }
        if let Some(negative) = &request.negative_prompt {
            input.insert("negative_prompt".into(), json!(negative));
        }
        if let Some(template) = request.metadata_str("template") {
            input.insert("template".into(), json!(template));
        }

        let mut parameters = Map::new();
        match action {
            ACTION_TEXT2VIDEO => {
                if let Some(size) = &request.size {
                    parameters.insert("size".into(), json!(size));
                }
            }
            ACTION_IMAGE2VIDEO => {
                let image = first_image(request)?;
                input.insert("img_url".into(), json!(image));
            }
            ACTION_KEYFRAME2VIDEO => {
                let first = first_image(request)?;
                let last = request.image_tail.as_ref().ok_or_else(|| {
                    ProviderError::InvalidRequest("keyframe2video requires a last frame".into())
                })?;
                input.insert("first_frame_url".into(), json!(first));
                input.insert("last_frame_url".into(), json!(last));
            }
            other => {
                return Err(ProviderError::InvalidRequest(format!(
                    "Unknown Dashscope action '{other}'"
                )))
            }
        }

        if action != ACTION_TEXT2VIDEO {
            if let Some(resolution) = &request.resolution {
                parameters.insert("resolution".into(), json!(resolution));
            }
        }
        if let Some(duration) = request.duration {
            parameters.insert("duration".into(), json!(duration));
        }
        for key in ["prompt_extend", "seed", "watermark"] {
            if let Some(value) = request.metadata.get(key) {
                parameters.insert(key.into(), value.clone());
            }
        }

        Ok(json!({
            "model": request.model,
            "input": input,
            "parameters": parameters,
        }))
    }

    async fn send(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<Value, ProviderError> {
        let response = builder.bearer_auth(&self.config.api_key).send().await?;
        let (status, body) = http::read_json(Channel::Dashscope, response).await?;
        let has_error_code = body
            .get("code")
            .and_then(Value::as_str)
            .is_some_and(|c| !c.is_empty());
        if (200..300).contains(&status) && !has_error_code {
            return Ok(body);
        }
        Err(map_error(status, &body))
    }
}

fn first_image(request: &CanonicalRequest) -> Result<&String, ProviderError> {
    request
        .image
        .as_ref()
        .or(request.images.first())
        .ok_or_else(|| ProviderError::InvalidRequest("Dashscope action requires an image".into()))
}

fn map_error(status: u16, body: &Value) -> ProviderError {
    let channel = Channel::Dashscope;
    let code = body
        .get("code")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let message = body
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| body.to_string());

    tracing::warn!(status, %code, %message, "Dashscope API call failed");

    match code.as_str() {
        "InvalidApiKey" => ProviderError::Unauthorized { channel, message },
        "Arrearage" => ProviderError::QuotaExhausted { channel, message },
        "InternalError" => ProviderError::Unavailable { channel, message },
        c if c.starts_with("Throttling") => ProviderError::RateLimited { channel, message },
        "" => ProviderError::from_status(channel, status, message),
        _ => ProviderError::Rejected {
            channel,
            code,
            message,
        },
    }
}

#[async_trait]
impl ProviderAdapter for DashscopeAdapter {
    fn channel(&self) -> Channel {
        Channel::Dashscope
    }

    fn resolve_action(&self, request: &CanonicalRequest) -> Result<String, ProviderError> {
        let has_image = request.image.is_some() || !request.images.is_empty();
        let action = match request.action.as_deref() {
            Some(a @ (ACTION_TEXT2VIDEO | ACTION_IMAGE2VIDEO | ACTION_KEYFRAME2VIDEO)) => a,
            Some(other) => {
                return Err(ProviderError::InvalidRequest(format!(
                    "Unknown Dashscope action '{other}'"
                )))
            }
            None if has_image && request.image_tail.is_some() => ACTION_KEYFRAME2VIDEO,
            None if has_image => ACTION_IMAGE2VIDEO,
            None => ACTION_TEXT2VIDEO,
        };

        if action == ACTION_TEXT2VIDEO && request.prompt.trim().is_empty() {
            return Err(ProviderError::InvalidRequest(
                "text2video requires a prompt".into(),
            ));
        }
        if action != ACTION_TEXT2VIDEO && !has_image {
            return Err(ProviderError::InvalidRequest(format!(
                "{action} requires an image"
            )));
        }
        if action == ACTION_KEYFRAME2VIDEO && request.image_tail.is_none() {
            return Err(ProviderError::InvalidRequest(
                "keyframe2video requires a last frame".into(),
            ));
        }
        Ok(action.to_string())
    }

    async fn create(
        &self,
        request: &CanonicalRequest,
        action: &str,
    ) -> Result<CreatedTask, ProviderError> {
        let path = if action == ACTION_KEYFRAME2VIDEO {
            KEYFRAME_SYNTHESIS_PATH
        } else {
            VIDEO_SYNTHESIS_PATH
        };
        let url = http::join_url(&self.config.base_url, path);
        let body = Self::build_body(request, action)?;
        let raw = self
            .send(
                self.http
                    .post(url)
                    .header("X-DashScope-Async", "enable")
                    .json(&body),
            )
            .await?;

        let provider_task_id = raw
            .pointer("/output/task_id")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                ProviderError::invalid_response(Channel::Dashscope, "missing output.task_id")
            })?
            .to_string();
        Ok(CreatedTask {
            provider_task_id,
            raw,
        })
    }

    async fn query(&self, provider_task_id: &str, _action: &str) -> Result<Value, ProviderError> {
        let url = http::join_url(&self.config.base_url, &format!("/tasks/{provider_task_id}"));
        self.send(self.http.get(url)).await
    }

    fn parse_webhook(&self, _auth: &WebhookAuth, _body: &[u8]) -> Result<Value, ProviderError> {
        Err(ProviderError::InvalidRequest(
            "Dashscope does not deliver webhooks".into(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn adapter() -> DashscopeAdapter {
        DashscopeAdapter::new(DashscopeConfig::new("http://localhost", "key"))
    }

    fn request() -> CanonicalRequest {
        CanonicalRequest {
            model: "wan2.2-t2v-plus".into(),
            prompt: "rain on a window".into(),
            ..Default::default()
        }
    }

    #[test]
    fn action_inference() {
        let a = adapter();
        assert_eq!(a.resolve_action(&request()).unwrap(), ACTION_TEXT2VIDEO);

        let i2v = CanonicalRequest {
            image: Some("https://img/a.png".into()),
            ..request()
        };
        assert_eq!(a.resolve_action(&i2v).unwrap(), ACTION_IMAGE2VIDEO);

        let kf = CanonicalRequest {
            image_tail: Some("https://img/b.png".into()),
            ..i2v
        };
        assert_eq!(a.resolve_action(&kf).unwrap(), ACTION_KEYFRAME2VIDEO);
    }

    #[test]
    fn keyframe_without_tail_is_rejected() {
        let req = CanonicalRequest {
            action: Some(ACTION_KEYFRAME2VIDEO.into()),
            image: Some("https://img/a.png".into()),
            ..request()
        };
        assert_matches!(
            adapter().resolve_action(&req),
            Err(ProviderError::InvalidRequest(_))
        );
    }

    #[test]
    fn body_shapes_per_action() {
        let t2v = CanonicalRequest {
            size: Some("1920*1080".into()),
            duration: Some(5),
            ..request()
        };
        let body = DashscopeAdapter::build_body(&t2v, ACTION_TEXT2VIDEO).unwrap();
        assert_eq!(body["input"]["prompt"], "rain on a window");
        assert_eq!(body["parameters"]["size"], "1920*1080");
        assert_eq!(body["parameters"]["duration"], 5);

        let kf = CanonicalRequest {
            image: Some("https://img/a.png".into()),
            image_tail: Some("https://img/b.png".into()),
            resolution: Some("720P".into()),
            ..request()
        };
        let body = DashscopeAdapter::build_body(&kf, ACTION_KEYFRAME2VIDEO).unwrap();
        assert_eq!(body["input"]["first_frame_url"], "https://img/a.png");
        assert_eq!(body["input"]["last_frame_url"], "https://img/b.png");
        assert_eq!(body["parameters"]["resolution"], "720P");
    }

    #[test]
    fn error_codes_map_to_categories() {
        let e = |code: &str| json!({ "code": code, "message": "m" });
        assert_matches!(map_error(401, &e("InvalidApiKey")), ProviderError::Unauthorized { .. });
        assert_matches!(
            map_error(429, &e("Throttling.RateQuota")),
            ProviderError::RateLimited { .. }
        );
        assert_matches!(map_error(400, &e("Arrearage")), ProviderError::QuotaExhausted { .. });
        assert_matches!(
            map_error(400, &e("DataInspectionFailed")),
            ProviderError::Rejected { .. }
        );
        assert_matches!(map_error(500, &e("InternalError")), ProviderError::Unavailable { .. });
    }

    #[test]
    fn webhooks_are_not_supported() {
        assert!(adapter()
            .parse_webhook(&WebhookAuth::default(), b"{}")
            .is_err());
    }
}
