//! Canonical request and response shapes shared by all adapters.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Provider-independent description of a generation request.
///
/// Route handlers build one of these from either the generic generate body
/// or a provider-specific body; adapters translate it into their schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRequest {
    pub model: String,
    #[serde(default)]
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub negative_prompt: Option<String>,
    /// Reference image, or first frame.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Last frame.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_tail: Option<String>,
    /// Multiple reference images.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    /// Explicit action chosen by a provider-specific route. Inferred when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    /// Provider-specific extras (`cfg_scale`, `prompt_extend`, `orientation`, ...).
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl CanonicalRequest {
    /// Non-empty metadata string value.
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
    }

    /// The reference images, whichever field carried them.
    pub fn all_images(&self) -> Vec<String> {
        if !self.images.is_empty() {
            return self.images.clone();
        }
        self.image.iter().cloned().collect()
    }
}

/// A task the provider accepted.
#[derive(Debug, Clone, PartialEq)]
pub struct CreatedTask {
    /// The provider's correlation key for the task.
    pub provider_task_id: String,
    /// The provider's raw create response.
    pub raw: Value,
}

/// Authentication material presented with an incoming webhook.
#[derive(Debug, Clone, Default)]
pub struct WebhookAuth {
    /// `?token=` from the callback URL we registered.
    pub token: Option<String>,
    /// Hex HMAC-SHA256 signature of the raw body, if the sender signs.
    pub signature: Option<String>,
}
