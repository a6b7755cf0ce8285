//! Immutable model catalog: model name → channel, defaults, pricing rules.
//!
//! Loaded once at startup (JSON) and shared behind an `Arc`. Nothing in the
//! process mutates it afterwards.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::channels::{Channel, MediaType};
use crate::error::CoreError;
use crate::pricing::PricingDimensions;
use crate::types::Points;

/// One priced combination of request dimensions.
///
/// A dimension left as `None` is a wildcard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingRule {
    #[serde(flatten)]
    pub dimensions: PricingDimensions,
    pub price: Points,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_price: Option<Points>,
}

/// Configuration of a single generation model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelConfig {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub channel: Channel,
    #[serde(default = "default_media_type")]
    pub media_type: MediaType,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Supported actions, e.g. `text2video`, `image2video`.
    #[serde(default)]
    pub modes: Vec<String>,
    #[serde(default)]
    pub resolutions: Vec<String>,
    #[serde(default)]
    pub durations: Vec<u32>,
    #[serde(default)]
    pub supported_parameters: Vec<String>,
    #[serde(default)]
    pub defaults: PricingDimensions,
    pub pricing: Vec<PricingRule>,
}

fn default_media_type() -> MediaType {
    MediaType::Video
}

/// The full model catalog.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelRegistry {
    models: Vec<ModelConfig>,
}

impl ModelRegistry {
    /// Build a registry from already-parsed models, validating them.
    pub fn new(models: Vec<ModelConfig>) -> Result<Self, CoreError> {
        validate_models(&models)?;
        Ok(Self { models })
    }

    /// Parse a JSON document of the form `{ "models": [ ... ] }`.
    pub fn from_json_str(json: &str) -> Result<Self, CoreError> {
        let parsed: ModelRegistry = serde_json::from_str(json)
            .map_err(|e| CoreError::Validation(format!("Invalid model configuration: {e}")))?;
        Self::new(parsed.models)
    }

    /// Read and parse the catalog file at `path`.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            CoreError::Internal(format!(
                "Failed to read model configuration {}: {e}",
                path.display()
            ))
        })?;
        Self::from_json_str(&json)
    }

    /// Look up a model by name.
    pub fn get(&self, name: &str) -> Option<&ModelConfig> {
        self.models.iter().find(|m| m.name == name)
    }

    /// All models, in configuration order.
    pub fn models(&self) -> &[ModelConfig] {
        &self.models
    }

    /// Models of one media type (the catalog endpoint lists video models).
    pub fn models_of(&self, media_type: MediaType) -> impl Iterator<Item = &ModelConfig> {
        self.models.iter().filter(move |m| m.media_type == media_type)
    }
}

fn validate_models(models: &[ModelConfig]) -> Result<(), CoreError> {
    let mut seen = HashSet::new();
    for model in models {
        if model.name.trim().is_empty() {
            return Err(CoreError::Validation("Model name must not be empty".into()));
        }
        if !seen.insert(model.name.as_str()) {
            return Err(CoreError::Validation(format!(
                "Duplicate model name '{}'",
                model.name
            )));
        }
        if model.pricing.is_empty() {
            return Err(CoreError::Validation(format!(
                "Model '{}' has no pricing rules",
                model.name
            )));
        }
        if let Some(rule) = model.pricing.iter().find(|r| r.price < 0) {
            return Err(CoreError::Validation(format!(
                "Model '{}' has a negative price ({})",
                model.name, rule.price
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"{
        "models": [
            {
                "name": "kling-v2-1",
                "description": "Kling 2.1",
                "channel": "kling",
                "modes": ["text2video", "image2video"],
                "resolutions": ["720p"],
                "durations": [5, 10],
                "defaults": { "mode": "std", "duration": 5 },
                "pricing": [
                    { "mode": "std", "duration": 5, "price": 10 },
                    { "mode": "pro", "duration": 10, "price": 40, "originPrice": 50 }
                ]
            }
        ]
    }"#;

    #[test]
    fn parses_catalog() {
        let registry = ModelRegistry::from_json_str(CATALOG).unwrap();
        let model = registry.get("kling-v2-1").unwrap();
        assert_eq!(model.channel, Channel::Kling);
        assert_eq!(model.media_type, MediaType::Video);
        assert_eq!(model.defaults.mode.as_deref(), Some("std"));
        assert_eq!(model.pricing[1].origin_price, Some(50));
    }

    #[test]
    fn unknown_model_is_none() {
        let registry = ModelRegistry::from_json_str(CATALOG).unwrap();
        assert!(registry.get("sora-9").is_none());
    }

    #[test]
    fn rejects_duplicate_names() {
        let model = ModelRegistry::from_json_str(CATALOG).unwrap().models()[0].clone();
        assert!(ModelRegistry::new(vec![model.clone(), model]).is_err());
    }

    #[test]
    fn rejects_model_without_pricing() {
        let mut model = ModelRegistry::from_json_str(CATALOG).unwrap().models()[0].clone();
        model.pricing.clear();
        assert!(ModelRegistry::new(vec![model]).is_err());
    }

    #[test]
    fn shipped_catalog_prices_every_rule() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../../config/models.json");
        let registry = ModelRegistry::from_path(path).unwrap();
        assert!(registry.models_of(MediaType::Video).count() > 0);
        for model in registry.models() {
            for rule in &model.pricing {
                assert_eq!(
                    model.price_for(&rule.dimensions),
                    Some(rule.price),
                    "model {} rule {:?}",
                    model.name,
                    rule
                );
            }
        }
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(ModelRegistry::from_json_str("{ \"models\": 3 }").is_err());
    }
}
