//! Point cost resolution for generation requests.
//!
//! Request values are merged over the model's defaults (explicit values
//! win), then the model's pricing rules are scanned in order and the first
//! rule whose defined dimensions all match is used.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::model_config::{ModelConfig, ModelRegistry};
use crate::types::Points;

/// Request dimensions that can influence the price.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingDimensions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
}

impl PricingDimensions {
    /// Overlay `self` on top of `defaults`; values set on `self` win.
    pub fn merged_over(&self, defaults: &PricingDimensions) -> PricingDimensions {
        PricingDimensions {
            resolution: self.resolution.clone().or_else(|| defaults.resolution.clone()),
            aspect_ratio: self
                .aspect_ratio
                .clone()
                .or_else(|| defaults.aspect_ratio.clone()),
            mode: self.mode.clone().or_else(|| defaults.mode.clone()),
            duration: self.duration.or(defaults.duration),
        }
    }

    /// Whether a rule with these dimensions covers `requested`.
    ///
    /// A dimension unset on either side counts as a match.
    pub fn covers(&self, requested: &PricingDimensions) -> bool {
        dimension_matches(&self.resolution, &requested.resolution)
            && dimension_matches(&self.aspect_ratio, &requested.aspect_ratio)
            && dimension_matches(&self.mode, &requested.mode)
            && dimension_matches(&self.duration, &requested.duration)
    }
}

fn dimension_matches<T: PartialEq>(rule: &Option<T>, requested: &Option<T>) -> bool {
    match (rule, requested) {
        (Some(rule), Some(requested)) => rule == requested,
        _ => true,
    }
}

impl ModelConfig {
    /// Price of a request against this model's pricing table.
    pub fn price_for(&self, params: &PricingDimensions) -> Option<Points> {
        let resolved = params.merged_over(&self.defaults);
        self.pricing
            .iter()
            .find(|rule| rule.dimensions.covers(&resolved))
            .map(|rule| rule.price)
    }
}

/// Resolve the point cost of a request.
///
/// Unknown model or no matching pricing rule both yield
/// [`CoreError::InvalidModel`]. Pure: no side effects.
pub fn resolve(
    registry: &ModelRegistry,
    model: &str,
    params: &PricingDimensions,
) -> Result<Points, CoreError> {
    let config = registry
        .get(model)
        .ok_or_else(|| CoreError::InvalidModel(format!("Unknown model '{model}'")))?;

    config.price_for(params).ok_or_else(|| {
        CoreError::InvalidModel(format!(
            "No pricing rule of model '{model}' matches the request parameters"
        ))
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
