//! Provider adapters for the external AI generation services.
//!
//! Each adapter translates the canonical generation request into one
//! provider's schema, authenticates against it, and hands back raw status
//! payloads. Payloads are interpreted centrally by [`status`], never inside
//! an adapter.

pub mod adapter;
pub mod dashscope;
pub mod error;
pub mod http;
pub mod kling;
pub mod request;
pub mod sora2;
pub mod status;
pub mod text_command;
pub mod volcengine;

pub use adapter::{AdapterRegistry, ProviderAdapter};
pub use error::ProviderError;
pub use request::{CanonicalRequest, CreatedTask, WebhookAuth};

use std::sync::Arc;

/// Build the registry from environment configuration.
///
/// A channel whose required credentials are missing is left out and logged;
/// requests for its models then fail model lookup.
pub fn adapters_from_env() -> AdapterRegistry {
    let mut registry = AdapterRegistry::new();

    match kling::KlingConfig::from_env() {
        Some(config) => {
            warn_without_webhook_secret("KLING_WEBHOOK_SECRET", config.webhook_secret.as_deref());
            registry.register(Arc::new(kling::KlingAdapter::new(config)));
        }
        None => tracing::warn!("KLING_ACCESS_KEY not set, Kling channel disabled"),
    }
    match volcengine::VolcengineConfig::from_env() {
        Some(config) => {
            warn_without_webhook_secret(
                "VOLCENGINE_WEBHOOK_SECRET",
                config.webhook_secret.as_deref(),
            );
            registry.register(Arc::new(volcengine::VolcengineAdapter::new(config)));
        }
        None => tracing::warn!("VOLCENGINE_API_KEY not set, Volcengine channel disabled"),
    }
    match dashscope::DashscopeConfig::from_env() {
        Some(config) => registry.register(Arc::new(dashscope::DashscopeAdapter::new(config))),
        None => tracing::warn!("DASHSCOPE_API_KEY not set, Dashscope channel disabled"),
    }
    match sora2::Sora2Config::from_env() {
        Some(config) => {
            warn_without_webhook_secret("SORA2_WEBHOOK_SECRET", config.webhook_secret.as_deref());
            registry.register(Arc::new(sora2::Sora2Adapter::new(config)));
        }
        None => tracing::warn!("SORA2_BASE_URL or SORA2_API_KEY not set, Sora2 channel disabled"),
    }

    tracing::info!(channels = ?registry.channels(), "Provider adapters configured");
    registry
}

fn warn_without_webhook_secret(var: &str, secret: Option<&str>) {
    if secret.map_or(true, str::is_empty) {
        tracing::warn!("{var} not set, webhooks will be rejected and tasks resolve by polling");
    }
}
