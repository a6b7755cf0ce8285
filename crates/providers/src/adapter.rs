//! The provider adapter seam and the channel → adapter registry.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use mediagen_core::channels::Channel;
use mediagen_core::pricing::PricingDimensions;
use serde_json::Value;

use crate::error::ProviderError;
use crate::request::{CanonicalRequest, CreatedTask, WebhookAuth};

/// One external generation provider.
///
/// Adapters own request translation, provider auth, callback registration,
/// error-code mapping and webhook authenticity. They never interpret task
/// status; raw payloads go to [`crate::status`].
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn channel(&self) -> Channel;

    /// Pick (or validate an explicit) action for a request.
    ///
    /// Rejects requests this provider cannot serve, e.g. a missing image.
    fn resolve_action(&self, request: &CanonicalRequest) -> Result<String, ProviderError>;

    /// The request dimensions used to price it.
    fn pricing_dimensions(&self, request: &CanonicalRequest) -> PricingDimensions {
        default_pricing_dimensions(request)
    }

    /// Submit a task to the provider.
    async fn create(
        &self,
        request: &CanonicalRequest,
        action: &str,
    ) -> Result<CreatedTask, ProviderError>;

    /// Fetch the raw status payload of a task.
    async fn query(&self, provider_task_id: &str, action: &str) -> Result<Value, ProviderError>;

    /// Authenticate and parse a webhook body into the same shape `query` returns.
    fn parse_webhook(&self, auth: &WebhookAuth, body: &[u8]) -> Result<Value, ProviderError>;
}

/// Pricing dimensions read straight off the canonical fields.
pub fn default_pricing_dimensions(request: &CanonicalRequest) -> PricingDimensions {
    PricingDimensions {
        resolution: request.resolution.clone().or_else(|| request.size.clone()),
        aspect_ratio: request.aspect_ratio.clone(),
        mode: request.mode.clone(),
        duration: request.duration,
    }
}

/// Adapters keyed by channel.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: HashMap<Channel, Arc<dyn ProviderAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter under its own channel, replacing any previous one.
    pub fn register(&mut self, adapter: Arc<dyn ProviderAdapter>) {
        self.adapters.insert(adapter.channel(), adapter);
    }

    pub fn with(mut self, adapter: Arc<dyn ProviderAdapter>) -> Self {
        self.register(adapter);
        self
    }

    pub fn get(&self, channel: Channel) -> Option<Arc<dyn ProviderAdapter>> {
        self.adapters.get(&channel).cloned()
    }

    /// Registered channels, in [`Channel::ALL`] order.
    pub fn channels(&self) -> Vec<Channel> {
        Channel::ALL
            .into_iter()
            .filter(|c| self.adapters.contains_key(c))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

impl std::fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("channels", &self.channels())
            .finish()
    }
}
