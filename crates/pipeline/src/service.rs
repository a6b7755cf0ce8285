//! The generation flows: submit, query, webhook, list, catalog.

use std::sync::Arc;

use chrono::Utc;
use mediagen_core::channels::{CanonicalStatus, Channel, MediaType, Owner};
use mediagen_core::error::CoreError;
use mediagen_core::model_config::{ModelConfig, ModelRegistry};
use mediagen_core::pricing;
use mediagen_core::types::{Points, TaskId};
use mediagen_db::models::generation_task::{GenerationTask, NewGenerationTask, TaskListQuery};
use mediagen_db::models::points::REASON_CREATE_FAILURE_COMPENSATION;
use mediagen_db::models::status::GenerationStatus;
use mediagen_providers::{status, AdapterRegistry, CanonicalRequest, ProviderError, WebhookAuth};
use uuid::Uuid;

use crate::archive::AssetArchiver;
use crate::billing::BillingGateway;
use crate::error::GenerationError;
use crate::reconcile::{ReconcileOutcome, Reconciler};
use crate::store::{PointsStore, TaskStore};
use crate::view::{SubmittedTask, TaskPage, TaskView};

/// Default page size for task listing.
pub const DEFAULT_PAGE_SIZE: i64 = 20;

/// Largest page size a caller may request.
pub const MAX_PAGE_SIZE: i64 = 100;

/// Orchestrates generation tasks across all configured providers.
#[derive(Clone)]
pub struct GenerationService {
    models: Arc<ModelRegistry>,
    adapters: AdapterRegistry,
    tasks: Arc<dyn TaskStore>,
    billing: BillingGateway,
    reconciler: Reconciler,
    archiver: AssetArchiver,
}

impl GenerationService {
    pub fn new(
        models: Arc<ModelRegistry>,
        adapters: AdapterRegistry,
        tasks: Arc<dyn TaskStore>,
        points: Arc<dyn PointsStore>,
        archiver: AssetArchiver,
    ) -> Self {
        Self {
            models,
            adapters,
            reconciler: Reconciler::new(tasks.clone()),
            billing: BillingGateway::new(points),
            tasks,
            archiver,
        }
    }

    pub fn billing(&self) -> &BillingGateway {
        &self.billing
    }

    pub fn archiver(&self) -> &AssetArchiver {
        &self.archiver
    }

    /// Channels with a registered adapter.
    pub fn channels(&self) -> Vec<Channel> {
        self.adapters.channels()
    }

    /// Submit a generation request.
    ///
    /// `channel` is set by provider-specific routes; the model must then
    /// belong to that channel. Points are reserved before the provider is
    /// called and compensated if the provider (or the task insert) fails.
    pub async fn generate(
        &self,
        owner: &Owner,
        channel: Option<Channel>,
        request: CanonicalRequest,
    ) -> Result<SubmittedTask, GenerationError> {
        let model = self.model(&request.model)?;
        if let Some(scope) = channel {
            if model.channel != scope {
                return Err(CoreError::InvalidModel(format!(
                    "Model '{}' is not served by channel {scope}",
                    model.name
                ))
                .into());
            }
        }
        let adapter = self.adapters.get(model.channel).ok_or_else(|| {
            CoreError::InvalidModel(format!("Channel {} is not configured", model.channel))
        })?;

        let action = adapter.resolve_action(&request).map_err(request_error)?;
        let price = pricing::resolve(
            &self.models,
            &model.name,
            &adapter.pricing_dimensions(&request),
        )?;

        let task_id = Uuid::now_v7();
        let started_at = Utc::now();
        let description = format!("{} {} via {}", model.name, action, model.channel);
        self.billing
            .reserve(owner, price, task_id, &description)
            .await?;

        let created = match adapter.create(&request, &action).await {
            Ok(created) => created,
            Err(source) => {
                tracing::warn!(
                    %task_id,
                    channel = %model.channel,
                    owner_id = %owner.id,
                    error = %source,
                    "Provider create failed",
                );
                self.compensate(owner, task_id, price).await;
                return Err(GenerationError::ProviderCreateFailure {
                    channel: model.channel,
                    source,
                });
            }
        };

        let snapshot = serde_json::to_value(&request)
            .map_err(|e| CoreError::Internal(format!("Unserializable request: {e}")))?;
        let new_task = NewGenerationTask {
            id: task_id,
            owner: owner.clone(),
            media_type: model.media_type,
            channel: model.channel,
            model: model.name.clone(),
            action,
            provider_task_id: created.provider_task_id,
            points_cost: price,
            request: snapshot,
            started_at,
        };
        if let Err(e) = self.tasks.insert_task(&new_task).await {
            tracing::error!(
                %task_id,
                channel = %model.channel,
                provider_task_id = %new_task.provider_task_id,
                error = %e,
                "Failed to record created task",
            );
            self.compensate(owner, task_id, price).await;
            return Err(e.into());
        }

        tracing::info!(
            %task_id,
            channel = %model.channel,
            model = %model.name,
            action = %new_task.action,
            owner_id = %owner.id,
            points = price,
            "Generation task submitted",
        );
        Ok(SubmittedTask {
            task_id,
            status: CanonicalStatus::Submitted,
            message: String::new(),
        })
    }

    /// Canonical status of a task, polling the provider while it is running.
    pub async fn query(
        &self,
        owner: &Owner,
        media_type: MediaType,
        channel: Option<Channel>,
        task_id: &str,
    ) -> Result<TaskView, GenerationError> {
        let task = self.visible_task(owner, media_type, channel, task_id).await?;
        if task.status()?.is_terminal() {
            return Ok(TaskView::from_task(&task));
        }

        let task_channel = task.channel()?;
        let Some(adapter) = self.adapters.get(task_channel) else {
            return Ok(TaskView::from_task(&task));
        };
        let payload = match adapter.query(&task.provider_task_id, &task.action).await {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(
                    task_id = %task.id,
                    channel = %task_channel,
                    error = %e,
                    "Provider status query failed, returning stored status",
                );
                return Ok(TaskView::from_task(&task));
            }
        };

        match self.reconciler.reconcile(&task, &payload).await {
            Ok(ReconcileOutcome::Ignored(observation)) => {
                Ok(TaskView::from_observation(&task, &observation))
            }
            Ok(ReconcileOutcome::Applied(status)) => {
                if status == GenerationStatus::Success {
                    self.archive_inline(task.id).await;
                }
                self.reload_view(task.id).await
            }
            Ok(_) => self.reload_view(task.id).await,
            Err(e) => {
                tracing::warn!(
                    task_id = %task.id,
                    channel = %task_channel,
                    error = %e,
                    "Could not reconcile polled status",
                );
                Ok(TaskView::from_task(&task))
            }
        }
    }

    /// Apply a provider webhook.
    pub async fn handle_webhook(
        &self,
        channel: Channel,
        auth: &WebhookAuth,
        body: &[u8],
    ) -> Result<ReconcileOutcome, GenerationError> {
        let adapter = self.adapters.get(channel).ok_or_else(|| {
            CoreError::Validation(format!("Channel {channel} is not configured"))
        })?;
        let payload = adapter.parse_webhook(auth, body).map_err(webhook_error)?;
        let observation = status::normalize(channel, &payload).map_err(webhook_error)?;

        let Some(task) = self
            .tasks
            .find_task_by_provider_id(channel, &observation.provider_task_id)
            .await?
        else {
            tracing::warn!(
                %channel,
                provider_task_id = %observation.provider_task_id,
                "Webhook for unknown task",
            );
            return Ok(ReconcileOutcome::UnknownTask);
        };

        let outcome = self.reconciler.reconcile(&task, &payload).await?;
        if outcome == ReconcileOutcome::Applied(GenerationStatus::Success) {
            self.archive_inline(task.id).await;
        }
        Ok(outcome)
    }

    /// One page of an owner's tasks, newest first.
    pub async fn list(
        &self,
        owner: &Owner,
        media_type: MediaType,
        channel: Option<Channel>,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<TaskPage, GenerationError> {
        let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        let offset = offset.unwrap_or(0).max(0);
        let (tasks, total) = self
            .tasks
            .list_tasks(&TaskListQuery {
                owner: owner.clone(),
                media_type,
                channel,
                limit,
                offset,
            })
            .await?;
        Ok(TaskPage {
            items: tasks.iter().map(TaskView::from_task).collect(),
            total,
            limit,
            offset,
        })
    }

    /// Configured models of one media type.
    pub fn models(&self, media_type: MediaType) -> Vec<ModelConfig> {
        self.models.models_of(media_type).cloned().collect()
    }

    fn model(&self, name: &str) -> Result<&ModelConfig, CoreError> {
        self.models
            .get(name)
            .ok_or_else(|| CoreError::InvalidModel(format!("Unknown model '{name}'")))
    }

    /// Load a task the caller may see under this route's scope.
    async fn visible_task(
        &self,
        owner: &Owner,
        media_type: MediaType,
        channel: Option<Channel>,
        task_id: &str,
    ) -> Result<GenerationTask, GenerationError> {
        let invalid = || CoreError::InvalidTaskId(task_id.to_string());
        let id: TaskId = task_id.trim().parse().map_err(|_| invalid())?;
        let task = self.tasks.find_task(id).await?.ok_or_else(invalid)?;

        let visible = task.is_owned_by(owner)
            && task.media_type == media_type.name()
            && channel.map_or(true, |c| task.channel == c.name());
        if !visible {
            return Err(invalid().into());
        }
        Ok(task)
    }

    async fn reload_view(&self, id: TaskId) -> Result<TaskView, GenerationError> {
        let task = self
            .tasks
            .find_task(id)
            .await?
            .ok_or_else(|| CoreError::InvalidTaskId(id.to_string()))?;
        Ok(TaskView::from_task(&task))
    }

    /// Best-effort copy right after success; the background loop retries.
    async fn archive_inline(&self, task_id: TaskId) {
        if let Err(e) = self.archiver.archive_task(task_id).await {
            tracing::warn!(%task_id, error = %e, "Inline archiving failed");
        }
    }

    /// Give back a reservation whose task never came to exist.
    async fn compensate(&self, owner: &Owner, task_id: TaskId, amount: Points) {
        let result = self
            .billing
            .refund(
                owner,
                task_id,
                amount,
                REASON_CREATE_FAILURE_COMPENSATION,
                "Provider task creation failed",
            )
            .await;
        if let Err(e) = result {
            tracing::error!(
                %task_id,
                owner_id = %owner.id,
                amount,
                error = %e,
                "Compensating refund failed",
            );
        }
    }
}

/// Adapter rejections of the request shape are caller errors.
fn request_error(err: ProviderError) -> GenerationError {
    match err {
        ProviderError::InvalidRequest(message) => CoreError::Validation(message).into(),
        other => other.into(),
    }
}

fn webhook_error(err: ProviderError) -> GenerationError {
    match err {
        ProviderError::WebhookAuth { channel } => {
            CoreError::Unauthorized(format!("Invalid {channel} webhook credentials")).into()
        }
        ProviderError::InvalidResponse { message, .. } | ProviderError::InvalidRequest(message) => {
            CoreError::Validation(message).into()
        }
        other => other.into(),
    }
}
