//! Generation task ledger rows.

use mediagen_core::channels::{Channel, MediaType, Owner, OwnerKind};
use mediagen_core::error::CoreError;
use mediagen_core::types::{Points, TaskId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

use super::asset_archive::NewAssetArchiveJob;
use super::status::{GenerationStatus, StatusId};

/// A row from the `generation_tasks` table.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct GenerationTask {
    pub id: TaskId,
    pub owner_id: String,
    pub owner_kind: String,
    pub media_type: String,
    pub channel: String,
    pub model: String,
    pub action: String,
    /// Provider-side correlation key. Never exposed to callers.
    #[serde(skip_serializing)]
    pub provider_task_id: String,
    pub status_id: StatusId,
    pub points_cost: Points,
    pub request: serde_json::Value,
    pub response: Option<serde_json::Value>,
    pub error_message: Option<String>,
    pub started_at: Timestamp,
    pub finished_at: Option<Timestamp>,
    pub duration_ms: Option<i64>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl GenerationTask {
    pub fn status(&self) -> Result<GenerationStatus, CoreError> {
        GenerationStatus::from_id(self.status_id).ok_or_else(|| {
            CoreError::Internal(format!(
                "Task {} has unknown status id {}",
                self.id, self.status_id
            ))
        })
    }

    pub fn channel(&self) -> Result<Channel, CoreError> {
        Channel::from_name(&self.channel)
    }

    pub fn media_type(&self) -> Result<MediaType, CoreError> {
        MediaType::from_name(&self.media_type)
    }

    pub fn owner(&self) -> Result<Owner, CoreError> {
        Ok(Owner::new(
            self.owner_id.clone(),
            OwnerKind::from_name(&self.owner_kind)?,
        ))
    }

    /// Whether `owner` may see this task.
    pub fn is_owned_by(&self, owner: &Owner) -> bool {
        self.owner_id == owner.id && self.owner_kind == owner.kind.name()
    }
}

/// Insert DTO for a freshly created provider task.
#[derive(Debug, Clone)]
pub struct NewGenerationTask {
    pub id: TaskId,
    pub owner: Owner,
    pub media_type: MediaType,
    pub channel: Channel,
    pub model: String,
    pub action: String,
    pub provider_task_id: String,
    pub points_cost: Points,
    pub request: serde_json::Value,
    pub started_at: Timestamp,
}

/// Filters for listing an owner's tasks.
#[derive(Debug, Clone)]
pub struct TaskListQuery {
    pub owner: Owner,
    pub media_type: MediaType,
    pub channel: Option<Channel>,
    pub limit: i64,
    pub offset: i64,
}

/// Points credited back to the owner as part of a terminal transition.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionRefund {
    pub owner_id: String,
    pub amount: Points,
    pub reason: &'static str,
    pub description: String,
}

/// Everything written when a task leaves `Generating`.
///
/// Applied as one unit of work guarded by a compare-and-swap on the status
/// column: either all of it lands, or none of it does.
#[derive(Debug, Clone)]
pub struct TerminalTransition {
    pub status: GenerationStatus,
    pub response: serde_json::Value,
    pub error_message: Option<String>,
    pub finished_at: Option<Timestamp>,
    pub duration_ms: Option<i64>,
    pub refund: Option<TransitionRefund>,
    pub archive_jobs: Vec<NewAssetArchiveJob>,
}
