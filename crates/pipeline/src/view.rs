//! Caller-facing task shapes.

use mediagen_core::channels::{CanonicalStatus, Channel};
use mediagen_core::types::TaskId;
use mediagen_db::models::generation_task::GenerationTask;
use mediagen_db::models::status::GenerationStatus;
use mediagen_providers::status::{self, Observation};
use serde::Serialize;
use serde_json::{Map, Value};

/// Progress shown for a `Generating` task when no fresh provider
/// observation is available.
const STORED_GENERATING_PROGRESS: &str = "30%";

/// Canonical status of one task. `task_id` is always the internal id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskView {
    pub task_id: TaskId,
    pub action: String,
    pub status: CanonicalStatus,
    pub fail_reason: String,
    /// Unix seconds.
    pub submit_time: i64,
    pub start_time: i64,
    /// Unix seconds; `0` until the task is terminal.
    pub finish_time: i64,
    pub progress: String,
    /// Result part of the provider response (archived URLs already
    /// rewritten), or `{}`.
    pub data: Value,
}

impl TaskView {
    /// View of the stored row alone.
    pub fn from_task(task: &GenerationTask) -> Self {
        let started = task.started_at.timestamp();
        let status = task.status().unwrap_or(GenerationStatus::Generating);
        let (canonical, progress) = match status {
            GenerationStatus::Generating => {
                (CanonicalStatus::InProgress, STORED_GENERATING_PROGRESS)
            }
            GenerationStatus::Success => (
                CanonicalStatus::Success,
                CanonicalStatus::Success.progress(),
            ),
            GenerationStatus::Failed => (
                CanonicalStatus::Failure,
                CanonicalStatus::Failure.progress(),
            ),
        };

        Self {
            task_id: task.id,
            action: task.action.clone(),
            status: canonical,
            fail_reason: task.error_message.clone().unwrap_or_default(),
            submit_time: started,
            start_time: started,
            finish_time: task.finished_at.map(|t| t.timestamp()).unwrap_or(0),
            progress: progress.to_string(),
            data: result_data(task),
        }
    }

    /// View of a still-running task, refreshed with a provider observation.
    pub fn from_observation(task: &GenerationTask, observation: &Observation) -> Self {
        let started = task.started_at.timestamp();
        let or_started = |secs: i64| if secs > 0 { secs } else { started };
        Self {
            status: observation.status,
            progress: observation.progress.to_string(),
            submit_time: or_started(observation.submit_time),
            start_time: or_started(observation.start_time),
            ..Self::from_task(task)
        }
    }
}

fn result_data(task: &GenerationTask) -> Value {
    match (&task.response, Channel::from_name(&task.channel).ok()) {
        (Some(response), Some(channel)) => status::result_data(channel, response),
        _ => Value::Object(Map::new()),
    }
}

/// Acknowledgement of an accepted generate request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmittedTask {
    pub task_id: TaskId,
    pub status: CanonicalStatus,
    pub message: String,
}

/// One page of an owner's tasks.
#[derive(Debug, Clone, Serialize)]
pub struct TaskPage {
    pub items: Vec<TaskView>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}
