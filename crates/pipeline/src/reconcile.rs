//! Idempotent terminal transition shared by the webhook and poll paths.
//!
//! Non-terminal observations are ignored. A terminal observation is
//! written with a single compare-and-swap on the task status, carrying the
//! failure refund or the success archive jobs in the same unit of work, so
//! a duplicate or racing notification can never re-fire side effects.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use mediagen_core::channels::CanonicalStatus;
use mediagen_core::naming;
use mediagen_db::models::asset_archive::NewAssetArchiveJob;
use mediagen_db::models::generation_task::{
    GenerationTask, TerminalTransition, TransitionRefund,
};
use mediagen_db::models::points::REASON_GENERATION_REFUND;
use mediagen_db::models::status::GenerationStatus;
use mediagen_providers::status::{self, Observation};
use serde_json::Value;

use crate::error::GenerationError;
use crate::store::TaskStore;

/// What a reconciliation did.
#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileOutcome {
    /// The observation is not terminal; nothing was written.
    Ignored(Observation),
    /// The task was already terminal, or another reconciliation won the CAS.
    AlreadyTerminal,
    /// This call moved the task to the given terminal status.
    Applied(GenerationStatus),
    /// No task matches the payload's provider task id.
    UnknownTask,
}

#[derive(Clone)]
pub struct Reconciler {
    tasks: Arc<dyn TaskStore>,
}

impl Reconciler {
    pub fn new(tasks: Arc<dyn TaskStore>) -> Self {
        Self { tasks }
    }

    /// Apply a raw provider payload to `task`.
    pub async fn reconcile(
        &self,
        task: &GenerationTask,
        payload: &Value,
    ) -> Result<ReconcileOutcome, GenerationError> {
        let channel = task.channel()?;
        let observation = status::normalize(channel, payload)?;

        if !observation.status.is_terminal() {
            tracing::debug!(
                task_id = %task.id,
                %channel,
                native_status = %observation.native_status,
                "Non-terminal observation ignored",
            );
            return Ok(ReconcileOutcome::Ignored(observation));
        }
        if task.status()?.is_terminal() {
            return Ok(ReconcileOutcome::AlreadyTerminal);
        }

        let transition = build_transition(task, payload, &observation)?;
        let applied = self.tasks.apply_terminal(task.id, &transition).await?;
        if !applied {
            tracing::debug!(task_id = %task.id, %channel, "Terminal transition lost the race");
            return Ok(ReconcileOutcome::AlreadyTerminal);
        }

        tracing::info!(
            task_id = %task.id,
            %channel,
            status = ?transition.status,
            duration_ms = transition.duration_ms,
            refunded = transition.refund.is_some(),
            archive_jobs = transition.archive_jobs.len(),
            "Task reached terminal status",
        );
        Ok(ReconcileOutcome::Applied(transition.status))
    }
}

fn build_transition(
    task: &GenerationTask,
    payload: &Value,
    observation: &Observation,
) -> Result<TerminalTransition, GenerationError> {
    let finished_at = observation
        .finished_at_ms
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .unwrap_or_else(Utc::now);
    let duration_ms = (finished_at - task.started_at).num_milliseconds().max(0);

    let mut transition = TerminalTransition {
        status: GenerationStatus::Success,
        response: payload.clone(),
        error_message: None,
        finished_at: Some(finished_at),
        duration_ms: Some(duration_ms),
        refund: None,
        archive_jobs: Vec::new(),
    };

    match observation.status {
        CanonicalStatus::Success => {
            let channel = task.channel()?;
            transition.archive_jobs = status::media_assets(channel, payload)
                .into_iter()
                .enumerate()
                .map(|(index, asset)| NewAssetArchiveJob {
                    asset_index: index as i32,
                    object_key: naming::archive_key(
                        asset.media_type,
                        &task.model,
                        &task.owner_id,
                        task.id,
                        index,
                        asset.extension,
                    ),
                    pointer: asset.pointer,
                    source_url: asset.url,
                })
                .collect();
        }
        _ => {
            let owner = task.owner()?;
            transition.status = GenerationStatus::Failed;
            transition.error_message = observation.fail_reason.clone();
            if owner.kind.is_billable() && task.points_cost > 0 {
                transition.refund = Some(TransitionRefund {
                    owner_id: owner.id,
                    amount: task.points_cost,
                    reason: REASON_GENERATION_REFUND,
                    description: format!("Refund for failed {} task {}", task.model, task.id),
                });
            }
        }
    }
    Ok(transition)
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use mediagen_core::channels::{Channel, MediaType, Owner, OwnerKind};
    use mediagen_db::models::generation_task::NewGenerationTask;
    use serde_json::json;
    use uuid::Uuid;

    use super::*;
    use crate::memory::MemoryStore;
    use crate::store::PointsStore;

    async fn seeded(store: &MemoryStore, kind: OwnerKind) -> GenerationTask {
        store
            .insert_task(&NewGenerationTask {
                id: Uuid::now_v7(),
                owner: Owner::new("u1", kind),
                media_type: MediaType::Video,
                channel: Channel::Kling,
                model: "kling-v2-1".into(),
                action: "text2video".into(),
                provider_task_id: "kt-1".into(),
                points_cost: 10,
                request: json!({ "prompt": "a kite" }),
                started_at: Utc::now() - Duration::seconds(90),
            })
            .await
            .unwrap()
    }

    fn kling(status: &str) -> Value {
        json!({
            "task_id": "kt-1",
            "task_status": status,
            "task_result": { "videos": [{ "url": "https://cdn.kling/v.mp4" }] }
        })
    }

    #[tokio::test]
    async fn in_progress_is_ignored() {
        let store = Arc::new(MemoryStore::new());
        let task = seeded(&store, OwnerKind::User).await;
        let reconciler = Reconciler::new(store.clone());

        let outcome = reconciler.reconcile(&task, &kling("processing")).await.unwrap();
        assert!(matches!(outcome, ReconcileOutcome::Ignored(_)));
        let stored = store.find_task(task.id).await.unwrap().unwrap();
        assert_eq!(stored.status().unwrap(), GenerationStatus::Generating);
    }

    #[tokio::test]
    async fn success_enqueues_archive_jobs() {
        let store = Arc::new(MemoryStore::new());
        let task = seeded(&store, OwnerKind::User).await;
        let reconciler = Reconciler::new(store.clone());

        let outcome = reconciler.reconcile(&task, &kling("succeed")).await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::Applied(GenerationStatus::Success));

        let stored = store.find_task(task.id).await.unwrap().unwrap();
        assert_eq!(stored.status().unwrap(), GenerationStatus::Success);
        assert!(stored.duration_ms.unwrap() >= 90_000);

        let jobs = store.archive_jobs_for_task(task.id).await.unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].pointer, "/task_result/videos/0/url");
        assert_eq!(
            jobs[0].object_key,
            format!("ai/video/kling-v2-1/u1/{}-0.mp4", task.id)
        );
    }

    #[tokio::test]
    async fn failure_refunds_once() {
        let store = Arc::new(MemoryStore::new());
        let task = seeded(&store, OwnerKind::User).await;
        let reconciler = Reconciler::new(store.clone());

        let first = reconciler.reconcile(&task, &kling("failed")).await.unwrap();
        // Stale row: the second call still sees `Generating` and must lose the CAS.
        let second = reconciler.reconcile(&task, &kling("failed")).await.unwrap();

        assert_eq!(first, ReconcileOutcome::Applied(GenerationStatus::Failed));
        assert_eq!(second, ReconcileOutcome::AlreadyTerminal);
        assert_eq!(store.balance("u1").await.unwrap(), Some(10));

        let stored = store.find_task(task.id).await.unwrap().unwrap();
        assert_eq!(stored.error_message.as_deref(), Some("kling task failed"));
    }

    #[tokio::test]
    async fn admin_failure_is_not_refunded() {
        let store = Arc::new(MemoryStore::new());
        let task = seeded(&store, OwnerKind::Admin).await;
        let reconciler = Reconciler::new(store.clone());

        reconciler.reconcile(&task, &kling("failed")).await.unwrap();
        assert!(store.ledger_for_task(task.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn terminal_status_is_absorbing() {
        let store = Arc::new(MemoryStore::new());
        let task = seeded(&store, OwnerKind::User).await;
        let reconciler = Reconciler::new(store.clone());

        reconciler.reconcile(&task, &kling("succeed")).await.unwrap();
        let fresh = store.find_task(task.id).await.unwrap().unwrap();
        let outcome = reconciler.reconcile(&fresh, &kling("failed")).await.unwrap();

        assert_eq!(outcome, ReconcileOutcome::AlreadyTerminal);
        let stored = store.find_task(task.id).await.unwrap().unwrap();
        assert_eq!(stored.status().unwrap(), GenerationStatus::Success);
    }
}
