//! Migrates provider-hosted media into owned object storage.
//!
//! Works off the `asset_archive_jobs` outbox written with a task's success
//! transition. Each claimed job is copied (skipped when the object already
//! exists), then marked done, which rewrites the URL in the task response.
//! Failures are retried with exponential backoff until the attempt budget
//! is spent; the task itself keeps its provider URL in that case.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use mediagen_core::storage::{ObjectStorage, StorageError, StoredObject};
use mediagen_core::types::TaskId;
use mediagen_db::models::asset_archive::AssetArchiveJob;

use crate::error::GenerationError;
use crate::store::TaskStore;

/// Retry behaviour of archive jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchivePolicy {
    pub max_attempts: i32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
    /// How long a claimed job is hidden from other archivers.
    pub lease: Duration,
}

impl Default for ArchivePolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_backoff: Duration::from_secs(30),
            max_backoff: Duration::from_secs(3600),
            lease: Duration::from_secs(300),
        }
    }
}

impl ArchivePolicy {
    /// Delay before the attempt following attempt number `attempts`.
    pub fn backoff(&self, attempts: i32) -> Duration {
        let exponent = attempts.saturating_sub(1).clamp(0, 16) as u32;
        self.base_backoff
            .saturating_mul(2u32.saturating_pow(exponent))
            .min(self.max_backoff)
    }
}

/// Counts from one archive pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArchiveSummary {
    pub archived: usize,
    pub retried: usize,
    pub failed: usize,
}

#[derive(Clone)]
pub struct AssetArchiver {
    tasks: Arc<dyn TaskStore>,
    storage: Arc<dyn ObjectStorage>,
    policy: ArchivePolicy,
}

impl AssetArchiver {
    pub fn new(tasks: Arc<dyn TaskStore>, storage: Arc<dyn ObjectStorage>) -> Self {
        Self {
            tasks,
            storage,
            policy: ArchivePolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: ArchivePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Copy `source_url` to `key`, short-circuiting when it already exists.
    pub async fn archive(
        &self,
        source_url: &str,
        key: &str,
    ) -> Result<StoredObject, StorageError> {
        if self.storage.head_object(key).await?.is_some() {
            tracing::debug!(key, "Object already archived, skipping copy");
            return Ok(StoredObject {
                key: key.to_string(),
                url: self.storage.public_url(key),
            });
        }
        self.storage.put_object_from_url(source_url, key).await
    }

    /// Archive the due assets of one task right after it succeeded.
    pub async fn archive_task(&self, task_id: TaskId) -> Result<ArchiveSummary, GenerationError> {
        let jobs = self
            .tasks
            .claim_task_archive_jobs(task_id, self.lease_secs())
            .await?;
        self.process(jobs).await
    }

    /// Archive up to `limit` due jobs across all tasks.
    pub async fn run_due(&self, limit: i64) -> Result<ArchiveSummary, GenerationError> {
        let jobs = self
            .tasks
            .claim_due_archive_jobs(limit, self.lease_secs())
            .await?;
        self.process(jobs).await
    }

    fn lease_secs(&self) -> i64 {
        self.policy.lease.as_secs() as i64
    }

    async fn process(&self, jobs: Vec<AssetArchiveJob>) -> Result<ArchiveSummary, GenerationError> {
        let mut summary = ArchiveSummary::default();
        for job in jobs {
            match self.archive(&job.source_url, &job.object_key).await {
                Ok(stored) => {
                    self.tasks.complete_archive_job(job.id, &stored.url).await?;
                    tracing::info!(
                        task_id = %job.task_id,
                        job_id = job.id,
                        key = %stored.key,
                        "Asset archived",
                    );
                    summary.archived += 1;
                }
                Err(e) if job.attempts >= self.policy.max_attempts => {
                    tracing::error!(
                        task_id = %job.task_id,
                        job_id = job.id,
                        attempts = job.attempts,
                        error = %e,
                        "Asset archiving gave up",
                    );
                    self.tasks.fail_archive_job(job.id, &e.to_string()).await?;
                    summary.failed += 1;
                }
                Err(e) => {
                    let delay = self.policy.backoff(job.attempts);
                    let next_attempt_at = Utc::now()
                        + chrono::Duration::from_std(delay)
                            .unwrap_or_else(|_| chrono::Duration::hours(1));
                    tracing::warn!(
                        task_id = %job.task_id,
                        job_id = job.id,
                        attempts = job.attempts,
                        retry_in_secs = delay.as_secs(),
                        error = %e,
                        "Asset archiving failed, will retry",
                    );
                    self.tasks
                        .retry_archive_job(job.id, &e.to_string(), next_attempt_at)
                        .await?;
                    summary.retried += 1;
                }
            }
        }
        Ok(summary)
    }
}
