//! Persistence seams of the generation pipeline.
//!
//! [`TaskStore`] owns the task ledger and the archive outbox; [`PointsStore`]
//! owns balances and the points ledger. Both are implemented by
//! [`crate::postgres::PgStore`] and [`crate::memory::MemoryStore`].

use async_trait::async_trait;
use mediagen_core::channels::Channel;
use mediagen_core::types::{DbId, Points, TaskId, Timestamp};
use mediagen_db::models::asset_archive::AssetArchiveJob;
use mediagen_db::models::generation_task::{
    GenerationTask, NewGenerationTask, TaskListQuery, TerminalTransition,
};
use mediagen_db::models::points::LedgerEntry;

use crate::error::StoreError;

#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn insert_task(&self, task: &NewGenerationTask) -> Result<GenerationTask, StoreError>;

    async fn find_task(&self, id: TaskId) -> Result<Option<GenerationTask>, StoreError>;

    async fn find_task_by_provider_id(
        &self,
        channel: Channel,
        provider_task_id: &str,
    ) -> Result<Option<GenerationTask>, StoreError>;

    /// One page of tasks plus the total matching count.
    async fn list_tasks(
        &self,
        query: &TaskListQuery,
    ) -> Result<(Vec<GenerationTask>, i64), StoreError>;

    /// Compare-and-swap a `Generating` task into a terminal status, together
    /// with its refund and archive jobs. `false` when the CAS was lost.
    async fn apply_terminal(
        &self,
        id: TaskId,
        transition: &TerminalTransition,
    ) -> Result<bool, StoreError>;

    async fn archive_jobs_for_task(
        &self,
        task_id: TaskId,
    ) -> Result<Vec<AssetArchiveJob>, StoreError>;

    /// Lease the due pending jobs of one task.
    async fn claim_task_archive_jobs(
        &self,
        task_id: TaskId,
        lease_secs: i64,
    ) -> Result<Vec<AssetArchiveJob>, StoreError>;

    /// Lease up to `limit` due pending jobs across all tasks.
    async fn claim_due_archive_jobs(
        &self,
        limit: i64,
        lease_secs: i64,
    ) -> Result<Vec<AssetArchiveJob>, StoreError>;

    /// Mark a job done and rewrite its URL in the task response.
    async fn complete_archive_job(
        &self,
        job_id: DbId,
        archived_url: &str,
    ) -> Result<bool, StoreError>;

    async fn retry_archive_job(
        &self,
        job_id: DbId,
        error: &str,
        next_attempt_at: Timestamp,
    ) -> Result<(), StoreError>;

    async fn fail_archive_job(&self, job_id: DbId, error: &str) -> Result<(), StoreError>;
}

#[async_trait]
pub trait PointsStore: Send + Sync {
    /// `None` when the owner has no account.
    async fn balance(&self, owner_id: &str) -> Result<Option<Points>, StoreError>;

    /// Conditional debit plus a negative ledger entry. `false` when the
    /// balance does not cover `amount`.
    async fn debit(
        &self,
        owner_id: &str,
        amount: Points,
        task_id: TaskId,
        reason: &str,
        description: &str,
    ) -> Result<bool, StoreError>;

    /// Credit plus a positive ledger entry, idempotent per `(task_id, reason)`.
    async fn credit(
        &self,
        owner_id: &str,
        amount: Points,
        task_id: TaskId,
        reason: &str,
        description: &str,
    ) -> Result<bool, StoreError>;

    async fn ledger_for_task(&self, task_id: TaskId) -> Result<Vec<LedgerEntry>, StoreError>;
}
