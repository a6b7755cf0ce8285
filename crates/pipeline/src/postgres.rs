//! Postgres-backed stores, delegating to the `mediagen-db` repositories.

use async_trait::async_trait;
use mediagen_core::channels::Channel;
use mediagen_core::types::{DbId, Points, TaskId, Timestamp};
use mediagen_db::models::asset_archive::AssetArchiveJob;
use mediagen_db::models::generation_task::{
    GenerationTask, NewGenerationTask, TaskListQuery, TerminalTransition,
};
use mediagen_db::models::points::LedgerEntry;
use mediagen_db::repositories::{AssetArchiveRepo, GenerationTaskRepo, PointsRepo};
use mediagen_db::DbPool;

use crate::error::StoreError;
use crate::store::{PointsStore, TaskStore};

#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl TaskStore for PgStore {
    async fn insert_task(&self, task: &NewGenerationTask) -> Result<GenerationTask, StoreError> {
        Ok(GenerationTaskRepo::create(&self.pool, task).await?)
    }

    async fn find_task(&self, id: TaskId) -> Result<Option<GenerationTask>, StoreError> {
        Ok(GenerationTaskRepo::find_by_id(&self.pool, id).await?)
    }

    async fn find_task_by_provider_id(
        &self,
        channel: Channel,
        provider_task_id: &str,
    ) -> Result<Option<GenerationTask>, StoreError> {
        Ok(GenerationTaskRepo::find_by_provider_task_id(&self.pool, channel, provider_task_id).await?)
    }

    async fn list_tasks(
        &self,
        query: &TaskListQuery,
    ) -> Result<(Vec<GenerationTask>, i64), StoreError> {
        let items = GenerationTaskRepo::list(&self.pool, query).await?;
        let total = GenerationTaskRepo::count(&self.pool, query).await?;
        Ok((items, total))
    }

    async fn apply_terminal(
        &self,
        id: TaskId,
        transition: &TerminalTransition,
    ) -> Result<bool, StoreError> {
        Ok(GenerationTaskRepo::apply_terminal(&self.pool, id, transition).await?)
    }

    async fn archive_jobs_for_task(
        &self,
        task_id: TaskId,
    ) -> Result<Vec<AssetArchiveJob>, StoreError> {
        Ok(AssetArchiveRepo::list_for_task(&self.pool, task_id).await?)
    }

    async fn claim_task_archive_jobs(
        &self,
        task_id: TaskId,
        lease_secs: i64,
    ) -> Result<Vec<AssetArchiveJob>, StoreError> {
        Ok(AssetArchiveRepo::claim_for_task(&self.pool, task_id, lease_secs).await?)
    }

    async fn claim_due_archive_jobs(
        &self,
        limit: i64,
        lease_secs: i64,
    ) -> Result<Vec<AssetArchiveJob>, StoreError> {
        Ok(AssetArchiveRepo::claim_due(&self.pool, limit, lease_secs).await?)
    }

    async fn complete_archive_job(
        &self,
        job_id: DbId,
        archived_url: &str,
    ) -> Result<bool, StoreError> {
        Ok(AssetArchiveRepo::mark_done(&self.pool, job_id, archived_url).await?)
    }

    async fn retry_archive_job(
        &self,
        job_id: DbId,
        error: &str,
        next_attempt_at: Timestamp,
    ) -> Result<(), StoreError> {
        Ok(AssetArchiveRepo::mark_retry(&self.pool, job_id, error, next_attempt_at).await?)
    }

    async fn fail_archive_job(&self, job_id: DbId, error: &str) -> Result<(), StoreError> {
        Ok(AssetArchiveRepo::mark_failed(&self.pool, job_id, error).await?)
    }
}

#[async_trait]
impl PointsStore for PgStore {
    async fn balance(&self, owner_id: &str) -> Result<Option<Points>, StoreError> {
        Ok(PointsRepo::balance(&self.pool, owner_id).await?)
    }

    async fn debit(
        &self,
        owner_id: &str,
        amount: Points,
        task_id: TaskId,
        reason: &str,
        description: &str,
    ) -> Result<bool, StoreError> {
        Ok(PointsRepo::debit(
            &self.pool,
            owner_id,
            amount,
            Some(task_id),
            reason,
            Some(description),
        )
        .await?)
    }

    async fn credit(
        &self,
        owner_id: &str,
        amount: Points,
        task_id: TaskId,
        reason: &str,
        description: &str,
    ) -> Result<bool, StoreError> {
        Ok(PointsRepo::refund(
            &self.pool,
            owner_id,
            amount,
            task_id,
            reason,
            Some(description),
        )
        .await?)
    }

    async fn ledger_for_task(&self, task_id: TaskId) -> Result<Vec<LedgerEntry>, StoreError> {
        Ok(PointsRepo::ledger_for_task(&self.pool, task_id).await?)
    }
}
