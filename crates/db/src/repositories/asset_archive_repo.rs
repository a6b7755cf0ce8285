//! Repository for the `asset_archive_jobs` outbox.
//!
//! Claiming pushes `next_attempt_at` forward by a lease and bumps
//! `attempts`, so a job is never worked on by two archivers at once.

use mediagen_core::types::{DbId, TaskId, Timestamp};
use sqlx::{PgConnection, PgPool};

use crate::models::asset_archive::{pointer_path, AssetArchiveJob, NewAssetArchiveJob};
use crate::models::status::ArchiveJobStatus;
use crate::repositories::GenerationTaskRepo;

/// Column list for `asset_archive_jobs` queries.
const COLUMNS: &str = "\
    id, task_id, asset_index, pointer, source_url, object_key, status_id, \
    attempts, next_attempt_at, last_error, archived_url, created_at, updated_at";

/// Provides outbox operations for asset archiving.
pub struct AssetArchiveRepo;

impl AssetArchiveRepo {
    /// Enqueue a job within an enclosing transaction (idempotent per pointer).
    pub async fn enqueue(
        conn: &mut PgConnection,
        task_id: TaskId,
        job: &NewAssetArchiveJob,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO asset_archive_jobs \
                 (task_id, asset_index, pointer, source_url, object_key, status_id) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (task_id, pointer) DO NOTHING",
        )
        .bind(task_id)
        .bind(job.asset_index)
        .bind(&job.pointer)
        .bind(&job.source_url)
        .bind(&job.object_key)
        .bind(ArchiveJobStatus::Pending.id())
        .execute(conn)
        .await?;
        Ok(())
    }

    /// All jobs of a task, by asset index.
    pub async fn list_for_task(
        pool: &PgPool,
        task_id: TaskId,
    ) -> Result<Vec<AssetArchiveJob>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM asset_archive_jobs WHERE task_id = $1 ORDER BY asset_index"
        );
        sqlx::query_as::<_, AssetArchiveJob>(&query)
            .bind(task_id)
            .fetch_all(pool)
            .await
    }

    /// Claim up to `limit` pending jobs whose retry time has come.
    pub async fn claim_due(
        pool: &PgPool,
        limit: i64,
        lease_secs: i64,
    ) -> Result<Vec<AssetArchiveJob>, sqlx::Error> {
        let query = format!(
            "UPDATE asset_archive_jobs \
             SET attempts = attempts + 1, \
                 next_attempt_at = NOW() + make_interval(secs => $2::DOUBLE PRECISION), \
                 updated_at = NOW() \
             WHERE id IN ( \
                 SELECT id FROM asset_archive_jobs \
                 WHERE status_id = $3 AND next_attempt_at <= NOW() \
                 ORDER BY next_attempt_at \
                 LIMIT $1 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, AssetArchiveJob>(&query)
            .bind(limit)
            .bind(lease_secs as f64)
            .bind(ArchiveJobStatus::Pending.id())
            .fetch_all(pool)
            .await
    }

    /// Claim the pending jobs of one task, regardless of their retry time.
    pub async fn claim_for_task(
        pool: &PgPool,
        task_id: TaskId,
        lease_secs: i64,
    ) -> Result<Vec<AssetArchiveJob>, sqlx::Error> {
        let query = format!(
            "UPDATE asset_archive_jobs \
             SET attempts = attempts + 1, \
                 next_attempt_at = NOW() + make_interval(secs => $2::DOUBLE PRECISION), \
                 updated_at = NOW() \
             WHERE id IN ( \
                 SELECT id FROM asset_archive_jobs \
                 WHERE task_id = $1 AND status_id = $3 AND next_attempt_at <= NOW() \
                 FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, AssetArchiveJob>(&query)
            .bind(task_id)
            .bind(lease_secs as f64)
            .bind(ArchiveJobStatus::Pending.id())
            .fetch_all(pool)
            .await
    }

    /// Mark a job done and rewrite its URL inside the task's response.
    ///
    /// Returns `false` if the job was not pending.
    pub async fn mark_done(
        pool: &PgPool,
        job_id: DbId,
        archived_url: &str,
    ) -> Result<bool, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let row: Option<(TaskId, String)> = sqlx::query_as(
            "UPDATE asset_archive_jobs \
             SET status_id = $2, archived_url = $3, last_error = NULL, updated_at = NOW() \
             WHERE id = $1 AND status_id = $4 \
             RETURNING task_id, pointer",
        )
        .bind(job_id)
        .bind(ArchiveJobStatus::Done.id())
        .bind(archived_url)
        .bind(ArchiveJobStatus::Pending.id())
        .fetch_optional(&mut *tx)
        .await?;

        let Some((task_id, pointer)) = row else {
            tx.rollback().await?;
            return Ok(false);
        };

        GenerationTaskRepo::set_response_value(
            &mut tx,
            task_id,
            &pointer_path(&pointer),
            archived_url,
        )
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    /// Record a failed attempt and schedule the next one.
    pub async fn mark_retry(
        pool: &PgPool,
        job_id: DbId,
        error: &str,
        next_attempt_at: Timestamp,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE asset_archive_jobs \
             SET last_error = $2, next_attempt_at = $3, updated_at = NOW() \
             WHERE id = $1 AND status_id = $4",
        )
        .bind(job_id)
        .bind(error)
        .bind(next_attempt_at)
        .bind(ArchiveJobStatus::Pending.id())
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Give up on a job after its retry budget is spent.
    pub async fn mark_failed(pool: &PgPool, job_id: DbId, error: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE asset_archive_jobs \
             SET status_id = $2, last_error = $3, updated_at = NOW() \
             WHERE id = $1 AND status_id = $4",
        )
        .bind(job_id)
        .bind(ArchiveJobStatus::Failed.id())
        .bind(error)
        .bind(ArchiveJobStatus::Pending.id())
        .execute(pool)
        .await?;
        Ok(())
    }
}
