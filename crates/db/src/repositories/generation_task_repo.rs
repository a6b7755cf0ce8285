//! Repository for the `generation_tasks` table.
//!
//! Terminal transitions are guarded by a compare-and-swap on `status_id`;
//! the refund and archive outbox writes join the same transaction.

use mediagen_core::channels::Channel;
use mediagen_core::types::TaskId;
use sqlx::{PgConnection, PgPool};

use crate::models::generation_task::{
    GenerationTask, NewGenerationTask, TaskListQuery, TerminalTransition,
};
use crate::models::status::GenerationStatus;
use crate::repositories::{AssetArchiveRepo, PointsRepo};

/// Column list for `generation_tasks` queries.
const COLUMNS: &str = "\
    id, owner_id, owner_kind, media_type, channel, model, action, \
    provider_task_id, status_id, points_cost, request, response, \
    error_message, started_at, finished_at, duration_ms, \
    created_at, updated_at";

/// Provides persistence for generation tasks.
pub struct GenerationTaskRepo;

impl GenerationTaskRepo {
    /// Insert a task in `Generating` state.
    pub async fn create(
        pool: &PgPool,
        input: &NewGenerationTask,
    ) -> Result<GenerationTask, sqlx::Error> {
        let query = format!(
            "INSERT INTO generation_tasks \
                 (id, owner_id, owner_kind, media_type, channel, model, action, \
                  provider_task_id, status_id, points_cost, request, started_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, GenerationTask>(&query)
            .bind(input.id)
            .bind(&input.owner.id)
            .bind(input.owner.kind.name())
            .bind(input.media_type.name())
            .bind(input.channel.name())
            .bind(&input.model)
            .bind(&input.action)
            .bind(&input.provider_task_id)
            .bind(GenerationStatus::Generating.id())
            .bind(input.points_cost)
            .bind(&input.request)
            .bind(input.started_at)
            .fetch_one(pool)
            .await
    }

    /// Find a task by its internal ID.
    pub async fn find_by_id(
        pool: &PgPool,
        id: TaskId,
    ) -> Result<Option<GenerationTask>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM generation_tasks WHERE id = $1");
        sqlx::query_as::<_, GenerationTask>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find a task by the provider's correlation key.
    pub async fn find_by_provider_task_id(
        pool: &PgPool,
        channel: Channel,
        provider_task_id: &str,
    ) -> Result<Option<GenerationTask>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM generation_tasks \
             WHERE channel = $1 AND provider_task_id = $2"
        );
        sqlx::query_as::<_, GenerationTask>(&query)
            .bind(channel.name())
            .bind(provider_task_id)
            .fetch_optional(pool)
            .await
    }

    /// List an owner's tasks, newest first.
    pub async fn list(
        pool: &PgPool,
        params: &TaskListQuery,
    ) -> Result<Vec<GenerationTask>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM generation_tasks \
             WHERE owner_id = $1 AND owner_kind = $2 AND media_type = $3 \
               AND ($4::TEXT IS NULL OR channel = $4) \
             ORDER BY created_at DESC, id DESC \
             LIMIT $5 OFFSET $6"
        );
        sqlx::query_as::<_, GenerationTask>(&query)
            .bind(&params.owner.id)
            .bind(params.owner.kind.name())
            .bind(params.media_type.name())
            .bind(params.channel.map(Channel::name))
            .bind(params.limit)
            .bind(params.offset)
            .fetch_all(pool)
            .await
    }

    /// Total number of tasks matching the list filters (ignores paging).
    pub async fn count(pool: &PgPool, params: &TaskListQuery) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM generation_tasks \
             WHERE owner_id = $1 AND owner_kind = $2 AND media_type = $3 \
               AND ($4::TEXT IS NULL OR channel = $4)",
        )
        .bind(&params.owner.id)
        .bind(params.owner.kind.name())
        .bind(params.media_type.name())
        .bind(params.channel.map(Channel::name))
        .fetch_one(pool)
        .await?;
        Ok(count)
    }

    /// Move a `Generating` task to a terminal status.
    ///
    /// Returns `false` without writing anything if the task is no longer
    /// `Generating` (another reconciliation won the race).
    pub async fn apply_terminal(
        pool: &PgPool,
        id: TaskId,
        transition: &TerminalTransition,
    ) -> Result<bool, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let result = sqlx::query(
            "UPDATE generation_tasks \
             SET status_id = $2, response = $3, error_message = $4, \
                 finished_at = $5, duration_ms = $6, updated_at = NOW() \
             WHERE id = $1 AND status_id = $7",
        )
        .bind(id)
        .bind(transition.status.id())
        .bind(&transition.response)
        .bind(&transition.error_message)
        .bind(transition.finished_at)
        .bind(transition.duration_ms)
        .bind(GenerationStatus::Generating.id())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        if let Some(refund) = &transition.refund {
            PointsRepo::credit(
                &mut tx,
                &refund.owner_id,
                refund.amount,
                Some(id),
                refund.reason,
                Some(&refund.description),
            )
            .await?;
        }

        for job in &transition.archive_jobs {
            AssetArchiveRepo::enqueue(&mut tx, id, job).await?;
        }

        tx.commit().await?;
        Ok(true)
    }

    /// Replace the string at `path` inside a task's response snapshot.
    pub async fn set_response_value(
        conn: &mut PgConnection,
        id: TaskId,
        path: &[String],
        value: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE generation_tasks \
             SET response = jsonb_set(response, $2, to_jsonb($3::TEXT), false), \
                 updated_at = NOW() \
             WHERE id = $1 AND response IS NOT NULL",
        )
        .bind(id)
        .bind(path)
        .bind(value)
        .execute(conn)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
