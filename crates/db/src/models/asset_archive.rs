//! Asset archive outbox rows.

use mediagen_core::types::{DbId, TaskId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

use super::status::StatusId;

/// A row from the `asset_archive_jobs` table.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct AssetArchiveJob {
    pub id: DbId,
    pub task_id: TaskId,
    pub asset_index: i32,
    /// JSON pointer of the URL inside the task's response snapshot.
    pub pointer: String,
    pub source_url: String,
    pub object_key: String,
    pub status_id: StatusId,
    pub attempts: i32,
    pub next_attempt_at: Timestamp,
    pub last_error: Option<String>,
    pub archived_url: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Insert DTO, enqueued together with a task's success transition.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAssetArchiveJob {
    pub asset_index: i32,
    pub pointer: String,
    pub source_url: String,
    pub object_key: String,
}

/// Split a JSON pointer (`/a/0/b`) into the path array `jsonb_set` expects.
///
/// Handles the `~1` / `~0` escapes of RFC 6901.
pub fn pointer_path(pointer: &str) -> Vec<String> {
    pointer
        .split('/')
        .skip(1)
        .map(|segment| segment.replace("~1", "/").replace("~0", "~"))
        .collect()
}
