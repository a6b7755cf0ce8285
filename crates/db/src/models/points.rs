//! Points accounts and the append-only points ledger.

use mediagen_core::types::{DbId, Points, TaskId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// Debit recorded when a generation task is submitted.
pub const REASON_GENERATION_CHARGE: &str = "generation_charge";

/// Credit recorded when a charged task ends in failure.
pub const REASON_GENERATION_REFUND: &str = "generation_refund";

/// Credit recorded when the provider never accepted the task.
pub const REASON_CREATE_FAILURE_COMPENSATION: &str = "create_failure_compensation";

/// A row from the `points_accounts` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PointsAccount {
    pub owner_id: String,
    pub balance: Points,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A row from the `points_ledger` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct LedgerEntry {
    pub id: DbId,
    pub owner_id: String,
    pub task_id: Option<TaskId>,
    /// Signed: negative for charges, positive for refunds.
    pub amount: Points,
    pub reason: String,
    pub description: Option<String>,
    pub created_at: Timestamp,
}
