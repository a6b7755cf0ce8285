//! Repository for `points_accounts` and `points_ledger`.
//!
//! Balances are only ever changed together with a ledger row, inside one
//! transaction. Debits are conditional updates, never read-then-write.

use mediagen_core::types::{Points, TaskId};
use sqlx::{PgConnection, PgPool};

use crate::models::points::LedgerEntry;

/// Column list for `points_ledger` queries.
const LEDGER_COLUMNS: &str = "id, owner_id, task_id, amount, reason, description, created_at";

/// Provides balance and ledger operations.
pub struct PointsRepo;

impl PointsRepo {
    /// Current balance, or `None` if the owner has no account.
    pub async fn balance(pool: &PgPool, owner_id: &str) -> Result<Option<Points>, sqlx::Error> {
        let row: Option<(Points,)> =
            sqlx::query_as("SELECT balance FROM points_accounts WHERE owner_id = $1")
                .bind(owner_id)
                .fetch_optional(pool)
                .await?;
        Ok(row.map(|(balance,)| balance))
    }

    /// Add points to an account outside of any task (top-ups, seeding).
    pub async fn deposit(
        pool: &PgPool,
        owner_id: &str,
        amount: Points,
    ) -> Result<Points, sqlx::Error> {
        let (balance,): (Points,) = sqlx::query_as(
            "INSERT INTO points_accounts (owner_id, balance) VALUES ($1, $2) \
             ON CONFLICT (owner_id) DO UPDATE \
             SET balance = points_accounts.balance + EXCLUDED.balance, updated_at = NOW() \
             RETURNING balance",
        )
        .bind(owner_id)
        .bind(amount)
        .fetch_one(pool)
        .await?;
        Ok(balance)
    }

    /// Atomically debit `amount` if the balance covers it.
    ///
    /// Returns `false` (and writes nothing) when the balance is too low or
    /// the account does not exist.
    pub async fn debit(
        pool: &PgPool,
        owner_id: &str,
        amount: Points,
        task_id: Option<TaskId>,
        reason: &str,
        description: Option<&str>,
    ) -> Result<bool, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let result = sqlx::query(
            "UPDATE points_accounts \
             SET balance = balance - $2, updated_at = NOW() \
             WHERE owner_id = $1 AND balance >= $2",
        )
        .bind(owner_id)
        .bind(amount)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(
            "INSERT INTO points_ledger (owner_id, task_id, amount, reason, description) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(owner_id)
        .bind(task_id)
        .bind(-amount)
        .bind(reason)
        .bind(description)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    /// Credit points back in its own transaction. See [`Self::credit`].
    pub async fn refund(
        pool: &PgPool,
        owner_id: &str,
        amount: Points,
        task_id: TaskId,
        reason: &str,
        description: Option<&str>,
    ) -> Result<bool, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let credited =
            Self::credit(&mut tx, owner_id, amount, Some(task_id), reason, description).await?;
        tx.commit().await?;
        Ok(credited)
    }

    /// Credit points within an enclosing transaction.
    ///
    /// Idempotent per task: a task holds at most one credit, so a second
    /// one (refund after compensation, or a repeated refund) is a no-op
    /// returning `false`.
    pub async fn credit(
        conn: &mut PgConnection,
        owner_id: &str,
        amount: Points,
        task_id: Option<TaskId>,
        reason: &str,
        description: Option<&str>,
    ) -> Result<bool, sqlx::Error> {
        let inserted: Option<(i64,)> = sqlx::query_as(
            "INSERT INTO points_ledger (owner_id, task_id, amount, reason, description) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT DO NOTHING \
             RETURNING id",
        )
        .bind(owner_id)
        .bind(task_id)
        .bind(amount)
        .bind(reason)
        .bind(description)
        .fetch_optional(&mut *conn)
        .await?;

        if inserted.is_none() {
            return Ok(false);
        }

        sqlx::query(
            "INSERT INTO points_accounts (owner_id, balance) VALUES ($1, $2) \
             ON CONFLICT (owner_id) DO UPDATE \
             SET balance = points_accounts.balance + EXCLUDED.balance, updated_at = NOW()",
        )
        .bind(owner_id)
        .bind(amount)
        .execute(&mut *conn)
        .await?;

        Ok(true)
    }

    /// All ledger entries referencing a task, oldest first.
    pub async fn ledger_for_task(
        pool: &PgPool,
        task_id: TaskId,
    ) -> Result<Vec<LedgerEntry>, sqlx::Error> {
        let query = format!(
            "SELECT {LEDGER_COLUMNS} FROM points_ledger WHERE task_id = $1 ORDER BY id"
        );
        sqlx::query_as::<_, LedgerEntry>(&query)
            .bind(task_id)
            .fetch_all(pool)
            .await
    }
}
