/// All database primary keys are PostgreSQL BIGSERIAL.
pub type DbId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Internal generation task identifier (UUIDv7), the only id exposed to callers.
pub type TaskId = uuid::Uuid;

/// Point amounts (balances, prices, ledger deltas).
pub type Points = i64;
