use mediagen_core::channels::Channel;
use mediagen_core::error::CoreError;
use mediagen_core::storage::StorageError;
use mediagen_providers::ProviderError;

/// Failures of the persistence layer behind the store traits.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A uniqueness constraint was violated.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A stored row could not be interpreted.
    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

impl From<CoreError> for StoreError {
    fn from(err: CoreError) -> Self {
        Self::Corrupt(err.to_string())
    }
}

/// Errors surfaced by the generation flows.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The provider refused or failed task creation after points were
    /// reserved. The reservation has already been compensated.
    #[error("{channel} task creation failed: {source}")]
    ProviderCreateFailure {
        channel: Channel,
        #[source]
        source: ProviderError,
    },

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}
