use crate::types::Points;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Unknown model, or no pricing rule covers the requested parameters.
    #[error("Invalid model: {0}")]
    InvalidModel(String),

    /// The owner's balance does not cover the price of the request.
    #[error("Insufficient balance: required {required} points")]
    InsufficientBalance { required: Points },

    /// The task does not exist, or exists with another media type, channel or owner.
    #[error("Invalid task id: {0}")]
    InvalidTaskId(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
