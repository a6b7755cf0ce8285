use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use mediagen_core::error::CoreError;
use mediagen_pipeline::{GenerationError, StoreError};
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] and [`GenerationError`] and adds HTTP-specific
/// variants. Implements [`IntoResponse`] to produce `{ "error", "code" }`
/// JSON bodies.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Core(core) => classify_core_error(core),
            AppError::Generation(err) => classify_generation_error(err),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                internal()
            }
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

fn internal() -> (StatusCode, &'static str, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal error occurred".to_string(),
    )
}

fn classify_core_error(err: &CoreError) -> (StatusCode, &'static str, String) {
    match err {
        CoreError::NotFound { entity, id } => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("{entity} with id {id} not found"),
        ),
        CoreError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
        CoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
        CoreError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone()),
        CoreError::InvalidModel(msg) => (StatusCode::BAD_REQUEST, "INVALID_MODEL", msg.clone()),
        CoreError::InsufficientBalance { .. } => (
            StatusCode::PAYMENT_REQUIRED,
            "INSUFFICIENT_BALANCE",
            err.to_string(),
        ),
        CoreError::InvalidTaskId(id) => (
            StatusCode::NOT_FOUND,
            "INVALID_TASK_ID",
            format!("Task {id} not found"),
        ),
        CoreError::Internal(msg) => {
            tracing::error!(error = %msg, "Internal core error");
            internal()
        }
    }
}

fn classify_generation_error(err: &GenerationError) -> (StatusCode, &'static str, String) {
    match err {
        GenerationError::Core(core) => classify_core_error(core),
        GenerationError::ProviderCreateFailure { channel, source } => {
            tracing::warn!(%channel, error = %source, "Provider task creation failed");
            (
                StatusCode::BAD_GATEWAY,
                "PROVIDER_CREATE_FAILURE",
                err.to_string(),
            )
        }
        GenerationError::Provider(source) => {
            tracing::warn!(error = %source, "Provider error");
            (StatusCode::BAD_GATEWAY, "PROVIDER_ERROR", source.to_string())
        }
        GenerationError::Store(StoreError::Conflict(msg)) => {
            (StatusCode::CONFLICT, "CONFLICT", msg.clone())
        }
        GenerationError::Store(store) => {
            tracing::error!(error = %store, "Store error");
            internal()
        }
        GenerationError::Storage(storage) => {
            tracing::error!(error = %storage, "Object storage error");
            internal()
        }
    }
}
