//! Channel-dispatching video routes.
//!
//! - `POST /ai/video/generations`        -- generate, routed by the model's channel
//! - `POST /ai/video/task/query`         -- canonical task status
//! - `POST /ai/video/task/list`          -- paginated task list
//! - `POST /ai/video/generation/models`  -- model catalog

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use mediagen_core::channels::{Channel, MediaType};
use mediagen_pipeline::view::SubmittedTask;
use mediagen_pipeline::TaskView;
use mediagen_providers::CanonicalRequest;
use serde::Deserialize;

use crate::error::AppResult;
use crate::handlers::{Caller, TaskQueryRequest};
use crate::response::DataResponse;
use crate::state::AppState;

/// Generic generate body: identity plus the canonical request fields.
#[derive(Debug, Deserialize)]
pub struct GenerateVideoRequest {
    #[serde(flatten)]
    pub caller: Caller,
    #[serde(flatten)]
    pub request: CanonicalRequest,
}

#[derive(Debug, Deserialize)]
pub struct TaskListRequest {
    #[serde(flatten)]
    pub caller: Caller,
    #[serde(default)]
    pub channel: Option<Channel>,
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub offset: Option<i64>,
}

/// POST /api/v1/ai/video/generations
pub async fn generate(
    State(state): State<AppState>,
    Json(body): Json<GenerateVideoRequest>,
) -> AppResult<impl IntoResponse> {
    submit(&state, None, &body.caller, body.request).await
}

/// POST /api/v1/ai/video/task/query
pub async fn query_task(
    State(state): State<AppState>,
    Json(body): Json<TaskQueryRequest>,
) -> AppResult<impl IntoResponse> {
    query_scoped(&state, None, body).await
}

/// POST /api/v1/ai/video/task/list
pub async fn list_tasks(
    State(state): State<AppState>,
    Json(body): Json<TaskListRequest>,
) -> AppResult<impl IntoResponse> {
    let owner = body.caller.owner()?;
    let page = state
        .service
        .list(&owner, MediaType::Video, body.channel, body.limit, body.offset)
        .await?;
    Ok(Json(DataResponse { data: page }))
}

/// POST /api/v1/ai/video/generation/models
pub async fn list_models(State(state): State<AppState>) -> impl IntoResponse {
    Json(DataResponse {
        data: state.service.models(MediaType::Video),
    })
}

/// Submit a canonical request, optionally scoped to one channel.
pub(crate) async fn submit(
    state: &AppState,
    channel: Option<Channel>,
    caller: &Caller,
    request: CanonicalRequest,
) -> AppResult<Json<DataResponse<SubmittedTask>>> {
    let owner = caller.owner()?;
    let submitted = state.service.generate(&owner, channel, request).await?;
    Ok(Json(DataResponse { data: submitted }))
}

/// Query a task, optionally scoped to one channel.
pub(crate) async fn query_scoped(
    state: &AppState,
    channel: Option<Channel>,
    body: TaskQueryRequest,
) -> AppResult<Json<DataResponse<TaskView>>> {
    let owner = body.caller.owner()?;
    let view = state
        .service
        .query(&owner, MediaType::Video, channel, &body.task_id)
        .await?;
    Ok(Json(DataResponse { data: view }))
}
