pub mod callbacks;
pub mod health;
pub mod video;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /ai/video/generations                       generic generate (POST)
/// /ai/video/task/query                        task status (POST)
/// /ai/video/task/list                         task list (POST)
/// /ai/video/generation/models                 model catalog (POST)
///
/// /ai/video/kling/{text2video,image2video,multi-image2video}
/// /ai/video/kling/task/query
/// /ai/video/volcengine/generation
/// /ai/video/volcengine/task/query
/// /ai/video/dashscope/{text2video,image2video,keyframe2video}
/// /ai/video/dashscope/task/query
/// /ai/video/sora2/generation
/// /ai/video/sora2/task/query
///
/// /callbacks/{channel}                        provider webhooks (POST)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/ai/video", video::router())
        .nest("/callbacks", callbacks::router())
}
