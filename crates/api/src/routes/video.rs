use axum::routing::post;
use axum::Router;

use crate::handlers::{dashscope, kling, sora2, video, volcengine};
use crate::state::AppState;

/// Routes nested under `/ai/video`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/generations", post(video::generate))
        .route("/task/query", post(video::query_task))
        .route("/task/list", post(video::list_tasks))
        .route("/generation/models", post(video::list_models))
        .nest("/kling", kling_router())
        .nest("/volcengine", volcengine_router())
        .nest("/dashscope", dashscope_router())
        .nest("/sora2", sora2_router())
}

fn kling_router() -> Router<AppState> {
    Router::new()
        .route("/text2video", post(kling::text2video))
        .route("/image2video", post(kling::image2video))
        .route("/multi-image2video", post(kling::multi_image2video))
        .route("/task/query", post(kling::query_task))
}

fn volcengine_router() -> Router<AppState> {
    Router::new()
        .route("/generation", post(volcengine::generation))
        .route("/task/query", post(volcengine::query_task))
}

fn dashscope_router() -> Router<AppState> {
    Router::new()
        .route("/text2video", post(dashscope::text2video))
        .route("/image2video", post(dashscope::image2video))
        .route("/keyframe2video", post(dashscope::keyframe2video))
        .route("/task/query", post(dashscope::query_task))
}

fn sora2_router() -> Router<AppState> {
    Router::new()
        .route("/generation", post(sora2::generation))
        .route("/task/query", post(sora2::query_task))
}
