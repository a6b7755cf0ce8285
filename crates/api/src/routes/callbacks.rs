use axum::routing::post;
use axum::Router;

use crate::handlers::callbacks;
use crate::state::AppState;

/// Routes nested under `/callbacks`.
///
/// ```text
/// POST /{channel}    kling | volcengine | dashscope | sora2
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/{channel}", post(callbacks::provider_callback))
}
