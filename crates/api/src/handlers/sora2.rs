//! Sora2 routes.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use mediagen_core::channels::Channel;
use mediagen_providers::sora2::ACTION_GENERATION;
use mediagen_providers::CanonicalRequest;
use serde::Deserialize;
use serde_json::{json, Map};

use crate::error::AppResult;
use crate::handlers::video::{query_scoped, submit};
use crate::handlers::{deserialize_duration, Caller, TaskQueryRequest};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct Sora2GenerationRequest {
    #[serde(flatten)]
    pub caller: Caller,
    pub model: String,
    #[serde(default)]
    pub prompt: String,
    pub image: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default, deserialize_with = "deserialize_duration")]
    pub duration: Option<u32>,
    /// `small` or `large`.
    pub size: Option<String>,
    /// `landscape` or `portrait`.
    pub orientation: Option<String>,
}

impl Sora2GenerationRequest {
    fn into_canonical(self) -> (Caller, CanonicalRequest) {
        let mut metadata = Map::new();
        if let Some(orientation) = self.orientation {
            metadata.insert("orientation".into(), json!(orientation));
        }
        let request = CanonicalRequest {
            model: self.model,
            prompt: self.prompt,
            image: self.image,
            images: self.images,
            duration: self.duration,
            size: self.size,
            action: Some(ACTION_GENERATION.to_string()),
            metadata,
            ..Default::default()
        };
        (self.caller, request)
    }
}

/// POST /api/v1/ai/video/sora2/generation
pub async fn generation(
    State(state): State<AppState>,
    Json(body): Json<Sora2GenerationRequest>,
) -> AppResult<impl IntoResponse> {
    let (caller, request) = body.into_canonical();
    submit(&state, Some(Channel::Sora2), &caller, request).await
}

/// POST /api/v1/ai/video/sora2/task/query
pub async fn query_task(
    State(state): State<AppState>,
    Json(body): Json<TaskQueryRequest>,
) -> AppResult<impl IntoResponse> {
    query_scoped(&state, Some(Channel::Sora2), body).await
}
