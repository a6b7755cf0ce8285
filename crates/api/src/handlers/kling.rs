//! Kling-specific routes, accepting Kling's own request schema.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use mediagen_core::channels::Channel;
use mediagen_providers::kling::{ACTION_IMAGE2VIDEO, ACTION_MULTI_IMAGE2VIDEO, ACTION_TEXT2VIDEO};
use mediagen_providers::CanonicalRequest;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::AppResult;
use crate::handlers::video::{query_scoped, submit};
use crate::handlers::{deserialize_duration, Caller, TaskQueryRequest};
use crate::state::AppState;

#[derive(Debug, Clone, Deserialize)]
pub struct KlingImage {
    pub image: String,
}

/// Kling video body (`model_name`, `image_list`, string durations).
#[derive(Debug, Deserialize)]
pub struct KlingVideoRequest {
    #[serde(flatten)]
    pub caller: Caller,
    #[serde(alias = "model")]
    pub model_name: String,
    #[serde(default)]
    pub prompt: String,
    pub negative_prompt: Option<String>,
    pub image: Option<String>,
    pub image_tail: Option<String>,
    #[serde(default)]
    pub image_list: Vec<KlingImage>,
    pub mode: Option<String>,
    pub aspect_ratio: Option<String>,
    #[serde(default, deserialize_with = "deserialize_duration")]
    pub duration: Option<u32>,
    pub cfg_scale: Option<Value>,
    pub camera_control: Option<Value>,
    pub static_mask: Option<Value>,
    pub dynamic_masks: Option<Value>,
    pub external_task_id: Option<Value>,
}

impl KlingVideoRequest {
    fn into_canonical(self, action: &str) -> (Caller, CanonicalRequest) {
        let mut metadata = Map::new();
        for (key, value) in [
            ("cfg_scale", self.cfg_scale),
            ("camera_control", self.camera_control),
            ("static_mask", self.static_mask),
            ("dynamic_masks", self.dynamic_masks),
            ("external_task_id", self.external_task_id),
        ] {
            if let Some(value) = value {
                metadata.insert(key.to_string(), value);
            }
        }

        let request = CanonicalRequest {
            model: self.model_name,
            prompt: self.prompt,
            negative_prompt: self.negative_prompt,
            image: self.image,
            image_tail: self.image_tail,
            images: self.image_list.into_iter().map(|i| i.image).collect(),
            duration: self.duration,
            aspect_ratio: self.aspect_ratio,
            mode: self.mode,
            action: Some(action.to_string()),
            metadata,
            ..Default::default()
        };
        (self.caller, request)
    }
}

/// POST /api/v1/ai/video/kling/text2video
pub async fn text2video(
    State(state): State<AppState>,
    Json(body): Json<KlingVideoRequest>,
) -> AppResult<impl IntoResponse> {
    let (caller, request) = body.into_canonical(ACTION_TEXT2VIDEO);
    submit(&state, Some(Channel::Kling), &caller, request).await
}

/// POST /api/v1/ai/video/kling/image2video
pub async fn image2video(
    State(state): State<AppState>,
    Json(body): Json<KlingVideoRequest>,
) -> AppResult<impl IntoResponse> {
    let (caller, request) = body.into_canonical(ACTION_IMAGE2VIDEO);
    submit(&state, Some(Channel::Kling), &caller, request).await
}

/// POST /api/v1/ai/video/kling/multi-image2video
pub async fn multi_image2video(
    State(state): State<AppState>,
    Json(body): Json<KlingVideoRequest>,
) -> AppResult<impl IntoResponse> {
    let (caller, request) = body.into_canonical(ACTION_MULTI_IMAGE2VIDEO);
    submit(&state, Some(Channel::Kling), &caller, request).await
}

/// POST /api/v1/ai/video/kling/task/query
pub async fn query_task(
    State(state): State<AppState>,
    Json(body): Json<TaskQueryRequest>,
) -> AppResult<impl IntoResponse> {
    query_scoped(&state, Some(Channel::Kling), body).await
}
