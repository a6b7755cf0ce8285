//! Dashscope (Wanx) routes, accepting the `input` / `parameters` schema.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use mediagen_core::channels::Channel;
use mediagen_providers::dashscope::{ACTION_IMAGE2VIDEO, ACTION_KEYFRAME2VIDEO, ACTION_TEXT2VIDEO};
use mediagen_providers::CanonicalRequest;
use serde::Deserialize;
use serde_json::{json, Map};

use crate::error::AppResult;
use crate::handlers::video::{query_scoped, submit};
use crate::handlers::{deserialize_duration, Caller, TaskQueryRequest};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct DashscopeInput {
    #[serde(default)]
    pub prompt: String,
    pub negative_prompt: Option<String>,
    pub img_url: Option<String>,
    pub first_frame_url: Option<String>,
    pub last_frame_url: Option<String>,
    pub template: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DashscopeParameters {
    pub resolution: Option<String>,
    pub size: Option<String>,
    #[serde(default, deserialize_with = "deserialize_duration")]
    pub duration: Option<u32>,
    pub prompt_extend: Option<bool>,
    pub seed: Option<i64>,
    pub watermark: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct DashscopeVideoRequest {
    #[serde(flatten)]
    pub caller: Caller,
    pub model: String,
    #[serde(default)]
    pub input: DashscopeInput,
    #[serde(default)]
    pub parameters: DashscopeParameters,
}

impl DashscopeVideoRequest {
    fn into_canonical(self, action: &str) -> (Caller, CanonicalRequest) {
        let Self {
            caller,
            model,
            input,
            parameters,
        } = self;

        let mut metadata = Map::new();
        if let Some(template) = input.template {
            metadata.insert("template".into(), json!(template));
        }
        if let Some(extend) = parameters.prompt_extend {
            metadata.insert("prompt_extend".into(), json!(extend));
        }
        if let Some(seed) = parameters.seed {
            metadata.insert("seed".into(), json!(seed));
        }
        if let Some(watermark) = parameters.watermark {
            metadata.insert("watermark".into(), json!(watermark));
        }

        let request = CanonicalRequest {
            model,
            prompt: input.prompt,
            negative_prompt: input.negative_prompt,
            image: input.img_url.or(input.first_frame_url),
            image_tail: input.last_frame_url,
            duration: parameters.duration,
            size: parameters.size,
            resolution: parameters.resolution,
            action: Some(action.to_string()),
            metadata,
            ..Default::default()
        };
        (caller, request)
    }
}

/// POST /api/v1/ai/video/dashscope/text2video
pub async fn text2video(
    State(state): State<AppState>,
    Json(body): Json<DashscopeVideoRequest>,
) -> AppResult<impl IntoResponse> {
    let (caller, request) = body.into_canonical(ACTION_TEXT2VIDEO);
    submit(&state, Some(Channel::Dashscope), &caller, request).await
}

/// POST /api/v1/ai/video/dashscope/image2video
pub async fn image2video(
    State(state): State<AppState>,
    Json(body): Json<DashscopeVideoRequest>,
) -> AppResult<impl IntoResponse> {
    let (caller, request) = body.into_canonical(ACTION_IMAGE2VIDEO);
    submit(&state, Some(Channel::Dashscope), &caller, request).await
}

/// POST /api/v1/ai/video/dashscope/keyframe2video
pub async fn keyframe2video(
    State(state): State<AppState>,
    Json(body): Json<DashscopeVideoRequest>,
) -> AppResult<impl IntoResponse> {
    let (caller, request) = body.into_canonical(ACTION_KEYFRAME2VIDEO);
    submit(&state, Some(Channel::Dashscope), &caller, request).await
}

/// POST /api/v1/ai/video/dashscope/task/query
pub async fn query_task(
    State(state): State<AppState>,
    Json(body): Json<TaskQueryRequest>,
) -> AppResult<impl IntoResponse> {
    query_scoped(&state, Some(Channel::Dashscope), body).await
}
