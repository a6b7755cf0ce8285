//! Volcengine (Seedance) routes, accepting the Ark `content` schema.
//!
//! Generation parameters travel as prompt text commands
//! (`--duration 5 --resolution 720p`) inside the text part.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use mediagen_core::channels::Channel;
use mediagen_providers::volcengine::ACTION_GENERATION;
use mediagen_providers::CanonicalRequest;
use serde::Deserialize;
use serde_json::{json, Map};

use crate::error::{AppError, AppResult};
use crate::handlers::video::{query_scoped, submit};
use crate::handlers::{Caller, TaskQueryRequest};
use crate::state::AppState;

#[derive(Debug, Clone, Deserialize)]
pub struct ImageUrl {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text {
        text: String,
    },
    ImageUrl {
        image_url: ImageUrl,
        #[serde(default)]
        role: Option<String>,
    },
}

#[derive(Debug, Deserialize)]
pub struct VolcengineGenerationRequest {
    #[serde(flatten)]
    pub caller: Caller,
    pub model: String,
    #[serde(default)]
    pub content: Vec<ContentPart>,
    pub return_last_frame: Option<bool>,
}

impl VolcengineGenerationRequest {
    fn into_canonical(self) -> AppResult<(Caller, CanonicalRequest)> {
        let mut request = CanonicalRequest {
            model: self.model,
            action: Some(ACTION_GENERATION.to_string()),
            ..Default::default()
        };

        let mut texts = Vec::new();
        for part in self.content {
            match part {
                ContentPart::Text { text } => texts.push(text),
                ContentPart::ImageUrl { image_url, role } => match role.as_deref() {
                    None | Some("first_frame") if request.image.is_none() => {
                        request.image = Some(image_url.url);
                    }
                    Some("first_frame") => {
                        return Err(AppError::BadRequest(
                            "Only one first_frame image is allowed".into(),
                        ))
                    }
                    Some("last_frame") => request.image_tail = Some(image_url.url),
                    None | Some("reference_image") => request.images.push(image_url.url),
                    Some(other) => {
                        return Err(AppError::BadRequest(format!(
                            "Unsupported image role '{other}'"
                        )))
                    }
                },
            }
        }
        request.prompt = texts.join(" ").trim().to_string();

        let mut metadata = Map::new();
        if let Some(flag) = self.return_last_frame {
            metadata.insert("return_last_frame".into(), json!(flag));
        }
        request.metadata = metadata;

        Ok((self.caller, request))
    }
}

/// POST /api/v1/ai/video/volcengine/generation
pub async fn generation(
    State(state): State<AppState>,
    Json(body): Json<VolcengineGenerationRequest>,
) -> AppResult<impl IntoResponse> {
    let (caller, request) = body.into_canonical()?;
    submit(&state, Some(Channel::Volcengine), &caller, request).await
}

/// POST /api/v1/ai/video/volcengine/task/query
pub async fn query_task(
    State(state): State<AppState>,
    Json(body): Json<TaskQueryRequest>,
) -> AppResult<impl IntoResponse> {
    query_scoped(&state, Some(Channel::Volcengine), body).await
}
