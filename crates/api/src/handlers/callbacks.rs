//! Provider webhooks.
//!
//! The callback URL registered with a provider carries `?token=<secret>`;
//! senders that sign their body put a hex HMAC-SHA256 in `X-Signature`.
//! Webhooks for tasks we do not know are acknowledged so the provider
//! stops retrying.

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use mediagen_core::channels::Channel;
use mediagen_db::models::status::GenerationStatus;
use mediagen_pipeline::ReconcileOutcome;
use mediagen_providers::WebhookAuth;
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

pub const SIGNATURE_HEADER: &str = "x-signature";

#[derive(Debug, Default, Deserialize)]
pub struct CallbackParams {
    pub token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CallbackAck {
    pub outcome: &'static str,
}

impl From<&ReconcileOutcome> for CallbackAck {
    fn from(outcome: &ReconcileOutcome) -> Self {
        let outcome = match outcome {
            ReconcileOutcome::Ignored(_) => "ignored",
            ReconcileOutcome::AlreadyTerminal => "already_terminal",
            ReconcileOutcome::Applied(GenerationStatus::Success) => "succeeded",
            ReconcileOutcome::Applied(_) => "failed",
            ReconcileOutcome::UnknownTask => "unknown_task",
        };
        Self { outcome }
    }
}

/// POST /api/v1/callbacks/{channel}
pub async fn provider_callback(
    State(state): State<AppState>,
    Path(channel): Path<String>,
    Query(params): Query<CallbackParams>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<impl IntoResponse> {
    let channel = Channel::from_name(&channel)?;
    let auth = WebhookAuth {
        token: params.token,
        signature: headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    };

    let outcome = state.service.handle_webhook(channel, &auth, &body).await?;
    tracing::debug!(%channel, outcome = ?outcome, "Webhook processed");

    Ok(Json(DataResponse {
        data: CallbackAck::from(&outcome),
    }))
}
