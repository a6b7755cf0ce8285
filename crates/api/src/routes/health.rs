use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub db_healthy: bool,
    /// Channels with a configured provider adapter.
    pub channels: Vec<String>,
}

/// GET /health -- service, database and provider health.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    // In-memory stores have no database to check.
    let db_healthy = match &state.pool {
        Some(pool) => mediagen_db::health_check(pool).await.is_ok(),
        None => true,
    };

    let status = if db_healthy { "ok" } else { "degraded" };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        db_healthy,
        channels: state
            .service
            .channels()
            .iter()
            .map(|c| c.name().to_string())
            .collect(),
    })
}

/// Mount health check routes (root level, not under `/api/v1`).
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
