use std::sync::Arc;

use mediagen_db::DbPool;
use mediagen_pipeline::GenerationService;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable: everything inside is behind an `Arc` or already `Clone`.
#[derive(Clone)]
pub struct AppState {
    pub service: GenerationService,
    pub config: Arc<ServerConfig>,
    /// Database pool for health checks; `None` when running on in-memory stores.
    pub pool: Option<DbPool>,
}
