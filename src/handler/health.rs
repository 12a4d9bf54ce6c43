use crate::app::state::AppState;
use axum::Json;
use axum::extract::State;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub db_size_bytes: u64,
    pub db_size_mb: f64,
    pub max_db_size_mb: u64,
    pub retention_days: i64,
}

/// Handler for GET /health (no auth required).
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let db_size_bytes = state.store.db_size_bytes();
    #[allow(clippy::cast_precision_loss)]
    let db_size_mb = (db_size_bytes as f64 / (1024.0 * 1024.0) * 100.0).round() / 100.0;

    Json(HealthResponse {
        status: "healthy",
        db_size_bytes,
        db_size_mb,
        max_db_size_mb: state.settings.max_db_size_mb,
        retention_days: state.settings.log_retention_days,
    })
}
