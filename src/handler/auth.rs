use crate::app::state::AppState;
use crate::error::ApiError;
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

pub const ADMIN_KEY_HEADER: &str = "x-admin-key";

/// Validate the X-Admin-Key header against the configured secret.
/// An empty configured key means open access (development mode).
pub async fn require_admin_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let configured = &state.settings.admin_key;
    if configured.is_empty() {
        return Ok(next.run(request).await);
    }

    let provided = request
        .headers()
        .get(ADMIN_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");

    if provided != configured {
        return Err(ApiError::unauthorized("Invalid admin key"));
    }

    Ok(next.run(request).await)
}
