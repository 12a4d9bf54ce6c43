use super::state::AppState;
use crate::handler::auth::require_admin_key;
use crate::handler::health::health_handler;
use crate::handler::logs::{context_handler, search_handler, services_handler};
use crate::handler::stream::stream_handler;
use axum::Router;
use axum::middleware;
use axum::routing::get;

/// Build the HTTP router: an open health endpoint plus the admin-keyed
/// query and live-tail surface.
pub fn api_router(state: AppState) -> Router {
    let health_router = Router::new()
        .route("/health", get(health_handler))
        .with_state(state.clone());

    let v1_logs_router = Router::new()
        .route("/v1/logs/search", get(search_handler))
        .route("/v1/logs/{id}/context", get(context_handler))
        .route("/v1/logs/services", get(services_handler))
        .route("/v1/logs/stream", get(stream_handler))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_admin_key,
        ))
        .with_state(state);

    Router::new().merge(health_router).merge(v1_logs_router)
}
