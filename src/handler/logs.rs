use crate::app::state::AppState;
use crate::domain::LogRecord;
use crate::error::ApiError;
use crate::store::SearchQuery;
use axum::Json;
use axum::extract::{Path, Query, State};
use serde::{Deserialize, Serialize};
use tracing::error;

const MAX_LIMIT: u32 = 1000;
const MAX_CONTEXT_LINES: u32 = 200;

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
    pub service: Option<String>,
    pub level: Option<String>,
    #[serde(rename = "from")]
    pub from_ts: Option<String>,
    #[serde(rename = "to")]
    pub to_ts: Option<String>,
    pub trace_id: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

fn default_limit() -> u32 {
    100
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub entries: Vec<LogRecord>,
    pub count: usize,
    pub limit: u32,
    pub offset: u32,
}

/// Handler for GET /v1/logs/search.
pub async fn search_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, ApiError> {
    if !(1..=MAX_LIMIT).contains(&params.limit) {
        return Err(ApiError::bad_request(format!(
            "limit must be between 1 and {MAX_LIMIT}"
        )));
    }

    let query = SearchQuery {
        q: params.q,
        service: params.service,
        level: params.level,
        from_ts: params.from_ts,
        to_ts: params.to_ts,
        trace_id: params.trace_id,
        limit: params.limit,
        offset: params.offset,
    };

    let store = state.store.clone();
    let entries = tokio::task::spawn_blocking(move || store.search(&query))
        .await
        .map_err(|e| {
            error!(error = %e, "search task panicked");
            ApiError::internal("search failed")
        })?
        .map_err(|e| {
            error!(error = %e, "search query failed");
            ApiError::internal("search failed")
        })?;

    Ok(Json(SearchResponse {
        count: entries.len(),
        entries,
        limit: params.limit,
        offset: params.offset,
    }))
}

#[derive(Debug, Deserialize)]
pub struct ContextParams {
    #[serde(default = "default_lines")]
    pub lines: u32,
}

fn default_lines() -> u32 {
    20
}

#[derive(Debug, Serialize)]
pub struct ContextResponse {
    pub entries: Vec<LogRecord>,
    pub target_id: i64,
}

/// Handler for GET /v1/logs/{id}/context.
pub async fn context_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(params): Query<ContextParams>,
) -> Result<Json<ContextResponse>, ApiError> {
    if !(1..=MAX_CONTEXT_LINES).contains(&params.lines) {
        return Err(ApiError::bad_request(format!(
            "lines must be between 1 and {MAX_CONTEXT_LINES}"
        )));
    }

    let store = state.store.clone();
    let lines = params.lines;
    let entries = tokio::task::spawn_blocking(move || store.context(id, lines))
        .await
        .map_err(|e| {
            error!(error = %e, "context task panicked");
            ApiError::internal("context lookup failed")
        })?
        .map_err(|e| {
            error!(error = %e, "context query failed");
            ApiError::internal("context lookup failed")
        })?;

    if entries.is_empty() {
        return Err(ApiError::not_found("Log entry not found"));
    }

    Ok(Json(ContextResponse {
        entries,
        target_id: id,
    }))
}

#[derive(Debug, Serialize)]
pub struct ServicesResponse {
    pub services: Vec<String>,
}

/// Handler for GET /v1/logs/services.
pub async fn services_handler(
    State(state): State<AppState>,
) -> Result<Json<ServicesResponse>, ApiError> {
    let store = state.store.clone();
    let services = tokio::task::spawn_blocking(move || store.services())
        .await
        .map_err(|e| {
            error!(error = %e, "services task panicked");
            ApiError::internal("services lookup failed")
        })?
        .map_err(|e| {
            error!(error = %e, "services query failed");
            ApiError::internal("services lookup failed")
        })?;

    Ok(Json(ServicesResponse { services }))
}
