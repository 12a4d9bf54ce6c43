pub mod router;
pub mod server;
pub mod state;
pub mod tracing;

use crate::broadcaster::Broadcaster;
use crate::collector::{Pipeline, TailerSupervisor};
use crate::config::Settings;
use crate::error::LogstreamError;
use crate::retention::RetentionLoop;
use crate::scrubber::Scrubber;
use crate::store::LogStore;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Application entry point. Initializes tracing and configuration, opens the
/// store, starts the ingestion and retention tasks, and serves the API.
pub async fn run() -> Result<(), LogstreamError> {
    tracing::init_tracing();

    let settings = Settings::load().map_err(|e| LogstreamError::Config(e.to_string()))?;
    ::tracing::info!(db_path = %settings.db_path.display(), "logstream starting");

    // Database open and configuration validation are the only fatal paths.
    let store = Arc::new(LogStore::open(&settings.db_path)?);
    let broadcaster = Arc::new(Broadcaster::new());
    let scrubber = Arc::new(Scrubber::new(&settings.extra_scrub_patterns));

    // Shared shutdown token: tailers, supervisor, retention, and the server
    // all observe it.
    let shutdown_token = CancellationToken::new();

    let pipeline = Pipeline {
        store: store.clone(),
        broadcaster: broadcaster.clone(),
        scrubber,
    };
    let supervisor_task = TailerSupervisor::new(
        pipeline,
        settings.container_poll_interval(),
        shutdown_token.child_token(),
    )
    .spawn();

    let retention_task =
        RetentionLoop::new(store.clone(), &settings, shutdown_token.child_token()).spawn();

    let http_port = settings.http_port;
    let app_state = state::AppState::new(store, broadcaster, settings);
    let app = router::api_router(app_state);

    let result = server::serve(app, http_port, shutdown_token.clone()).await;

    // Stop background work and let tailers drain residual batches.
    shutdown_token.cancel();
    if let Err(e) = supervisor_task.await {
        ::tracing::error!(error = %e, "supervisor task failed");
    }
    if let Err(e) = retention_task.await {
        ::tracing::error!(error = %e, "retention task failed");
    }

    ::tracing::info!("logstream stopped");
    result
}
