use crate::app::state::AppState;
use crate::broadcaster::{Broadcaster, SubscriberQueue};
use axum::extract::{Query, State};
use axum::response::sse::{Event, Sse};
use futures::Stream;
use serde::Deserialize;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::error;

/// Idle time before a keep-alive comment is sent to the client.
const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
pub struct StreamParams {
    pub service: Option<String>,
    pub level: Option<String>,
}

/// Per-connection stream state. Dropping it (client disconnect or stream
/// teardown) unsubscribes the queue.
struct StreamSession {
    queue: Arc<SubscriberQueue>,
    broadcaster: Arc<Broadcaster>,
    service: Option<String>,
    level: Option<String>,
    pace: Duration,
    delivered: bool,
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        self.broadcaster.unsubscribe(&self.queue);
    }
}

/// Handler for GET /v1/logs/stream: Server-Sent Events live tail.
///
/// Emits `log` events with the JSON record as data, a keep-alive comment
/// after 30 s without traffic, and paces delivery to the configured
/// per-subscriber rate. Optional `service` and `level` filters are applied
/// between dequeue and emission.
pub async fn stream_handler(
    State(state): State<AppState>,
    Query(params): Query<StreamParams>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let session = StreamSession {
        queue: state.broadcaster.subscribe(),
        broadcaster: state.broadcaster.clone(),
        service: params.service.filter(|s| !s.is_empty()),
        level: params.level.filter(|s| !s.is_empty()),
        pace: state.settings.sse_pace(),
        delivered: false,
    };

    let stream = futures::stream::unfold(session, |mut session| async move {
        loop {
            // Pace after a delivered event, before consuming the next one.
            if session.delivered {
                tokio::time::sleep(session.pace).await;
                session.delivered = false;
            }

            let next = timeout(KEEPALIVE_INTERVAL, session.queue.recv()).await;
            match next {
                Err(_) => {
                    return Some((
                        Ok::<Event, Infallible>(Event::default().comment("keepalive")),
                        session,
                    ));
                }
                Ok(record) => {
                    if let Some(service) = &session.service {
                        if record.service != *service {
                            continue;
                        }
                    }
                    if let Some(level) = &session.level {
                        if record.level != *level {
                            continue;
                        }
                    }
                    match serde_json::to_string(&record) {
                        Ok(json) => {
                            session.delivered = true;
                            return Some((Ok(Event::default().event("log").data(json)), session));
                        }
                        Err(e) => {
                            error!(error = %e, "failed to serialize log record for SSE");
                        }
                    }
                }
            }
        }
    });

    Sse::new(stream)
}
