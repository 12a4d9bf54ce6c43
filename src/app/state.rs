use crate::broadcaster::Broadcaster;
use crate::config::Settings;
use crate::store::LogStore;
use std::sync::Arc;

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<LogStore>,
    pub broadcaster: Arc<Broadcaster>,
    pub settings: Arc<Settings>,
}

impl AppState {
    #[must_use]
    pub fn new(store: Arc<LogStore>, broadcaster: Arc<Broadcaster>, settings: Settings) -> Self {
        Self {
            store,
            broadcaster,
            settings: Arc::new(settings),
        }
    }
}
