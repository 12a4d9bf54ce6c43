//! Container log ingestion: discovery, per-container tailers, and the
//! supervisor that keeps one tailer per running container.

pub mod discovery;
pub mod supervisor;
pub mod tailer;

use crate::broadcaster::Broadcaster;
use crate::scrubber::Scrubber;
use crate::store::LogStore;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CollectorError {
    #[error("Docker API error: {0}")]
    Docker(#[from] bollard::errors::Error),
}

/// Shared sinks every tailer routes into: scrub, persist, fan out.
#[derive(Clone)]
pub struct Pipeline {
    pub store: Arc<LogStore>,
    pub broadcaster: Arc<Broadcaster>,
    pub scrubber: Arc<Scrubber>,
}

pub use discovery::ContainerInfo;
pub use supervisor::TailerSupervisor;
