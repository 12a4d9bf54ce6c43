//! Periodic retention: a time-based purge every cycle, plus an aggressive
//! second pass when the database file exceeds its size cap.

use crate::config::Settings;
use crate::store::LogStore;
use chrono::{SecondsFormat, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

pub struct RetentionLoop {
    store: Arc<LogStore>,
    retention_days: i64,
    max_db_size_bytes: u64,
    interval: Duration,
    cancel: CancellationToken,
}

impl RetentionLoop {
    #[must_use]
    pub fn new(store: Arc<LogStore>, settings: &Settings, cancel: CancellationToken) -> Self {
        Self {
            store,
            retention_days: settings.log_retention_days,
            max_db_size_bytes: settings.max_db_size_bytes(),
            interval: settings.retention_interval(),
            cancel,
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move { self.run().await })
    }

    pub async fn run(self) {
        info!(
            retention_days = self.retention_days,
            max_db_size_bytes = self.max_db_size_bytes,
            interval_seconds = self.interval.as_secs(),
            "retention loop started"
        );

        loop {
            self.run_cleanup().await;

            tokio::select! {
                () = self.cancel.cancelled() => break,
                () = sleep(self.interval) => {}
            }
        }

        info!("retention loop stopped");
    }

    /// One cleanup cycle. Logs a single summary; never raises.
    async fn run_cleanup(&self) {
        let cutoff = cutoff_iso(self.retention_days);
        let deleted = self.delete_before(&cutoff).await;

        let db_size = self.store.db_size_bytes();
        let mut aggressive_deleted = 0;
        if db_size > self.max_db_size_bytes {
            warn!(
                current_bytes = db_size,
                max_bytes = self.max_db_size_bytes,
                "database over size cap, purging aggressively"
            );
            let aggressive_days = std::cmp::max(1, self.retention_days * 3 / 4);
            aggressive_deleted = self.delete_before(&cutoff_iso(aggressive_days)).await;
        }

        info!(deleted, aggressive_deleted, before = %cutoff, "retention cleanup complete");
    }

    async fn delete_before(&self, cutoff: &str) -> usize {
        let store = self.store.clone();
        let cutoff = cutoff.to_string();
        match tokio::task::spawn_blocking(move || store.delete_before(&cutoff)).await {
            Ok(Ok(deleted)) => deleted,
            Ok(Err(e)) => {
                error!(error = %e, "retention delete failed");
                0
            }
            Err(e) => {
                error!(error = %e, "retention task panicked");
                0
            }
        }
    }
}

fn cutoff_iso(days: i64) -> String {
    (Utc::now() - chrono::Duration::days(days)).to_rfc3339_opts(SecondsFormat::Micros, false)
}
