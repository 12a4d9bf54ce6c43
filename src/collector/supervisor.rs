use super::{CollectorError, Pipeline, discovery, tailer};
use bollard::Docker;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

struct TailerHandle {
    service: String,
    task: JoinHandle<()>,
}

/// Polls the container inventory and keeps one tailer task per running
/// container. Containers that disappear have their handles dropped; the
/// tailer notices the stream end on its own. A tailer that died while its
/// container is still running is restarted on the next poll.
pub struct TailerSupervisor {
    pipeline: Pipeline,
    poll_interval: Duration,
    cancel: CancellationToken,
}

impl TailerSupervisor {
    #[must_use]
    pub fn new(pipeline: Pipeline, poll_interval: Duration, cancel: CancellationToken) -> Self {
        Self {
            pipeline,
            poll_interval,
            cancel,
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move { self.run().await })
    }

    pub async fn run(self) {
        let hostname = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_default();

        let mut docker: Option<Docker> = None;
        let mut active: HashMap<String, TailerHandle> = HashMap::new();

        info!(poll_interval_seconds = self.poll_interval.as_secs(), "tailer supervisor started");

        loop {
            if docker.is_none() {
                match Docker::connect_with_unix_defaults() {
                    Ok(client) => docker = Some(client),
                    Err(e) => error!(error = %e, "container runtime unavailable, will retry"),
                }
            }

            if let Some(client) = docker.clone() {
                if let Err(e) = self.poll_once(&client, &hostname, &mut active).await {
                    error!(error = %e, "container poll failed");
                    docker = None;
                }
            }

            tokio::select! {
                () = self.cancel.cancelled() => break,
                () = sleep(self.poll_interval) => {}
            }
        }

        // Tailers observe the shared cancellation token; wait for them to
        // drain their residual batches.
        for (_, handle) in active {
            if let Err(e) = handle.task.await {
                error!(service = %handle.service, error = %e, "tailer task failed");
            }
        }
        info!("tailer supervisor stopped");
    }

    async fn poll_once(
        &self,
        docker: &Docker,
        hostname: &str,
        active: &mut HashMap<String, TailerHandle>,
    ) -> Result<(), CollectorError> {
        let containers = discovery::list_running(docker).await?;
        let current: HashSet<String> = containers.iter().map(|c| c.id.clone()).collect();

        for container in containers {
            if container.is_host_process(hostname) {
                debug!(container_id = %container.short_id(), "skipping own container");
                continue;
            }
            if let Some(handle) = active.get(&container.id) {
                if !handle.task.is_finished() {
                    continue;
                }
            }

            // Start from now, deliberately dropping backlog: a supervisor
            // restart must not re-ingest history.
            let since = Utc::now().timestamp();
            let service = container.service.clone();
            info!(service = %service, container_id = %container.short_id(), "starting tailer");

            let id = container.id.clone();
            let task = tokio::spawn(tailer::tail_container(
                docker.clone(),
                container,
                self.pipeline.clone(),
                since,
                self.cancel.child_token(),
            ));
            active.insert(id, TailerHandle { service, task });
        }

        active.retain(|id, handle| {
            if current.contains(id) {
                true
            } else {
                info!(
                    service = %handle.service,
                    container_id = %&id[..id.len().min(12)],
                    "container removed, dropping tailer handle"
                );
                false
            }
        });

        Ok(())
    }
}
