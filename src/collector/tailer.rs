use super::Pipeline;
use super::discovery::ContainerInfo;
use crate::domain::LogEntry;
use crate::normalizer;
use crate::scrubber::Scrubber;
use bollard::Docker;
use bollard::container::LogsOptions;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Entries buffered per tailer before an atomic insert + publish.
pub const BATCH_SIZE: usize = 50;

/// Tail one container's log stream until EOF, stream error, or shutdown.
///
/// Every line is normalized, scrubbed, and batched; a full batch is inserted
/// into the store in one transaction and then published to live
/// subscribers. The residual batch is flushed on exit.
pub async fn tail_container(
    docker: Docker,
    container: ContainerInfo,
    pipeline: Pipeline,
    since: i64,
    cancel: CancellationToken,
) {
    let service = container.service.clone();
    info!(service = %service, container_id = %container.short_id(), "tailing container");

    let options = LogsOptions::<String> {
        follow: true,
        stdout: true,
        stderr: true,
        timestamps: true,
        since,
        tail: "all".to_string(),
        ..Default::default()
    };
    let mut stream = docker.logs(&container.id, Some(options));

    let mut batch: Vec<LogEntry> = Vec::with_capacity(BATCH_SIZE);

    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                debug!(service = %service, "tailer cancelled");
                break;
            }
            chunk = stream.next() => {
                match chunk {
                    Some(Ok(output)) => {
                        let bytes = output.into_bytes();
                        let text = String::from_utf8_lossy(&bytes);
                        for line in text.lines() {
                            if let Some(entry) = process_line(line, &service, &pipeline.scrubber) {
                                batch.push(entry);
                                if batch.len() >= BATCH_SIZE {
                                    flush_batch(&pipeline, &service, &mut batch).await;
                                }
                            }
                        }
                    }
                    Some(Err(e)) => {
                        error!(service = %service, error = %e, "log stream error");
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    flush_batch(&pipeline, &service, &mut batch).await;
    info!(service = %service, "tailer stopped");
}

/// Decode, trim, split off the runtime timestamp prefix, normalize, and
/// scrub one line. Empty lines yield `None`.
fn process_line(raw: &str, service: &str, scrubber: &Scrubber) -> Option<LogEntry> {
    let line = raw.trim();
    if line.is_empty() {
        return None;
    }

    let (runtime_ts, payload) = split_runtime_timestamp(line);
    let normalized = normalizer::normalize_line(payload, service);
    let mut entry = normalized.entry;

    // The runtime timestamp only wins when the producer payload carried none.
    if normalized.wallclock_fallback {
        if let Some(ts) = runtime_ts {
            entry.timestamp = ts.to_string();
        }
    }

    Some(scrubber.scrub_entry(entry))
}

/// The runtime prepends "2025-02-21T10:00:00.123456789Z " when timestamps
/// are requested: a leading digit and a `T` within the first 30 characters
/// mark the prefix, which runs to the first space.
fn split_runtime_timestamp(line: &str) -> (Option<&str>, &str) {
    let looks_stamped = line.len() > 30
        && line.as_bytes()[0].is_ascii_digit()
        && line.get(..30).is_some_and(|prefix| prefix.contains('T'));
    if looks_stamped {
        if let Some(idx) = line.find(' ') {
            if idx > 0 {
                return (Some(&line[..idx]), &line[idx + 1..]);
            }
        }
    }
    (None, line)
}

/// Insert the batch in one transaction, then publish the stored records.
/// A failed insert drops the batch; there is no durable in-flight buffer.
async fn flush_batch(pipeline: &Pipeline, service: &str, batch: &mut Vec<LogEntry>) {
    if batch.is_empty() {
        return;
    }
    let entries = std::mem::take(batch);
    let count = entries.len();

    let store = pipeline.store.clone();
    match tokio::task::spawn_blocking(move || store.insert_batch(entries)).await {
        Ok(Ok(records)) => {
            pipeline.broadcaster.publish(&records);
            debug!(service = %service, count, "batch flushed");
        }
        Ok(Err(e)) => {
            error!(service = %service, count, error = %e, "failed to persist batch, dropping");
        }
        Err(e) => {
            error!(service = %service, count, error = %e, "batch insert task panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_strips_runtime_timestamp() {
        let line = "2025-02-21T10:00:00.123456789Z payload after the stamp";
        let (ts, payload) = split_runtime_timestamp(line);
        assert_eq!(ts, Some("2025-02-21T10:00:00.123456789Z"));
        assert_eq!(payload, "payload after the stamp");
    }

    #[test]
    fn test_split_leaves_unstamped_lines_alone() {
        let (ts, payload) = split_runtime_timestamp("plain message without any timestamp prefix");
        assert_eq!(ts, None);
        assert_eq!(payload, "plain message without any timestamp prefix");

        // Leading digit but no T in the first 30 characters
        let (ts, payload) = split_runtime_timestamp("404 not found 404 not found 404 not found");
        assert_eq!(ts, None);
        assert_eq!(payload, "404 not found 404 not found 404 not found");
    }

    #[test]
    fn test_split_requires_minimum_length() {
        let (ts, payload) = split_runtime_timestamp("2025-02-21T10:00:00Z hi");
        assert_eq!(ts, None);
        assert_eq!(payload, "2025-02-21T10:00:00Z hi");
    }

    #[test]
    fn test_runtime_timestamp_replaces_wallclock_fallback() {
        let scrubber = Scrubber::new("");
        let line = "2025-02-21T10:00:00.123456789Z plain text line that is long enough";
        let entry = process_line(line, "web", &scrubber).unwrap();
        assert_eq!(entry.timestamp, "2025-02-21T10:00:00.123456789Z");
        assert_eq!(entry.message, "plain text line that is long enough");
    }

    #[test]
    fn test_producer_timestamp_wins_over_runtime() {
        let scrubber = Scrubber::new("");
        let line = r#"2025-02-21T10:00:00.123456789Z {"event":"hi","timestamp":"2025-02-21T09:59:59+00:00"}"#;
        let entry = process_line(line, "web", &scrubber).unwrap();
        assert_eq!(entry.timestamp, "2025-02-21T09:59:59+00:00");
    }

    #[test]
    fn test_empty_line_is_skipped() {
        let scrubber = Scrubber::new("");
        assert!(process_line("   ", "web", &scrubber).is_none());
    }
}
