//! Streaming gateway — polls the registry and emits job deltas.
//!
//! A read-only observer: each tick re-reads one job's snapshot, sends any
//! log lines not yet delivered (tracked with a sent-count cursor), sends
//! the current state, and stops after a terminal signal. Dropping the
//! stream stops the polling task; the underlying job keeps running.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::debug;
use uuid::Uuid;

use crate::registry::{JobRegistry, JobState};

/// Default poll interval between registry snapshots.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// One update emitted to a streaming client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamUpdate {
    /// A log line not previously delivered on this stream.
    Log(String),
    /// Current job state, sent every poll tick.
    Status(JobState),
    /// Terminal: the job completed; carries the result path.
    Complete(String),
    /// Terminal: the job failed or disappeared; carries the message.
    Error(String),
}

impl StreamUpdate {
    /// Wire event name on the SSE surface.
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Log(_) => "log",
            Self::Status(_) => "status",
            Self::Complete(_) => "complete",
            Self::Error(_) => "error",
        }
    }

    /// String payload on the SSE surface.
    pub fn payload(&self) -> String {
        match self {
            Self::Log(line) => line.clone(),
            Self::Status(state) => state.to_string(),
            Self::Complete(path) => path.clone(),
            Self::Error(message) => message.clone(),
        }
    }

    /// Whether the stream ends after this update.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete(_) | Self::Error(_))
    }
}

/// Stream updates for one job until it reaches a terminal state or
/// disappears. Lines are never re-sent once delivered.
pub fn stream_job(
    registry: Arc<JobRegistry>,
    job_id: Uuid,
    poll_interval: Duration,
) -> ReceiverStream<StreamUpdate> {
    let (tx, rx) = mpsc::channel(64);

    tokio::spawn(async move {
        let mut sent = 0usize;

        loop {
            let Some(job) = registry.get(job_id).await else {
                debug!(job_id = %job_id, "Streamed job disappeared");
                let _ = tx.send(StreamUpdate::Error("Job not found".into())).await;
                return;
            };

            for line in &job.logs[sent..] {
                if tx.send(StreamUpdate::Log(line.clone())).await.is_err() {
                    debug!(job_id = %job_id, "Stream consumer dropped");
                    return;
                }
            }
            sent = job.logs.len();

            if tx.send(StreamUpdate::Status(job.state)).await.is_err() {
                return;
            }

            match job.state {
                JobState::Completed => {
                    let path = job.result_path.unwrap_or_default();
                    let _ = tx.send(StreamUpdate::Complete(path)).await;
                    return;
                }
                JobState::Failed => {
                    let message = job
                        .error_message
                        .unwrap_or_else(|| "Unknown error".to_string());
                    let _ = tx.send(StreamUpdate::Error(message)).await;
                    return;
                }
                JobState::Queued | JobState::Running => {}
            }

            tokio::time::sleep(poll_interval).await;
        }
    });

    ReceiverStream::new(rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    const TICK: Duration = Duration::from_millis(10);

    async fn collect_all(stream: ReceiverStream<StreamUpdate>) -> Vec<StreamUpdate> {
        stream.collect().await
    }

    #[tokio::test]
    async fn completed_job_streams_logs_then_terminal_signal() {
        let registry = JobRegistry::new();
        let id = registry.create("Acme").await;
        registry.append_log(id, "line one").await;
        registry.append_log(id, "line two").await;
        registry.complete(id, "output/report_Acme.md").await;

        let updates = collect_all(stream_job(Arc::clone(&registry), id, TICK)).await;

        assert_eq!(updates.len(), 4);
        assert!(matches!(&updates[0], StreamUpdate::Log(l) if l.contains("line one")));
        assert!(matches!(&updates[1], StreamUpdate::Log(l) if l.contains("line two")));
        assert_eq!(updates[2], StreamUpdate::Status(JobState::Completed));
        assert_eq!(
            updates[3],
            StreamUpdate::Complete("output/report_Acme.md".into())
        );
    }

    #[tokio::test]
    async fn failed_job_streams_error_message() {
        let registry = JobRegistry::new();
        let id = registry.create("Acme").await;
        registry
            .transition(id, JobState::Failed, Some("Error during research: boom"))
            .await;

        let updates = collect_all(stream_job(Arc::clone(&registry), id, TICK)).await;

        let last = updates.last().unwrap();
        assert_eq!(last, &StreamUpdate::Error("Error during research: boom".into()));
    }

    #[tokio::test]
    async fn failed_job_without_message_gets_fallback() {
        let registry = JobRegistry::new();
        let id = registry.create("Acme").await;
        registry.transition(id, JobState::Failed, None).await;

        let updates = collect_all(stream_job(Arc::clone(&registry), id, TICK)).await;
        assert_eq!(updates.last().unwrap(), &StreamUpdate::Error("Unknown error".into()));
    }

    #[tokio::test]
    async fn unknown_job_errors_immediately() {
        let registry = JobRegistry::new();
        let updates = collect_all(stream_job(registry, Uuid::new_v4(), TICK)).await;
        assert_eq!(updates, vec![StreamUpdate::Error("Job not found".into())]);
    }

    #[tokio::test]
    async fn job_vanishing_mid_stream_errors() {
        let registry = JobRegistry::new();
        let id = registry.create("Acme").await;
        registry.transition(id, JobState::Running, None).await;

        let sweeper = Arc::clone(&registry);
        tokio::spawn(async move {
            tokio::time::sleep(TICK * 3).await;
            sweeper.sweep(0).await;
        });

        let updates = collect_all(stream_job(Arc::clone(&registry), id, TICK)).await;
        assert_eq!(updates.last().unwrap(), &StreamUpdate::Error("Job not found".into()));
    }

    #[tokio::test]
    async fn lines_are_delivered_once_in_order() {
        let registry = JobRegistry::new();
        let id = registry.create("Acme").await;
        registry.transition(id, JobState::Running, None).await;

        let writer = Arc::clone(&registry);
        tokio::spawn(async move {
            for i in 0..20 {
                writer.append_log(id, &format!("line {i}")).await;
                tokio::time::sleep(Duration::from_millis(3)).await;
            }
            writer.complete(id, "output/report_Acme.md").await;
        });

        let updates = collect_all(stream_job(Arc::clone(&registry), id, TICK)).await;

        let logs: Vec<&StreamUpdate> = updates
            .iter()
            .filter(|u| matches!(u, StreamUpdate::Log(l) if l.contains("line ")))
            .collect();
        // Every line exactly once, in append order.
        assert_eq!(logs.len(), 20);
        for (i, log) in logs.iter().enumerate() {
            assert!(matches!(log, StreamUpdate::Log(l) if l.ends_with(&format!("line {i}"))));
        }
        assert!(updates.last().unwrap().is_terminal());
    }

    #[test]
    fn event_names_and_payloads() {
        assert_eq!(StreamUpdate::Log("x".into()).event_name(), "log");
        assert_eq!(StreamUpdate::Status(JobState::Running).event_name(), "status");
        assert_eq!(StreamUpdate::Status(JobState::Running).payload(), "running");
        assert_eq!(StreamUpdate::Complete("p".into()).event_name(), "complete");
        assert_eq!(StreamUpdate::Error("e".into()).event_name(), "error");
        assert!(StreamUpdate::Complete("p".into()).is_terminal());
        assert!(!StreamUpdate::Log("x".into()).is_terminal());
    }
}
