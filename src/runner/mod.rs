//! Execution adapter — drives an opaque workload and relays its output.
//!
//! The workload contract is a line-sink: implementations must call
//! [`LineSink::line`] for every complete line of output they produce. No
//! ambient stdout interception — the seam is explicit. Each invocation gets
//! its own parser context, created with the run and discarded with it.

pub mod command;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::RunnerError;
use crate::parser::LogParser;
use crate::registry::{JobRegistry, JobState};

pub use command::CommandWorkload;

/// Receives complete lines of workload output.
///
/// Sinks never fail: a problem while recording output must not mask the
/// workload's own success or failure.
#[async_trait]
pub trait LineSink: Send + Sync {
    async fn line(&self, text: &str);
}

/// An opaque long-running workload that emits text through the sink and
/// eventually succeeds or fails.
#[async_trait]
pub trait Workload: Send + Sync {
    async fn run(&self, subject: &str, sink: &dyn LineSink) -> Result<(), RunnerError>;
}

/// Relays workload output into the registry: every line is stored raw and
/// classified through this job's own parser.
pub struct EventSink {
    registry: Arc<JobRegistry>,
    job_id: Uuid,
    parser: Mutex<LogParser>,
}

impl EventSink {
    pub fn new(registry: Arc<JobRegistry>, job_id: Uuid) -> Self {
        Self {
            registry,
            job_id,
            parser: Mutex::new(LogParser::new()),
        }
    }
}

#[async_trait]
impl LineSink for EventSink {
    async fn line(&self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }

        // Unknown-id results are ignored: the job may have been swept
        // mid-run, and recording output must never fail the workload.
        self.registry.append_log(self.job_id, text).await;
        let events = self.parser.lock().await.parse_line(text);
        for event in events {
            self.registry.append_event(self.job_id, event).await;
        }
    }
}

/// Drive one workload invocation for a job, from `Running` to a terminal
/// state. Workload faults are converted into a `Failed` transition here and
/// never propagate further.
pub async fn run_job(
    registry: Arc<JobRegistry>,
    workload: Arc<dyn Workload>,
    subject: String,
    job_id: Uuid,
    output_dir: PathBuf,
) {
    registry
        .transition(
            job_id,
            JobState::Running,
            Some(&format!("Starting research for {subject}...")),
        )
        .await;
    registry.append_log(job_id, "Initializing agents...").await;

    let sink = EventSink::new(Arc::clone(&registry), job_id);

    match workload.run(&subject, &sink).await {
        Ok(()) => {
            let result_path = output_dir.join(format!("report_{subject}.md"));
            registry
                .append_log(job_id, "Research completed successfully!")
                .await;
            registry
                .complete(job_id, &result_path.to_string_lossy())
                .await;
            info!(job_id = %job_id, path = %result_path.display(), "Job finished");
        }
        Err(e) => {
            warn!(job_id = %job_id, error = %e, "Workload failed");
            registry
                .transition(
                    job_id,
                    JobState::Failed,
                    Some(&format!("Error during research: {e}")),
                )
                .await;
        }
    }
}

/// Spawn [`run_job`] on its own task so no caller blocks on the workload.
pub fn spawn_job(
    registry: Arc<JobRegistry>,
    workload: Arc<dyn Workload>,
    subject: String,
    job_id: Uuid,
    output_dir: PathBuf,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(run_job(registry, workload, subject, job_id, output_dir))
}

/// Deterministic workload that replays a fixed line script.
///
/// Stands in when no external command is configured; also the stub used by
/// tests. `{subject}` in a script line is replaced with the job's subject.
#[derive(Debug, Clone)]
pub struct ScriptedWorkload {
    lines: Vec<String>,
    failure: Option<String>,
    delay: Duration,
}

impl ScriptedWorkload {
    pub fn new(lines: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
            failure: None,
            delay: Duration::ZERO,
        }
    }

    /// Fail with the given message after the script has been replayed.
    pub fn with_failure(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    /// Pause between lines, so consumers can observe the job mid-run.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Demo script exercising every event category.
    pub fn demo() -> Self {
        Self::new([
            "# Agent: Research Agent",
            "# Task: background research on {subject}",
            "Thought: I need to find recent filings for {subject}",
            "Using tool: Serper Search API",
            "Observation: found 8 relevant sources",
            "Compiling findings...",
            "Task output: draft research notes for {subject}",
            "# Agent: Financial Analyst",
            "## Task: financial analysis of {subject}",
            "Reasoning: comparing revenue trends year over year",
            "Analysis finished",
        ])
        .with_delay(Duration::from_millis(200))
    }
}

#[async_trait]
impl Workload for ScriptedWorkload {
    async fn run(&self, subject: &str, sink: &dyn LineSink) -> Result<(), RunnerError> {
        for line in &self.lines {
            sink.line(&line.replace("{subject}", subject)).await;
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
        }
        match &self.failure {
            Some(message) => Err(RunnerError::Failed(message.clone())),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventPayload;

    #[tokio::test]
    async fn successful_run_completes_with_result_path() {
        let registry = JobRegistry::new();
        let id = registry.create("Acme").await;
        let workload = Arc::new(ScriptedWorkload::new(["working on it"]));

        run_job(
            Arc::clone(&registry),
            workload,
            "Acme".into(),
            id,
            PathBuf::from("output"),
        )
        .await;

        let job = registry.get(id).await.unwrap();
        assert_eq!(job.state, JobState::Completed);
        assert_eq!(job.result_path.as_deref(), Some("output/report_Acme.md"));
        assert!(job.error_message.is_none());
        // Lifecycle lines plus the workload's own output.
        assert!(job.logs.iter().any(|l| l.contains("Starting research for Acme...")));
        assert!(job.logs.iter().any(|l| l.contains("working on it")));
        assert!(job.logs.iter().any(|l| l.contains("Research completed successfully!")));
    }

    #[tokio::test]
    async fn failed_run_records_error_message() {
        let registry = JobRegistry::new();
        let id = registry.create("Acme").await;
        let workload = Arc::new(ScriptedWorkload::new(["partial output"]).with_failure("boom"));

        run_job(
            Arc::clone(&registry),
            workload,
            "Acme".into(),
            id,
            PathBuf::from("output"),
        )
        .await;

        let job = registry.get(id).await.unwrap();
        assert_eq!(job.state, JobState::Failed);
        assert_eq!(
            job.error_message.as_deref(),
            Some("Error during research: Workload failed: boom")
        );
        assert!(job.result_path.is_none());
        // Output emitted before the fault is still recorded.
        assert!(job.logs.iter().any(|l| l.contains("partial output")));
    }

    #[tokio::test]
    async fn sink_classifies_lines_into_events() {
        let registry = JobRegistry::new();
        let id = registry.create("Acme").await;
        let sink = EventSink::new(Arc::clone(&registry), id);

        sink.line("plain status line").await;
        sink.line("# Agent: Research Agent").await;
        sink.line("Using tool: Serper Search API").await;

        let job = registry.get(id).await.unwrap();
        assert_eq!(job.logs.len(), 3);
        assert!(
            job.events
                .iter()
                .any(|e| matches!(e.payload, EventPayload::AgentStart { .. }))
        );
        assert!(
            job.events
                .iter()
                .any(|e| matches!(e.payload, EventPayload::ToolUse { .. }))
        );
    }

    #[tokio::test]
    async fn sink_ignores_blank_lines() {
        let registry = JobRegistry::new();
        let id = registry.create("Acme").await;
        let sink = EventSink::new(Arc::clone(&registry), id);

        sink.line("   ").await;
        sink.line("").await;

        let job = registry.get(id).await.unwrap();
        assert!(job.logs.is_empty());
        assert!(job.events.is_empty());
    }

    #[tokio::test]
    async fn sink_never_fails_for_a_swept_job() {
        let registry = JobRegistry::new();
        let sink = EventSink::new(Arc::clone(&registry), Uuid::new_v4());
        // Must be a silent no-op.
        sink.line("orphaned output").await;
    }

    #[tokio::test]
    async fn agent_context_is_per_invocation() {
        let registry = JobRegistry::new();
        let a = registry.create("Acme").await;
        let b = registry.create("Beta").await;
        let sink_a = EventSink::new(Arc::clone(&registry), a);
        let sink_b = EventSink::new(Arc::clone(&registry), b);

        sink_a.line("# Agent: Research Agent").await;
        // Job B has its own context, so this is an AgentStart, not a change.
        sink_b.line("# Agent: Financial Analyst").await;

        let job_b = registry.get(b).await.unwrap();
        assert!(
            job_b
                .events
                .iter()
                .any(|e| matches!(e.payload, EventPayload::AgentStart { .. }))
        );
        assert!(
            !job_b
                .events
                .iter()
                .any(|e| matches!(e.payload, EventPayload::AgentChange { .. }))
        );
    }

    #[tokio::test]
    async fn scripted_workload_substitutes_subject() {
        let registry = JobRegistry::new();
        let id = registry.create("Acme").await;
        let sink = EventSink::new(Arc::clone(&registry), id);
        let workload = ScriptedWorkload::new(["researching {subject} now"]);

        workload.run("Acme", &sink).await.unwrap();

        let job = registry.get(id).await.unwrap();
        assert!(job.logs[0].contains("researching Acme now"));
    }

    #[tokio::test]
    async fn end_to_end_three_lines_agent_and_tool() {
        let registry = JobRegistry::new();
        let id = registry.create("Acme").await;
        let workload = Arc::new(ScriptedWorkload::new([
            "starting up",
            "# Agent: Research Agent",
            "Using tool: Serper Search API",
        ]));

        run_job(
            Arc::clone(&registry),
            workload,
            "Acme".into(),
            id,
            PathBuf::from("output"),
        )
        .await;

        let job = registry.get(id).await.unwrap();
        assert_eq!(job.state, JobState::Completed);
        let workload_lines: Vec<_> = job
            .logs
            .iter()
            .filter(|l| {
                l.contains("starting up") || l.contains("# Agent") || l.contains("Using tool")
            })
            .collect();
        assert_eq!(workload_lines.len(), 3);
        assert!(
            job.events
                .iter()
                .any(|e| matches!(e.payload, EventPayload::AgentStart { .. }))
        );
        assert!(
            job.events
                .iter()
                .any(|e| matches!(e.payload, EventPayload::ToolUse { .. }))
        );
    }
}
