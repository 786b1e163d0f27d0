//! Job registry — the single source of truth for job records.
//!
//! An injected service object, not a process-wide singleton: construct one
//! with [`JobRegistry::new`] and pass the `Arc` to every component that
//! needs it. All reads and writes serialize through one registry-wide async
//! lock; reads hand out snapshot clones, never live references.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::events::{Event, stamp};

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Created, not yet picked up by a runner.
    Queued,
    /// A runner is driving the workload.
    Running,
    /// Workload succeeded; `result_path` is set.
    Completed,
    /// Workload failed; `error_message` may be set.
    Failed,
}

impl JobState {
    /// Terminal states accept no further lifecycle progress.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// A tracked research job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: Uuid,
    /// What the job is about (e.g. a company name). Immutable.
    pub subject: String,
    pub state: JobState,
    pub created_at: DateTime<Utc>,
    /// Bumped on every mutation; monotonically non-decreasing.
    pub updated_at: DateTime<Utc>,
    /// Stamped output lines, append-only.
    pub logs: Vec<String>,
    /// Structured events, append-only. A parallel history to `logs`, not
    /// 1:1 — one line may yield zero, one, or several events.
    pub events: Vec<Event>,
    /// Set only when the job failed with a message.
    pub error_message: Option<String>,
    /// Set only on completion.
    pub result_path: Option<String>,
}

impl JobRecord {
    fn new(subject: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            subject,
            state: JobState::Queued,
            created_at: now,
            updated_at: now,
            logs: Vec::new(),
            events: Vec::new(),
            error_message: None,
            result_path: None,
        }
    }

    fn push_log(&mut self, line: &str) {
        self.logs.push(format!("[{}] {}", stamp(), line));
    }
}

/// Concurrency-safe store of job records.
pub struct JobRegistry {
    jobs: RwLock<HashMap<Uuid, JobRecord>>,
}

impl JobRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            jobs: RwLock::new(HashMap::new()),
        })
    }

    /// Create a job in `Queued` state and return its id. Subject validation
    /// is a boundary concern, not the registry's.
    pub async fn create(&self, subject: impl Into<String>) -> Uuid {
        let record = JobRecord::new(subject.into());
        let id = record.id;
        info!(job_id = %id, subject = %record.subject, "Job created");
        self.jobs.write().await.insert(id, record);
        id
    }

    /// Snapshot of a job record, or `None` for an unknown id.
    pub async fn get(&self, id: Uuid) -> Option<JobRecord> {
        self.jobs.read().await.get(&id).cloned()
    }

    /// Overwrite a job's state, optionally appending a stamped log line.
    /// A `Failed` state with a message also records the error message.
    ///
    /// Transitions are permissive by contract: out-of-order transitions are
    /// not rejected, the state is simply overwritten. Returns `false` for an
    /// unknown id (no-op, not an error).
    pub async fn transition(&self, id: Uuid, state: JobState, message: Option<&str>) -> bool {
        let mut jobs = self.jobs.write().await;
        let Some(job) = jobs.get_mut(&id) else {
            debug!(job_id = %id, "Transition on unknown job");
            return false;
        };

        job.state = state;
        job.updated_at = Utc::now();
        if let Some(message) = message {
            job.push_log(message);
            if state == JobState::Failed {
                job.error_message = Some(message.to_string());
            }
        }

        info!(job_id = %id, state = %state, "Job state updated");
        true
    }

    /// Append a stamped output line. Returns `false` for an unknown id.
    pub async fn append_log(&self, id: Uuid, line: &str) -> bool {
        let mut jobs = self.jobs.write().await;
        let Some(job) = jobs.get_mut(&id) else {
            return false;
        };
        job.push_log(line);
        job.updated_at = Utc::now();
        true
    }

    /// Append a structured event. Returns `false` for an unknown id.
    pub async fn append_event(&self, id: Uuid, event: Event) -> bool {
        let mut jobs = self.jobs.write().await;
        let Some(job) = jobs.get_mut(&id) else {
            return false;
        };
        debug!(job_id = %id, kind = event.kind(), "Event appended");
        job.events.push(event);
        job.updated_at = Utc::now();
        true
    }

    /// Record the result artifact and force the job to `Completed`.
    pub async fn complete(&self, id: Uuid, result_path: &str) -> bool {
        let mut jobs = self.jobs.write().await;
        let Some(job) = jobs.get_mut(&id) else {
            return false;
        };
        job.result_path = Some(result_path.to_string());
        job.state = JobState::Completed;
        job.updated_at = Utc::now();
        info!(job_id = %id, result_path, "Job completed");
        true
    }

    /// Remove every job whose `created_at` is older than the threshold,
    /// regardless of state. Returns the number removed.
    pub async fn sweep(&self, max_age_hours: i64) -> usize {
        let cutoff = Utc::now() - chrono::Duration::hours(max_age_hours);
        let mut jobs = self.jobs.write().await;
        let before = jobs.len();
        jobs.retain(|_, job| job.created_at >= cutoff);
        let removed = before - jobs.len();
        if removed > 0 {
            info!(removed, max_age_hours, "Swept old jobs");
        }
        removed
    }

    /// Number of tracked jobs, all states.
    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }
}

/// Spawn a background task that periodically sweeps old jobs.
pub fn spawn_sweep_task(
    registry: Arc<JobRegistry>,
    interval: Duration,
    max_age_hours: i64,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(interval);
        loop {
            interval.tick().await;
            registry.sweep(max_age_hours).await;
        }
    })
}
