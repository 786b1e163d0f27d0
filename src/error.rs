//! Error types for jobstream.

use uuid::Uuid;

/// Top-level error type for the crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Runner error: {0}")]
    Runner(#[from] RunnerError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Boundary validation errors.
///
/// Surfaced synchronously to the caller and never stored in a job record.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Subject cannot be empty")]
    EmptySubject,

    #[error("Subject too long ({length} chars, max {max})")]
    SubjectTooLong { length: usize, max: usize },

    #[error("Job {id} not found")]
    JobNotFound { id: Uuid },

    #[error("Job {id} not completed yet")]
    JobNotCompleted { id: Uuid },

    #[error("Report not available for job {id}")]
    ReportUnavailable { id: Uuid },
}

/// Workload execution errors, caught by the execution adapter and converted
/// into a `Failed` job transition. Never propagated past the adapter.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("Failed to spawn workload command {command}: {reason}")]
    Spawn { command: String, reason: String },

    #[error("Workload exited with {status}")]
    NonZeroExit { status: String },

    #[error("Workload IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Workload failed: {0}")]
    Failed(String),
}

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;
