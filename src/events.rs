//! Structured events extracted from job output.
//!
//! An [`Event`] is a typed fact classified from one line of raw workload
//! output. Timestamps record classification time — the source text carries
//! no reliable timestamps of its own.

use chrono::Local;
use serde::{Deserialize, Serialize};

/// Role inferred from an agent's display name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    Researcher,
    Analyst,
    Unknown,
}

impl AgentRole {
    /// Infer a role from the agent name by case-insensitive substring.
    pub fn infer(agent_name: &str) -> Self {
        let lower = agent_name.to_lowercase();
        if lower.contains("research") {
            Self::Researcher
        } else if lower.contains("analyst") || lower.contains("analysis") {
            Self::Analyst
        } else {
            Self::Unknown
        }
    }
}

impl std::fmt::Display for AgentRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Researcher => "researcher",
            Self::Analyst => "analyst",
            Self::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

/// Current wall-clock time as `HH:MM:SS`, the stamp format used on both
/// log lines and events.
pub fn stamp() -> String {
    Local::now().format("%H:%M:%S").to_string()
}

/// A structured event classified from one line of job output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Wall-clock time of classification.
    pub timestamp: String,
    #[serde(flatten)]
    pub payload: EventPayload,
}

impl Event {
    /// Wrap a payload with the current classification time.
    pub fn now(payload: EventPayload) -> Self {
        Self {
            timestamp: stamp(),
            payload,
        }
    }

    /// Short label for logging.
    pub fn kind(&self) -> &'static str {
        self.payload.kind()
    }
}

/// Variant-specific event data.
///
/// `agent` and `task` fields carry the parser context at time of emission
/// and may be absent when no agent or task has been seen yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    /// First agent seen in this job's output.
    AgentStart {
        agent: String,
        role: AgentRole,
        raw_line: String,
    },
    /// A different agent line after one was already seen.
    AgentChange {
        agent: String,
        role: AgentRole,
        raw_line: String,
    },
    TaskStart {
        task: String,
        agent: Option<String>,
        raw_line: String,
    },
    /// Completion indicator. `task` is the last task seen, or `None` if no
    /// task was ever announced.
    TaskComplete {
        task: Option<String>,
        agent: Option<String>,
        raw_line: String,
    },
    ToolUse {
        tool: String,
        action: Option<String>,
        agent: Option<String>,
        raw_line: String,
    },
    Thinking {
        thought: String,
        agent: Option<String>,
    },
    Observation {
        observation: String,
        agent: Option<String>,
    },
    /// Fallback for lines that matched no other category.
    Log {
        message: String,
        agent: Option<String>,
        task: Option<String>,
    },
}

impl EventPayload {
    /// Short label for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AgentStart { .. } => "agent_start",
            Self::AgentChange { .. } => "agent_change",
            Self::TaskStart { .. } => "task_start",
            Self::TaskComplete { .. } => "task_complete",
            Self::ToolUse { .. } => "tool_use",
            Self::Thinking { .. } => "thinking",
            Self::Observation { .. } => "observation",
            Self::Log { .. } => "log",
        }
    }
}
