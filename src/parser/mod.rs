//! Stateful log parser — classifies raw output lines into structured events.
//!
//! Classification is a pure function of (line, context-before): the same
//! line against the same starting context always yields the same event
//! sequence and the same resulting context. Categories are tested in a
//! fixed order and are non-exclusive — a single line may yield several
//! events. Within one category the first matching pattern wins. Lines that
//! match nothing fall through to a generic `Log` event, so parsing never
//! fails.

pub mod rules;

use tracing::debug;

use crate::events::{AgentRole, Event, EventPayload};

/// Carried-forward classification context.
///
/// One context per job execution, owned by that job's parser; never shared
/// across jobs or reused between executions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParserContext {
    /// Last agent announced in the output.
    pub current_agent: Option<String>,
    /// Last task announced in the output.
    pub current_task: Option<String>,
}

/// Line-oriented classifier for job output.
#[derive(Debug, Default)]
pub struct LogParser {
    ctx: ParserContext,
}

impl LogParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current carried-forward context.
    pub fn context(&self) -> &ParserContext {
        &self.ctx
    }

    /// Classify one line of output into zero or more events.
    ///
    /// Empty (after trimming) lines yield nothing and leave the context
    /// untouched.
    pub fn parse_line(&mut self, line: &str) -> Vec<Event> {
        let line = line.trim();
        if line.is_empty() {
            return Vec::new();
        }

        let mut events = Vec::new();

        if let Some(event) = self.match_agent(line) {
            events.push(event);
        }
        if let Some(event) = self.match_task(line) {
            events.push(event);
        }
        if let Some(event) = self.match_tool(line) {
            events.push(event);
        }
        if let Some(event) = self.match_thinking(line) {
            events.push(event);
        }
        if let Some(event) = self.match_observation(line) {
            events.push(event);
        }

        if events.is_empty() {
            events.push(Event::now(EventPayload::Log {
                message: line.to_string(),
                agent: self.ctx.current_agent.clone(),
                task: self.ctx.current_task.clone(),
            }));
        }

        events
    }

    fn match_agent(&mut self, line: &str) -> Option<Event> {
        let agent = rules::first_capture(&rules::AGENT_PATTERNS, line)?;
        let role = AgentRole::infer(&agent);
        debug!(agent = %agent, role = %role, "Agent line matched");

        let payload = if self.ctx.current_agent.is_none() {
            EventPayload::AgentStart {
                agent: agent.clone(),
                role,
                raw_line: line.to_string(),
            }
        } else {
            EventPayload::AgentChange {
                agent: agent.clone(),
                role,
                raw_line: line.to_string(),
            }
        };
        self.ctx.current_agent = Some(agent);
        Some(Event::now(payload))
    }

    fn match_task(&mut self, line: &str) -> Option<Event> {
        if let Some(task) = rules::first_capture(&rules::TASK_PATTERNS, line) {
            debug!(task = %task, "Task start matched");
            self.ctx.current_task = Some(task.clone());
            return Some(Event::now(EventPayload::TaskStart {
                task,
                agent: self.ctx.current_agent.clone(),
                raw_line: line.to_string(),
            }));
        }

        // Completion indicators report against the current context and do
        // not clear it.
        if rules::TASK_COMPLETE_PATTERN.is_match(line) {
            return Some(Event::now(EventPayload::TaskComplete {
                task: self.ctx.current_task.clone(),
                agent: self.ctx.current_agent.clone(),
                raw_line: line.to_string(),
            }));
        }

        None
    }

    fn match_tool(&self, line: &str) -> Option<Event> {
        let raw = rules::first_capture(&rules::TOOL_PATTERNS, line)?;
        let (tool, action) = normalize_tool(&raw);
        debug!(tool = %tool, "Tool use matched");
        Some(Event::now(EventPayload::ToolUse {
            tool,
            action,
            agent: self.ctx.current_agent.clone(),
            raw_line: line.to_string(),
        }))
    }

    fn match_thinking(&self, line: &str) -> Option<Event> {
        let thought = rules::first_capture(&rules::THINKING_PATTERNS, line)?;
        Some(Event::now(EventPayload::Thinking {
            thought,
            agent: self.ctx.current_agent.clone(),
        }))
    }

    fn match_observation(&self, line: &str) -> Option<Event> {
        let observation = rules::first_capture(&rules::OBSERVATION_PATTERNS, line)?;
        Some(Event::now(EventPayload::Observation {
            observation,
            agent: self.ctx.current_agent.clone(),
        }))
    }
}

/// Map captured tool text to a canonical name and action.
fn normalize_tool(raw: &str) -> (String, Option<String>) {
    let lower = raw.to_lowercase();
    if lower.contains("serper") {
        ("SerperDevTool".to_string(), Some("Search".to_string()))
    } else if lower.contains("search") {
        ("Search".to_string(), Some("Query".to_string()))
    } else {
        (raw.to_string(), None)
    }
}
