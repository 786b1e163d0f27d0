//! Ordered pattern tables for log classification.
//!
//! Order within each table encodes precedence: the first matching pattern
//! wins for that category. Tables are independent of each other — one line
//! may match several categories and yield several events.

use std::sync::LazyLock;

use regex::Regex;

/// Compile a fixed table of literal patterns.
fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns.iter().map(|p| Regex::new(p).unwrap()).collect()
}

/// Lines that announce which agent is acting.
pub static AGENT_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"(?i)# Agent:\s*(.+?)(?:\n|$)",
        r"(?i)Agent:\s*(.+?)(?:\n|$)",
        r"(?i)Working Agent:\s*(.+?)(?:\n|$)",
    ])
});

/// Lines that announce a task starting.
pub static TASK_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"(?i)# Task:\s*(.+?)(?:\n|$)",
        r"(?i)## Task:\s*(.+?)(?:\n|$)",
        r"(?i)Beginning:\s*(.+?)(?:\n|$)",
    ])
});

/// Substring indicators that the current task finished. Checked only when
/// no task-start pattern matched the line.
pub static TASK_COMPLETE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)task output|completed|finished").unwrap());

/// Tool invocation announcements.
pub static TOOL_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"(?i)Using tool:\s*(.+?)(?:\n|$)",
        r"(?i)Tool:\s*(.+?)(?:\n|$)",
        r"(?i)Action:\s*(.+?)(?:\n|$)",
    ])
});

/// Reasoning / inner-monologue lines.
pub static THINKING_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"(?i)Thought:\s*(.+?)(?:\n|$)",
        r"(?i)Reasoning:\s*(.+?)(?:\n|$)",
        r"(?i)I need to\s*(.+?)(?:\n|$)",
        r"(?i)I will\s*(.+?)(?:\n|$)",
    ])
});

/// Tool results and other observations.
pub static OBSERVATION_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"(?i)Observation:\s*(.+?)(?:\n|$)",
        r"(?i)Result:\s*(.+?)(?:\n|$)",
    ])
});

/// First matching pattern's first capture, trimmed. Searches are unanchored;
/// the capture runs to end of line.
pub fn first_capture(patterns: &[Regex], line: &str) -> Option<String> {
    patterns.iter().find_map(|re| {
        re.captures(line)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
    })
}
