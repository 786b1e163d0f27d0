//! Command-backed workload — runs an external process and forwards its
//! output line-by-line.
//!
//! The child process is the opaque producer: whatever it writes to stdout
//! or stderr is assembled into complete lines and pushed through the sink.
//! Success and failure map onto the exit status.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::RunnerError;
use crate::runner::{LineSink, Workload};

/// Workload that shells out to a configured command.
///
/// The subject is appended as the final argument.
#[derive(Debug, Clone)]
pub struct CommandWorkload {
    program: String,
    args: Vec<String>,
}

impl CommandWorkload {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Parse a whitespace-separated command line, e.g. from configuration.
    /// Returns `None` for an empty command line.
    pub fn from_command_line(cmdline: &str) -> Option<Self> {
        let mut parts = cmdline.split_whitespace();
        let program = parts.next()?;
        Some(Self::new(program).with_args(parts.map(str::to_string)))
    }

    /// Display form for startup banners and logs.
    pub fn command_line(&self) -> String {
        let mut parts = vec![self.program.clone()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

#[async_trait]
impl Workload for CommandWorkload {
    async fn run(&self, subject: &str, sink: &dyn LineSink) -> Result<(), RunnerError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(subject)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| RunnerError::Spawn {
                command: self.program.clone(),
                reason: e.to_string(),
            })?;

        debug!(command = %self.command_line(), subject, "Workload process spawned");

        // Both streams are part of the job's output. Each gets its own
        // forwarder task; the channel closes when both streams end.
        let (tx, mut rx) = mpsc::channel::<String>(64);
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_lines(stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_lines(stderr, tx.clone()));
        }
        drop(tx);

        while let Some(line) = rx.recv().await {
            sink.line(&line).await;
        }

        let status = child.wait().await?;
        if status.success() {
            Ok(())
        } else {
            Err(RunnerError::NonZeroExit {
                status: status.to_string(),
            })
        }
    }
}

/// Assemble a raw byte stream into complete lines and forward them.
/// Read errors end the stream without failing the workload — recording
/// output must not mask the process's own outcome.
async fn forward_lines<R>(reader: R, tx: mpsc::Sender<String>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if tx.send(line).await.is_err() {
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "Error reading workload output");
                break;
            }
        }
    }
}
