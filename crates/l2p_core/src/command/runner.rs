//! Stage runner: executes one invocation and captures the result.
//!
//! The runner never returns an error for a failed command. A non-zero exit
//! or a launch failure becomes a [`FailureDetail`] the caller records.

use std::io;
use std::process::Command;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::builder::Invocation;

/// Whether commands are executed or only reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RunMode {
    /// Execute every command.
    #[default]
    Live,
    /// Report every command without executing it.
    DryRun,
}

impl RunMode {
    pub fn is_dry_run(&self) -> bool {
        matches!(self, RunMode::DryRun)
    }
}

/// Captured result of a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code, or `None` when the process was killed by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Why an invocation failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureDetail {
    /// The process ran and exited unsuccessfully.
    Exit {
        code: Option<i32>,
        /// Last lines the process wrote, stderr preferred.
        diagnostic: String,
    },
    /// The process could not be started.
    Launch { message: String },
    /// The stage could not be planned (missing registry or artifact).
    Prerequisite { message: String },
}

impl FailureDetail {
    pub fn prerequisite(message: impl Into<String>) -> Self {
        Self::Prerequisite {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for FailureDetail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureDetail::Exit { code, diagnostic } => {
                match code {
                    Some(code) => write!(f, "exit code {}", code)?,
                    None => write!(f, "terminated by signal")?,
                }
                if !diagnostic.is_empty() {
                    write!(f, ": {}", diagnostic)?;
                }
                Ok(())
            }
            FailureDetail::Launch { message } => write!(f, "failed to launch: {}", message),
            FailureDetail::Prerequisite { message } => {
                write!(f, "prerequisite missing: {}", message)
            }
        }
    }
}

/// Launches external processes.
pub trait Executor: Send + Sync {
    /// Run `command_line` to completion and capture its output.
    fn execute(&self, command_line: &str) -> io::Result<ProcessOutput>;
}

/// Executes command lines through `sh -c`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellExecutor;

impl ShellExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl Executor for ShellExecutor {
    fn execute(&self, command_line: &str) -> io::Result<ProcessOutput> {
        let output = Command::new("sh")
            .arg("-c")
            .arg(command_line)
            .output()?;

        Ok(ProcessOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Result of handing one invocation to the runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Dry run: reported, not executed.
    Planned,
    /// Executed and exited with status 0.
    Succeeded(ProcessOutput),
    /// Executed (or attempted) and failed. `output` is empty when the
    /// process never started.
    Failed {
        detail: FailureDetail,
        output: ProcessOutput,
    },
}

/// Runs invocations one at a time, synchronously, with no timeout.
#[derive(Clone)]
pub struct StageRunner {
    executor: Arc<dyn Executor>,
    /// Number of output lines kept in a failure diagnostic.
    diagnostic_lines: usize,
}

impl StageRunner {
    /// Create a runner backed by `executor`.
    pub fn new(executor: Arc<dyn Executor>) -> Self {
        Self {
            executor,
            diagnostic_lines: 20,
        }
    }

    /// Create a runner that executes through `sh -c`.
    pub fn shell() -> Self {
        Self::new(Arc::new(ShellExecutor::new()))
    }

    /// Set how many trailing output lines a failure keeps.
    pub fn with_diagnostic_lines(mut self, lines: usize) -> Self {
        self.diagnostic_lines = lines;
        self
    }

    /// Run one invocation.
    pub fn run(&self, invocation: &Invocation, mode: RunMode) -> RunOutcome {
        if mode.is_dry_run() {
            return RunOutcome::Planned;
        }

        let command_line = invocation.command_line();
        match self.executor.execute(&command_line) {
            Ok(output) if output.success() => RunOutcome::Succeeded(output),
            Ok(output) => RunOutcome::Failed {
                detail: FailureDetail::Exit {
                    code: output.code,
                    diagnostic: self.diagnostic(&output),
                },
                output,
            },
            Err(e) => RunOutcome::Failed {
                detail: FailureDetail::Launch {
                    message: e.to_string(),
                },
                output: ProcessOutput::default(),
            },
        }
    }

    /// Trailing lines of stderr, or of stdout when stderr is empty.
    fn diagnostic(&self, output: &ProcessOutput) -> String {
        let source = if output.stderr.trim().is_empty() {
            &output.stdout
        } else {
            &output.stderr
        };
        let lines: Vec<&str> = source.lines().collect();
        let start = lines.len().saturating_sub(self.diagnostic_lines);
        lines[start..].join("\n")
    }
}
