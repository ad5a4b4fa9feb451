//! Executor abstraction for git subcommands.
//!
//! The [`CommandExecutor`] trait decouples the merge-forward chain from the
//! actual `git` binary. Tests use scripted executors that return predetermined
//! outputs without spawning processes.

use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::io::process::run_command;

pub const DEFAULT_OUTPUT_LIMIT_BYTES: usize = 1_000_000;

/// Failure of a single git invocation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutionError {
    /// The command ran and exited nonzero.
    #[error("{command} failed (exit code {exit_code:?}): {stderr}")]
    Failed {
        command: String,
        exit_code: Option<i32>,
        stdout: String,
        stderr: String,
    },
    /// The command could not be started.
    #[error("{command} could not be started: {message}")]
    Spawn { command: String, message: String },
    /// The command exceeded the configured timeout and was killed.
    #[error("{command} timed out after {timeout_secs}s")]
    TimedOut { command: String, timeout_secs: u64 },
}

impl ExecutionError {
    pub fn command(&self) -> &str {
        match self {
            Self::Failed { command, .. }
            | Self::Spawn { command, .. }
            | Self::TimedOut { command, .. } => command,
        }
    }

    /// Exit code of a command that ran to completion.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::Failed { exit_code, .. } => *exit_code,
            Self::Spawn { .. } | Self::TimedOut { .. } => None,
        }
    }

    /// Captured stderr (empty when the command never ran).
    pub fn stderr(&self) -> &str {
        match self {
            Self::Failed { stderr, .. } => stderr,
            Self::Spawn { .. } | Self::TimedOut { .. } => "",
        }
    }
}

/// Runs one git subcommand to completion.
pub trait CommandExecutor {
    /// Run `git <args>` and return its trimmed stdout.
    fn execute(&self, args: &[&str]) -> Result<String, ExecutionError>;
}

impl<T: CommandExecutor + ?Sized> CommandExecutor for &T {
    fn execute(&self, args: &[&str]) -> Result<String, ExecutionError> {
        (**self).execute(args)
    }
}

/// Executor that spawns the `git` binary in a working copy.
#[derive(Debug, Clone)]
pub struct GitExecutor {
    workdir: PathBuf,
    timeout: Option<Duration>,
    output_limit_bytes: usize,
    envs: Vec<(String, String)>,
}

impl GitExecutor {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
            timeout: None,
            output_limit_bytes: DEFAULT_OUTPUT_LIMIT_BYTES,
            envs: Vec::new(),
        }
    }

    /// Kill commands that run longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_output_limit(mut self, output_limit_bytes: usize) -> Self {
        self.output_limit_bytes = output_limit_bytes;
        self
    }

    /// Set an environment variable for every spawned git process.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }
}

impl CommandExecutor for GitExecutor {
    #[instrument(skip_all)]
    fn execute(&self, args: &[&str]) -> Result<String, ExecutionError> {
        let command = render_command(args);
        debug!(%command, workdir = %self.workdir.display(), "running git");

        let mut cmd = Command::new("git");
        cmd.args(args).current_dir(&self.workdir);
        for (key, value) in &self.envs {
            cmd.env(key, value);
        }

        let output = run_command(cmd, self.timeout, self.output_limit_bytes).map_err(|err| {
            ExecutionError::Spawn {
                command: command.clone(),
                message: format!("{err:#}"),
            }
        })?;

        if output.timed_out {
            return Err(ExecutionError::TimedOut {
                command,
                timeout_secs: self.timeout.map_or(0, |t| t.as_secs()),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            warn!(%command, exit_code = ?output.status.code(), "git command failed");
            return Err(ExecutionError::Failed {
                command,
                exit_code: output.status.code(),
                stdout,
                stderr,
            });
        }
        Ok(stdout)
    }
}

/// Render `git <args>` for logs, quoting arguments that need it.
pub fn render_command(args: &[&str]) -> String {
    let mut rendered = String::from("git");
    for arg in args {
        rendered.push(' ');
        let needs_quotes = arg.is_empty()
            || arg
                .chars()
                .any(|c| c.is_whitespace() || matches!(c, '"' | '\'' | '$' | '`' | '\\'));
        if needs_quotes {
            rendered.push('"');
            rendered.push_str(&arg.replace('\\', "\\\\").replace('"', "\\\""));
            rendered.push('"');
        } else {
            rendered.push_str(arg);
        }
    }
    rendered
}
