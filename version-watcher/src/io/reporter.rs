//! Run reporting for the invoking CI system.
//!
//! The chain reports through a [`Reporter`] passed in explicitly. In CI this is
//! an [`ActionsReporter`] that prints GitHub Actions workflow commands; tests
//! record the calls instead.

use std::io::{Stdout, Write};
use std::sync::Mutex;

use tracing::warn;

/// Sink for user-facing run output.
pub trait Reporter {
    fn info(&self, message: &str);
    fn warning(&self, message: &str);
    fn error(&self, message: &str);
    /// Start a collapsible group of output lines.
    fn start_group(&self, name: &str);
    fn end_group(&self);
    /// Mark the run failed with `message`.
    fn set_failed(&self, message: &str);
}

/// Reporter that writes GitHub Actions workflow commands.
pub struct ActionsReporter<W: Write = Stdout> {
    out: Mutex<W>,
}

impl ActionsReporter<Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write> ActionsReporter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        match self.out.into_inner() {
            Ok(out) => out,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write_line(&self, line: &str) {
        let mut out = match self.out.lock() {
            Ok(out) => out,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Err(err) = writeln!(out, "{line}").and_then(|()| out.flush()) {
            warn!(err = %err, "failed to write report line");
        }
    }

    fn command(&self, name: &str, message: &str) {
        self.write_line(&format!("::{name}::{}", escape_data(message)));
    }
}

impl<W: Write> Reporter for ActionsReporter<W> {
    fn info(&self, message: &str) {
        self.write_line(message);
    }

    fn warning(&self, message: &str) {
        self.command("warning", message);
    }

    fn error(&self, message: &str) {
        self.command("error", message);
    }

    fn start_group(&self, name: &str) {
        self.command("group", name);
    }

    fn end_group(&self) {
        self.write_line("::endgroup::");
    }

    fn set_failed(&self, message: &str) {
        self.command("error", message);
    }
}

/// Escape a workflow command payload so multi-line messages stay one command.
pub fn escape_data(message: &str) -> String {
    message
        .replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}
