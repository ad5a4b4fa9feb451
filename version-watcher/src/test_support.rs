//! Test-only helpers: a scripted git executor, a recording reporter, and a
//! real-git fixture with a bare remote and a working clone.

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Mutex;

use anyhow::{Context, Result, anyhow};
use tempfile::TempDir;

use crate::io::executor::{CommandExecutor, ExecutionError, GitExecutor, render_command};
use crate::io::reporter::Reporter;

struct Rule {
    prefix: Vec<String>,
    responses: VecDeque<Result<String, ExecutionError>>,
}

/// Executor that records every command and answers from scripted rules.
///
/// A rule matches when its argument prefix matches the command. Responses for a
/// rule are consumed in order; the last one repeats. Unmatched commands succeed
/// with empty output.
#[derive(Default)]
pub struct ScriptedExecutor {
    rules: Mutex<Vec<Rule>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer commands starting with `prefix` with `stdout`.
    pub fn on(self, prefix: &[&str], stdout: &str) -> Self {
        self.push(prefix, Ok(stdout.to_string()))
    }

    /// Fail commands starting with `prefix` with `exit_code` and `stderr`.
    pub fn fail_on(self, prefix: &[&str], exit_code: i32, stderr: &str) -> Self {
        self.fail_with_stdout(prefix, exit_code, "", stderr)
    }

    pub fn fail_with_stdout(
        self,
        prefix: &[&str],
        exit_code: i32,
        stdout: &str,
        stderr: &str,
    ) -> Self {
        let command = render_command(prefix);
        self.push(
            prefix,
            Err(ExecutionError::Failed {
                command,
                exit_code: Some(exit_code),
                stdout: stdout.to_string(),
                stderr: stderr.to_string(),
            }),
        )
    }

    fn push(self, prefix: &[&str], response: Result<String, ExecutionError>) -> Self {
        {
            let mut rules = lock(&self.rules);
            let prefix: Vec<String> = prefix.iter().map(|s| s.to_string()).collect();
            match rules.iter_mut().find(|rule| rule.prefix == prefix) {
                Some(rule) => rule.responses.push_back(response),
                None => rules.push(Rule {
                    prefix,
                    responses: VecDeque::from([response]),
                }),
            }
        }
        self
    }

    /// Every command issued so far, rendered as `git <args>`.
    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }

    /// Number of issued commands whose arguments start with `prefix`.
    pub fn count_matching(&self, prefix: &[&str]) -> usize {
        let rendered = render_command(prefix);
        lock(&self.calls)
            .iter()
            .filter(|call| *call == &rendered || call.starts_with(&format!("{rendered} ")))
            .count()
    }
}

impl CommandExecutor for ScriptedExecutor {
    fn execute(&self, args: &[&str]) -> Result<String, ExecutionError> {
        lock(&self.calls).push(render_command(args));
        let mut rules = lock(&self.rules);
        let rule = rules.iter_mut().find(|rule| {
            rule.prefix.len() <= args.len()
                && rule.prefix.iter().zip(args).all(|(want, got)| want == got)
        });
        match rule {
            Some(rule) if rule.responses.len() > 1 => rule
                .responses
                .pop_front()
                .unwrap_or_else(|| Ok(String::new())),
            Some(rule) => rule
                .responses
                .front()
                .cloned()
                .unwrap_or_else(|| Ok(String::new())),
            None => Ok(String::new()),
        }
    }
}

/// One recorded reporter call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Report {
    Info(String),
    Warning(String),
    Error(String),
    StartGroup(String),
    EndGroup,
    Failed(String),
}

/// Reporter that records every call for assertions.
#[derive(Default)]
pub struct RecordingReporter {
    reports: Mutex<Vec<Report>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<Report> {
        lock(&self.reports).clone()
    }

    pub fn infos(&self) -> Vec<String> {
        self.collect(|report| match report {
            Report::Info(msg) => Some(msg.clone()),
            _ => None,
        })
    }

    pub fn warnings(&self) -> Vec<String> {
        self.collect(|report| match report {
            Report::Warning(msg) => Some(msg.clone()),
            _ => None,
        })
    }

    pub fn errors(&self) -> Vec<String> {
        self.collect(|report| match report {
            Report::Error(msg) => Some(msg.clone()),
            _ => None,
        })
    }

    pub fn failures(&self) -> Vec<String> {
        self.collect(|report| match report {
            Report::Failed(msg) => Some(msg.clone()),
            _ => None,
        })
    }

    pub fn groups(&self) -> Vec<String> {
        self.collect(|report| match report {
            Report::StartGroup(name) => Some(name.clone()),
            _ => None,
        })
    }

    fn collect(&self, f: impl Fn(&Report) -> Option<String>) -> Vec<String> {
        lock(&self.reports).iter().filter_map(f).collect()
    }

    fn record(&self, report: Report) {
        lock(&self.reports).push(report);
    }
}

impl Reporter for RecordingReporter {
    fn info(&self, message: &str) {
        self.record(Report::Info(message.to_string()));
    }

    fn warning(&self, message: &str) {
        self.record(Report::Warning(message.to_string()));
    }

    fn error(&self, message: &str) {
        self.record(Report::Error(message.to_string()));
    }

    fn start_group(&self, name: &str) {
        self.record(Report::StartGroup(name.to_string()));
    }

    fn end_group(&self) {
        self.record(Report::EndGroup);
    }

    fn set_failed(&self, message: &str) {
        self.record(Report::Failed(message.to_string()));
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Environment that isolates git from the host's system and user config.
pub const ISOLATED_GIT_ENV: [(&str, &str); 3] = [
    ("GIT_CONFIG_NOSYSTEM", "1"),
    ("GIT_CONFIG_GLOBAL", "/dev/null"),
    ("GIT_TERMINAL_PROMPT", "0"),
];

const AUTHOR_ENV: [(&str, &str); 4] = [
    ("GIT_AUTHOR_NAME", "Release Engineer"),
    ("GIT_AUTHOR_EMAIL", "release@example.com"),
    ("GIT_COMMITTER_NAME", "Release Engineer"),
    ("GIT_COMMITTER_EMAIL", "release@example.com"),
];

/// A bare "remote" repository, a seed clone used to author history, and a
/// working clone the watcher runs in.
///
/// The remote starts with a `main` branch holding `version.properties`
/// (`version=1.0`), `README.md` and `src/Foo.java`.
pub struct TestRemote {
    _temp: TempDir,
    remote: PathBuf,
    seed: PathBuf,
    work: PathBuf,
}

impl TestRemote {
    pub fn new() -> Result<Self> {
        let temp = tempfile::tempdir().context("create tempdir")?;
        let remote = temp.path().join("remote.git");
        let seed = temp.path().join("seed");
        let work = temp.path().join("work");

        run_git(temp.path(), &["init", "--quiet", "--bare", "remote.git"])?;
        run_git(&remote, &["symbolic-ref", "HEAD", "refs/heads/main"])?;

        run_git(temp.path(), &["init", "--quiet", "seed"])?;
        run_git(&seed, &["symbolic-ref", "HEAD", "refs/heads/main"])?;
        write_files(
            &seed,
            &[
                ("version.properties", "version=1.0\n"),
                ("README.md", "# app\n"),
                ("src/Foo.java", "class Foo {}\n"),
            ],
        )?;
        run_git(&seed, &["add", "-A"])?;
        run_git(&seed, &["commit", "--quiet", "-m", "initial commit"])?;
        let remote_url = path_str(&remote)?;
        run_git(&seed, &["remote", "add", "origin", remote_url])?;
        run_git(&seed, &["push", "--quiet", "origin", "main"])?;

        run_git(temp.path(), &["clone", "--quiet", remote_url, "work"])?;

        Ok(Self {
            _temp: temp,
            remote,
            seed,
            work,
        })
    }

    /// Working clone the watcher operates on.
    pub fn work_dir(&self) -> &Path {
        &self.work
    }

    /// Executor for the working clone, isolated from host git config.
    pub fn executor(&self) -> GitExecutor {
        ISOLATED_GIT_ENV
            .iter()
            .fold(GitExecutor::new(&self.work), |executor, (key, value)| {
                executor.env(*key, *value)
            })
    }

    /// Create `name` on the remote, starting at branch `from`.
    pub fn create_branch(&self, name: &str, from: &str) -> Result<()> {
        run_git(&self.seed, &["checkout", "--quiet", from])?;
        run_git(&self.seed, &["checkout", "--quiet", "-b", name])?;
        run_git(&self.seed, &["push", "--quiet", "origin", name])?;
        Ok(())
    }

    /// Commit `files` on `branch`, push it, and return the new commit id.
    pub fn commit_files(
        &self,
        branch: &str,
        files: &[(&str, &str)],
        message: &str,
    ) -> Result<String> {
        run_git(&self.seed, &["checkout", "--quiet", branch])?;
        write_files(&self.seed, files)?;
        run_git(&self.seed, &["add", "-A"])?;
        run_git(&self.seed, &["commit", "--quiet", "-m", message])?;
        run_git(&self.seed, &["push", "--quiet", "origin", branch])?;
        run_git(&self.seed, &["rev-parse", "HEAD"])
    }

    /// Commit id `branch` points at on the remote.
    pub fn remote_head(&self, branch: &str) -> Result<String> {
        run_git(&self.remote, &["rev-parse", &format!("refs/heads/{branch}")])
    }

    /// Contents of `path` at the tip of `branch` on the remote.
    pub fn remote_file(&self, branch: &str, path: &str) -> Result<String> {
        run_git(&self.remote, &["show", &format!("refs/heads/{branch}:{path}")])
    }

    /// Subject line of the tip commit of `branch` on the remote.
    pub fn remote_subject(&self, branch: &str) -> Result<String> {
        run_git(
            &self.remote,
            &["log", "-1", "--format=%s", &format!("refs/heads/{branch}")],
        )
    }

    /// Parent commit ids of `commit` in the remote.
    pub fn parents(&self, commit: &str) -> Result<Vec<String>> {
        let out = run_git(&self.remote, &["rev-list", "--parents", "-n", "1", commit])?;
        Ok(out.split_whitespace().skip(1).map(str::to_string).collect())
    }
}

fn write_files(root: &Path, files: &[(&str, &str)]) -> Result<()> {
    for (path, contents) in files {
        let full = root.join(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
        }
        fs::write(&full, contents).with_context(|| format!("write {}", full.display()))?;
    }
    Ok(())
}

fn path_str(path: &Path) -> Result<&str> {
    path.to_str()
        .ok_or_else(|| anyhow!("non-utf8 path {}", path.display()))
}

/// Run git with isolated config and a fixed author; return trimmed stdout.
pub fn run_git(dir: &Path, args: &[&str]) -> Result<String> {
    let mut cmd = Command::new("git");
    cmd.args(args).current_dir(dir);
    for (key, value) in ISOLATED_GIT_ENV.iter().chain(AUTHOR_ENV.iter()) {
        cmd.env(key, value);
    }
    let output = cmd
        .output()
        .with_context(|| format!("spawn {}", render_command(args)))?;
    if !output.status.success() {
        return Err(anyhow!(
            "{} failed: {}",
            render_command(args),
            String::from_utf8_lossy(&output.stderr).trim()
        ));
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}
