//! CLI command implementations.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, info};

use crate::chain::run_chain;
use crate::core::types::{RunOptions, RunOutcome};
use crate::exit_codes;
use crate::io::event::{change_origin, load_push_event};
use crate::io::executor::GitExecutor;
use crate::io::git::Git;
use crate::io::merge_config::load_merge_config;
use crate::io::reporter::Reporter;
use crate::io::settings::{Settings, load_settings};

/// Where the triggering commit range comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    /// Push event payload written by the CI system.
    EventFile(PathBuf),
    Explicit {
        git_ref: String,
        before: String,
        head: String,
    },
}

/// Resolved inputs of `version-watcher run`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunArgs {
    /// Working copy to operate on. Relative config paths resolve against it.
    pub repo: PathBuf,
    pub config_file: PathBuf,
    pub version_file: String,
    pub dry_run: bool,
    pub trigger: Trigger,
    pub settings: Option<PathBuf>,
}

/// Assemble inputs and run the merge-forward chain.
///
/// Errors are input problems (unreadable config, malformed event); everything
/// that happens once the chain starts is reported through the outcome.
pub fn run_watcher<R: Reporter + ?Sized>(args: &RunArgs, reporter: &R) -> Result<RunOutcome> {
    let origin = match &args.trigger {
        Trigger::EventFile(path) => load_push_event(path)
            .context("load push event")?
            .into_origin()?,
        Trigger::Explicit {
            git_ref,
            before,
            head,
        } => change_origin(git_ref, before, head)?,
    };
    reporter.info(&format!(
        "Base branch name '{}' was extracted from the pushed ref",
        origin.base_branch
    ));

    let config_path = args.repo.join(&args.config_file);
    let config = load_merge_config(&config_path).context("load merge config")?;
    let targets = config
        .merge_targets(&origin.base_branch)
        .with_context(|| format!("resolve merge targets in {}", config_path.display()))?;
    if targets.is_empty() {
        reporter.info(&format!(
            "No merge targets configured for {}",
            origin.base_branch
        ));
    } else {
        reporter.info(&format!("Merge targets: {}", targets.join(" -> ")));
    }

    let settings = match &args.settings {
        Some(path) => load_settings(&args.repo.join(path)).context("load settings")?,
        None => Settings::default(),
    };
    debug!(?settings, "settings loaded");

    let executor = GitExecutor::new(&args.repo)
        .with_timeout(settings.command_timeout())
        .with_output_limit(settings.output_limit_bytes);
    let options = RunOptions {
        version_file: args.version_file.clone(),
        dry_run: args.dry_run,
        identity: settings.identity,
        max_changed_files: settings.max_changed_files,
    };

    info!(base = %origin.base_branch, targets = targets.len(), dry_run = args.dry_run, "starting run");
    let outcome = run_chain(&Git::new(executor), reporter, &origin, &targets, &options);
    let merged: Vec<&str> = outcome
        .merged()
        .iter()
        .map(|branch| branch.branch.as_str())
        .collect();
    info!(?merged, failed = outcome.is_failure(), "run finished");
    Ok(outcome)
}

/// Process exit code for a finished run.
pub fn exit_code(outcome: &RunOutcome) -> i32 {
    if outcome.is_failure() {
        exit_codes::FAILED
    } else {
        exit_codes::OK
    }
}

/// Merge targets configured for `base`, earliest first.
pub fn list_targets(config_file: &Path, base: &str) -> Result<Vec<String>> {
    let config = load_merge_config(config_file)?;
    Ok(config.merge_targets(base)?)
}

/// Release branch a milestone is assigned to.
pub fn milestone_branch(config_file: &Path, milestone: u64) -> Result<String> {
    let config = load_merge_config(config_file)?;
    config
        .branch_for_milestone(milestone)
        .map(str::to_string)
        .ok_or_else(|| {
            anyhow!(
                "no branch is assigned to milestone {milestone} in {}",
                config_file.display()
            )
        })
}
