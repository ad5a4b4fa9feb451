//! Merge-forward chain orchestration.
//!
//! A run switches to the base branch, checks that the triggering push only
//! touched the version file, then merges the pushed commit into each target
//! branch in order. After every successful push the propagation cursor moves to
//! the new merge commit, so the next branch receives the already-resolved
//! history instead of the original commit.
//!
//! Every failure is caught here and turned into a [`RunOutcome`]; the caller
//! only maps the outcome to an exit code.

use std::cell::{Cell, RefCell};

use tracing::{debug, info, instrument, warn};

use crate::core::message::commit_message;
use crate::core::types::{
    ChangeOrigin, MergedBranch, RunOptions, RunOutcome, RunPhase, StepOutcome,
};
use crate::io::executor::CommandExecutor;
use crate::io::git::{Git, GitError};
use crate::io::reporter::Reporter;
use crate::merge_step::{MergeAttempt, merge};

/// Merge `origin.head` forward through `targets`, in order.
#[instrument(skip_all, fields(base = %origin.base_branch, targets = targets.len()))]
pub fn run_chain<E, R>(
    git: &Git<E>,
    reporter: &R,
    origin: &ChangeOrigin,
    targets: &[String],
    options: &RunOptions,
) -> RunOutcome
where
    E: CommandExecutor,
    R: Reporter + ?Sized,
{
    let run = ChainRun {
        git,
        reporter,
        origin,
        targets,
        options,
        phase: Cell::new(RunPhase::Idle),
        cursor: RefCell::new(origin.head.clone()),
        merged: RefCell::new(Vec::new()),
    };
    run.run()
}

struct ChainRun<'a, E, R: ?Sized> {
    git: &'a Git<E>,
    reporter: &'a R,
    origin: &'a ChangeOrigin,
    targets: &'a [String],
    options: &'a RunOptions,
    phase: Cell<RunPhase>,
    /// Commit that embodies every merge pushed so far.
    cursor: RefCell<String>,
    merged: RefCell<Vec<MergedBranch>>,
}

impl<E, R> ChainRun<'_, E, R>
where
    E: CommandExecutor,
    R: Reporter + ?Sized,
{
    fn run(self) -> RunOutcome {
        let result = self.drive();
        let failed_phase = self.phase.get();
        let merged = self.merged.take();
        match result {
            Ok(StepOutcome::Continue) => {
                self.enter(RunPhase::Done);
                info!(merged = merged.len(), "merge-forward chain complete");
                self.reporter.info(&format!(
                    "Merged {} forward into {} branch(es)",
                    self.origin.base_branch,
                    merged.len()
                ));
                RunOutcome::Done { merged }
            }
            Ok(StepOutcome::AbortGracefully(reason)) => {
                self.enter(RunPhase::AbortedGracefully);
                self.reporter.warning(&reason);
                RunOutcome::AbortedGracefully { reason }
            }
            Ok(StepOutcome::AbortWithFailure(reason)) => {
                self.enter(RunPhase::AbortedWithFailure);
                self.reporter.set_failed(&reason);
                RunOutcome::AbortedWithFailure {
                    phase: failed_phase,
                    reason,
                    merged,
                }
            }
            Err(err) => {
                self.enter(RunPhase::AbortedWithFailure);
                let reason = format!("{failed_phase} failed: {err}");
                warn!(phase = %failed_phase, err = %err, "merge-forward chain failed");
                self.reporter.error(&err.to_string());
                self.reporter.set_failed(&format!(
                    "Merging {} forward stopped while {failed_phase}",
                    self.origin.base_branch
                ));
                RunOutcome::AbortedWithFailure {
                    phase: failed_phase,
                    reason,
                    merged,
                }
            }
        }
    }

    fn drive(&self) -> Result<StepOutcome, GitError> {
        let prepared = self.prepare()?;
        if prepared != StepOutcome::Continue {
            return Ok(prepared);
        }
        for target in self.targets {
            self.reporter.start_group(&format!("Merge into: {target}"));
            let step = self.merge_into(target);
            self.reporter.end_group();
            match step? {
                StepOutcome::Continue => {}
                stop => return Ok(stop),
            }
        }
        Ok(StepOutcome::Continue)
    }

    /// Base branch switch, diff scope guard and identity setup.
    fn prepare(&self) -> Result<StepOutcome, GitError> {
        let base = &self.origin.base_branch;

        self.enter(RunPhase::SwitchingToBase);
        match self.git.switch_to_branch(base) {
            Ok(()) => {}
            Err(GitError::BranchNotFound { .. }) => {
                return Ok(StepOutcome::AbortGracefully(format!(
                    "Base branch `{base}` no longer exists on the remote, nothing to merge forward"
                )));
            }
            Err(err) => return Err(err),
        }

        self.enter(RunPhase::CheckingDiffScope);
        let changed = self
            .git
            .changed_path_count(&self.origin.before, &self.origin.head)?;
        debug!(changed, limit = self.options.max_changed_files, "diff scope");
        if changed > self.options.max_changed_files {
            return Ok(StepOutcome::AbortGracefully(format!(
                "Multiple files detected in diff ({changed} paths changed between {} and {}), \
                 not merging forward automatically",
                self.origin.before, self.origin.head
            )));
        }

        if self.options.dry_run {
            self.reporter
                .info("Dry run: leaving the git identity unchanged");
        } else {
            self.enter(RunPhase::ConfiguringIdentity);
            self.reporter.info(&format!(
                "Assigning git identity to {}",
                self.options.identity
            ));
            self.git.configure_identity(&self.options.identity)?;
        }
        Ok(StepOutcome::Continue)
    }

    /// One chain step: switch, merge, resolve, check, commit, push, advance.
    fn merge_into(&self, target: &str) -> Result<StepOutcome, GitError> {
        let base = &self.origin.base_branch;

        self.enter(RunPhase::SwitchingToTarget);
        self.git.switch_to_branch(target)?;
        let pre_merge = self.git.tracking_commit(target)?;

        let commit = self.cursor.borrow().clone();
        let message = commit_message(base, &self.origin.head, target);
        let attempt = merge(
            self.git,
            self.reporter,
            &commit,
            &pre_merge,
            &self.options.version_file,
            |phase| self.enter(phase),
        );
        match attempt {
            MergeAttempt::Clean => {
                self.enter(RunPhase::Committing);
                self.git.commit(&message)?;
            }
            MergeAttempt::FastForwarded { head } => {
                self.reporter.info(&format!(
                    "{target} fast-forwarded to {head}, keeping its own {}",
                    self.options.version_file
                ));
                if self.git.has_staged_changes()? {
                    self.enter(RunPhase::Committing);
                    self.git.commit(&message)?;
                }
            }
            MergeAttempt::AlreadyUpToDate => {
                self.reporter
                    .info(&format!("{target} already contains {commit}, nothing to commit"));
                self.enter(RunPhase::AdvancingCursor);
                self.advance_cursor(pre_merge);
                self.git.reset_hard()?;
                return Ok(StepOutcome::Continue);
            }
            MergeAttempt::Conflicted(conflicts) => {
                self.reporter
                    .warning(&format!("Conflicts found:\n{conflicts}"));
                return Ok(StepOutcome::AbortWithFailure(format!(
                    "Version bump could not be auto merged because other conflicting changes \
                     exist between `{base}` and `{target}`. Someone will need to resolve the \
                     version.properties merge manually. Conflicting paths: {}",
                    conflicts.paths().join(", ")
                )));
            }
            MergeAttempt::OperationalError(err) => return Err(err),
        }

        self.enter(RunPhase::Pushing);
        self.git.push()?;

        self.enter(RunPhase::AdvancingCursor);
        let merge_commit = self.git.head_commit()?;
        info!(target, commit = %merge_commit, "pushed merge commit");
        self.reporter
            .info(&format!("Pushed {merge_commit} to {target}"));
        self.merged.borrow_mut().push(MergedBranch {
            branch: target.to_string(),
            commit: merge_commit.clone(),
        });
        self.advance_cursor(merge_commit);

        // Leave nothing behind for the next branch's checkout.
        self.git.reset_hard()?;
        Ok(StepOutcome::Continue)
    }

    fn advance_cursor(&self, commit: String) {
        debug!(from = %self.cursor.borrow(), to = %commit, "advancing cursor");
        *self.cursor.borrow_mut() = commit;
    }

    fn enter(&self, phase: RunPhase) {
        debug!(from = %self.phase.get(), to = %phase, "phase transition");
        self.phase.set(phase);
    }
}
