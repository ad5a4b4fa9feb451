//! Merge of the propagated commit into the checked-out target branch.
//!
//! The merge never commits. The version file is always forced back to the
//! target branch's pre-merge content and staged, so a release line's version
//! marker is never overwritten by an older one. Whether the merge succeeded is
//! read from repository state afterwards, not from the merge command's exit
//! code.

use tracing::{debug, instrument};

use crate::core::types::{ConflictSet, RunPhase};
use crate::io::executor::{CommandExecutor, ExecutionError};
use crate::io::git::{Git, GitError};
use crate::io::reporter::Reporter;

/// Classified result of a merge attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeAttempt {
    /// Merge is staged and ready to commit.
    Clean,
    /// Git moved the branch to `head` without a merge. The version file is
    /// restored in the index and may still need a commit.
    FastForwarded { head: String },
    /// Nothing to commit: the target already contains the commit.
    AlreadyUpToDate,
    /// Paths other than the version file still conflict.
    Conflicted(ConflictSet),
    /// The merge could not be carried out or inspected.
    OperationalError(GitError),
}

/// Merge `commit` into the checked-out branch, whose tip is `pre_merge`, and
/// force `version_file` back to its pre-merge content.
///
/// `on_phase` is called as the attempt moves through merging, version file
/// resolution and conflict checking.
#[instrument(skip_all, fields(commit, pre_merge, version_file))]
pub fn merge<E, R>(
    git: &Git<E>,
    reporter: &R,
    commit: &str,
    pre_merge: &str,
    version_file: &str,
    mut on_phase: impl FnMut(RunPhase),
) -> MergeAttempt
where
    E: CommandExecutor,
    R: Reporter + ?Sized,
{
    on_phase(RunPhase::Merging);
    let merge_failure = match git.merge_no_commit(commit) {
        Ok(output) => {
            if !output.is_empty() {
                reporter.info(&output);
            }
            None
        }
        Err(err @ ExecutionError::Failed { .. }) => {
            // Conflicted merges exit nonzero; the conflict check below decides.
            reporter.info(&format!("Ignored: {err}"));
            if let ExecutionError::Failed { stdout, .. } = &err
                && !stdout.is_empty()
            {
                reporter.info(stdout);
            }
            match git.status() {
                Ok(status) => reporter.info(&status),
                Err(status_err) => debug!(err = %status_err, "git status unavailable"),
            }
            Some(err)
        }
        Err(err) => return MergeAttempt::OperationalError(err.into()),
    };

    on_phase(RunPhase::ResolvingVersionFile);
    if let Err(err) = resolve_version_file(git, version_file, pre_merge) {
        return MergeAttempt::OperationalError(err);
    }

    on_phase(RunPhase::CheckingConflicts);
    match classify(git, commit, pre_merge, merge_failure) {
        Ok(attempt) => {
            debug!(?attempt, "merge attempt classified");
            attempt
        }
        Err(err) => MergeAttempt::OperationalError(err),
    }
}

/// Force the version file back to the target's pre-merge content and stage it.
///
/// A conflicted version file takes "ours". Otherwise git already merged it,
/// or fast-forwarded over it, so it is checked out from `pre_merge` instead.
pub fn resolve_version_file<E: CommandExecutor>(
    git: &Git<E>,
    version_file: &str,
    pre_merge: &str,
) -> Result<(), GitError> {
    if git.unmerged_paths()?.contains(version_file) {
        git.checkout_ours(version_file)?;
    } else {
        git.checkout_from(pre_merge, version_file)?;
    }
    git.add(version_file)
}

fn classify<E: CommandExecutor>(
    git: &Git<E>,
    commit: &str,
    pre_merge: &str,
    merge_failure: Option<ExecutionError>,
) -> Result<MergeAttempt, GitError> {
    let conflicts = git.unmerged_paths()?;
    if !conflicts.is_empty() {
        return Ok(MergeAttempt::Conflicted(conflicts));
    }
    if git.merge_in_progress()? {
        return Ok(MergeAttempt::Clean);
    }
    if let Some(source) = merge_failure {
        return Err(GitError::MergeNotStarted {
            commit: commit.to_string(),
            source,
        });
    }
    let head = git.head_commit()?;
    if head == pre_merge {
        Ok(MergeAttempt::AlreadyUpToDate)
    } else {
        Ok(MergeAttempt::FastForwarded { head })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{RecordingReporter, ScriptedExecutor};

    const COMMIT: &str = "abcdef0123456789abcdef0123456789abcdef01";
    const TIP: &str = "5555555555555555555555555555555555555555";
    const UNMERGED: [&str; 3] = ["diff", "--name-only", "--diff-filter=U"];

    fn run(executor: &ScriptedExecutor, reporter: &RecordingReporter) -> MergeAttempt {
        merge(
            &Git::new(executor),
            reporter,
            COMMIT,
            TIP,
            "app/version.properties",
            |_| {},
        )
    }

    #[test]
    fn conflicted_version_file_takes_ours_and_merge_exit_is_ignored() {
        let executor = ScriptedExecutor::new()
            .fail_with_stdout(
                &["merge"],
                1,
                "CONFLICT (content): Merge conflict in app/version.properties",
                "",
            )
            .on(&["status"], "You have unmerged paths.")
            .on(&UNMERGED, "app/version.properties")
            .on(&UNMERGED, "");
        let reporter = RecordingReporter::new();

        assert_eq!(run(&executor, &reporter), MergeAttempt::Clean);
        assert_eq!(executor.count_matching(&["checkout", "--ours"]), 1);
        assert_eq!(executor.count_matching(&["checkout", TIP]), 0);
        assert!(reporter.infos().iter().any(|line| line.starts_with("Ignored: ")));
        assert!(
            reporter
                .infos()
                .iter()
                .any(|line| line.contains("Merge conflict in app/version.properties"))
        );
    }

    #[test]
    fn merged_version_file_is_restored_from_pre_merge_tip() {
        let executor = ScriptedExecutor::new();
        let reporter = RecordingReporter::new();
        assert_eq!(run(&executor, &reporter), MergeAttempt::Clean);
        assert_eq!(
            executor.calls(),
            vec![
                format!("git merge {COMMIT} --no-commit -v"),
                "git diff --name-only --diff-filter=U".to_string(),
                format!("git checkout {TIP} -- app/version.properties"),
                "git add app/version.properties".to_string(),
                "git diff --name-only --diff-filter=U".to_string(),
                "git rev-parse -q --verify MERGE_HEAD".to_string(),
            ]
        );
    }

    #[test]
    fn remaining_unmerged_paths_are_conflicts() {
        let executor = ScriptedExecutor::new()
            .fail_on(&["merge"], 1, "")
            .on(&UNMERGED, "src/Foo.java");
        let reporter = RecordingReporter::new();
        match run(&executor, &reporter) {
            MergeAttempt::Conflicted(conflicts) => {
                assert_eq!(conflicts.paths(), ["src/Foo.java"]);
            }
            other => panic!("expected conflicts, got {other:?}"),
        }
    }

    #[test]
    fn unmoved_head_without_merge_head_is_up_to_date() {
        let executor = ScriptedExecutor::new()
            .on(&["merge"], "Already up to date.")
            .fail_on(&["rev-parse", "-q", "--verify", "MERGE_HEAD"], 1, "")
            .on(&["rev-parse", "HEAD"], TIP);
        let reporter = RecordingReporter::new();
        assert_eq!(run(&executor, &reporter), MergeAttempt::AlreadyUpToDate);
        assert_eq!(reporter.infos(), vec!["Already up to date."]);
    }

    #[test]
    fn moved_head_without_merge_head_is_a_fast_forward() {
        let executor = ScriptedExecutor::new()
            .on(&["merge"], "Updating 5555555..abcdef0\nFast-forward")
            .fail_on(&["rev-parse", "-q", "--verify", "MERGE_HEAD"], 1, "")
            .on(&["rev-parse", "HEAD"], COMMIT);
        let reporter = RecordingReporter::new();
        assert_eq!(
            run(&executor, &reporter),
            MergeAttempt::FastForwarded {
                head: COMMIT.to_string()
            }
        );
        // The fast-forwarded version file is replaced before anything is staged.
        assert_eq!(
            executor.count_matching(&["checkout", TIP, "--", "app/version.properties"]),
            1
        );
    }

    #[test]
    fn failed_merge_without_merge_head_is_operational() {
        let executor = ScriptedExecutor::new()
            .fail_on(&["merge"], 1, "merge: abcdef0 - not something we can merge")
            .fail_on(&["rev-parse", "-q", "--verify", "MERGE_HEAD"], 1, "");
        let reporter = RecordingReporter::new();
        match run(&executor, &reporter) {
            MergeAttempt::OperationalError(GitError::MergeNotStarted { commit, .. }) => {
                assert_eq!(commit, COMMIT);
            }
            other => panic!("expected operational error, got {other:?}"),
        }
        assert_eq!(executor.count_matching(&["rev-parse", "HEAD"]), 0);
    }

    #[test]
    fn version_file_checkout_failure_is_operational() {
        let executor = ScriptedExecutor::new().fail_on(
            &["checkout", TIP],
            128,
            "fatal: invalid reference: 5555555555555555555555555555555555555555",
        );
        let reporter = RecordingReporter::new();
        assert!(matches!(
            run(&executor, &reporter),
            MergeAttempt::OperationalError(GitError::Execution(_))
        ));
        assert_eq!(executor.count_matching(&["add"]), 0);
    }

    #[test]
    fn phases_are_reported_in_order() {
        let executor = ScriptedExecutor::new();
        let reporter = RecordingReporter::new();
        let mut phases = Vec::new();
        merge(
            &Git::new(&executor),
            &reporter,
            COMMIT,
            TIP,
            "version.properties",
            |phase| phases.push(phase),
        );
        assert_eq!(
            phases,
            vec![
                RunPhase::Merging,
                RunPhase::ResolvingVersionFile,
                RunPhase::CheckingConflicts,
            ]
        );
    }
}
