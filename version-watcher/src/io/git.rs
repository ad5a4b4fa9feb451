//! Git adapter for the merge-forward chain.
//!
//! Every operation is a thin wrapper around one or two git subcommands issued
//! through a [`CommandExecutor`], so the chain can run against a scripted
//! executor in tests.

use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::core::types::{BotIdentity, ConflictSet};
use crate::io::executor::{CommandExecutor, ExecutionError};

/// Remote every branch is fetched from and pushed to.
pub const REMOTE: &str = "origin";

/// Errors from git operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GitError {
    /// The branch does not exist on the remote.
    #[error("branch '{branch}' does not exist on the remote")]
    BranchNotFound { branch: String },

    /// A merge command failed without leaving a merge in progress.
    #[error("merge of {commit} did not start: {source}")]
    MergeNotStarted {
        commit: String,
        #[source]
        source: ExecutionError,
    },

    #[error(transparent)]
    Execution(#[from] ExecutionError),
}

/// Wrapper issuing the git subcommands the chain needs.
#[derive(Debug, Clone)]
pub struct Git<E> {
    executor: E,
}

impl<E: CommandExecutor> Git<E> {
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    /// Fetch `branch` fresh from the remote and force the local branch onto its tip.
    ///
    /// Local history divergence from an earlier CI run on the same machine is
    /// discarded.
    #[instrument(skip_all, fields(branch))]
    pub fn switch_to_branch(&self, branch: &str) -> Result<(), GitError> {
        let refspec = format!("+refs/heads/{branch}:refs/remotes/{REMOTE}/{branch}");
        if let Err(err) = self
            .executor
            .execute(&["fetch", "--prune", REMOTE, &refspec])
        {
            if is_missing_remote_ref(&err) {
                warn!(branch, "branch missing on remote");
                return Err(GitError::BranchNotFound {
                    branch: branch.to_string(),
                });
            }
            return Err(err.into());
        }
        let tracking = format!("refs/remotes/{REMOTE}/{branch}");
        self.executor
            .execute(&["checkout", "--force", "-B", branch, &tracking])?;
        debug!(branch, "switched to branch");
        Ok(())
    }

    /// Number of paths changed between the merge base of `before`/`head` and `head`.
    pub fn changed_path_count(&self, before: &str, head: &str) -> Result<usize, GitError> {
        let range = format!("{before}...{head}");
        let out = self.executor.execute(&["diff", &range, "--name-only"])?;
        Ok(non_empty_lines(&out).count())
    }

    /// Set the committer identity in the repository config.
    pub fn configure_identity(&self, identity: &BotIdentity) -> Result<(), GitError> {
        self.executor
            .execute(&["config", "user.email", &identity.email])?;
        self.executor
            .execute(&["config", "user.name", &identity.name])?;
        Ok(())
    }

    /// Merge `commit` into the checked-out branch without committing.
    ///
    /// Returns the raw executor result: a nonzero exit is common for conflicted
    /// merges and is left to the caller to interpret.
    pub fn merge_no_commit(&self, commit: &str) -> Result<String, ExecutionError> {
        self.executor.execute(&["merge", commit, "--no-commit", "-v"])
    }

    /// Restore `path` to the checked-out branch's side of the merge.
    pub fn checkout_ours(&self, path: &str) -> Result<(), GitError> {
        self.executor.execute(&["checkout", "--ours", path])?;
        Ok(())
    }

    /// Restore `path` in the index and working tree from `commit`.
    pub fn checkout_from(&self, commit: &str, path: &str) -> Result<(), GitError> {
        self.executor.execute(&["checkout", commit, "--", path])?;
        Ok(())
    }

    pub fn add(&self, path: &str) -> Result<(), GitError> {
        self.executor.execute(&["add", path])?;
        Ok(())
    }

    /// Paths still marked unmerged in the index.
    pub fn unmerged_paths(&self) -> Result<ConflictSet, GitError> {
        let out = self
            .executor
            .execute(&["diff", "--name-only", "--diff-filter=U"])?;
        Ok(ConflictSet::new(
            non_empty_lines(&out).map(str::to_string).collect(),
        ))
    }

    /// True while a merge is in progress (`MERGE_HEAD` exists).
    pub fn merge_in_progress(&self) -> Result<bool, GitError> {
        match self
            .executor
            .execute(&["rev-parse", "-q", "--verify", "MERGE_HEAD"])
        {
            Ok(_) => Ok(true),
            Err(ExecutionError::Failed {
                exit_code: Some(1), ..
            }) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    /// True when the index differs from `HEAD`.
    pub fn has_staged_changes(&self) -> Result<bool, GitError> {
        match self.executor.execute(&["diff", "--cached", "--quiet"]) {
            Ok(_) => Ok(false),
            Err(ExecutionError::Failed {
                exit_code: Some(1), ..
            }) => Ok(true),
            Err(err) => Err(err.into()),
        }
    }

    pub fn commit(&self, message: &str) -> Result<(), GitError> {
        self.executor.execute(&["commit", "-m", message])?;
        Ok(())
    }

    /// Push the checked-out branch to its upstream.
    pub fn push(&self) -> Result<(), GitError> {
        self.executor.execute(&["push"])?;
        Ok(())
    }

    pub fn head_commit(&self) -> Result<String, GitError> {
        Ok(self.executor.execute(&["rev-parse", "HEAD"])?)
    }

    /// Commit the remote-tracking ref of `branch` points at.
    pub fn tracking_commit(&self, branch: &str) -> Result<String, GitError> {
        let tracking = format!("refs/remotes/{REMOTE}/{branch}");
        Ok(self.executor.execute(&["rev-parse", &tracking])?)
    }

    pub fn reset_hard(&self) -> Result<(), GitError> {
        self.executor.execute(&["reset", "--hard"])?;
        Ok(())
    }

    pub fn status(&self) -> Result<String, GitError> {
        Ok(self.executor.execute(&["status"])?)
    }
}

fn is_missing_remote_ref(err: &ExecutionError) -> bool {
    err.stderr().contains("couldn't find remote ref")
}

fn non_empty_lines(out: &str) -> impl Iterator<Item = &str> {
    out.lines().map(str::trim).filter(|line| !line.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedExecutor;

    #[test]
    fn switch_to_branch_fetches_then_force_checks_out() {
        let executor = ScriptedExecutor::new();
        let git = Git::new(&executor);
        git.switch_to_branch("release-2023").expect("switch");
        assert_eq!(
            executor.calls(),
            vec![
                "git fetch --prune origin +refs/heads/release-2023:refs/remotes/origin/release-2023",
                "git checkout --force -B release-2023 refs/remotes/origin/release-2023",
            ]
        );
    }

    #[test]
    fn switch_to_missing_branch_is_branch_not_found() {
        let executor = ScriptedExecutor::new().fail_on(
            &["fetch"],
            128,
            "fatal: couldn't find remote ref refs/heads/gone",
        );
        let git = Git::new(&executor);
        let err = git.switch_to_branch("gone").expect_err("missing");
        assert_eq!(
            err,
            GitError::BranchNotFound {
                branch: "gone".to_string()
            }
        );
        assert_eq!(executor.count_matching(&["checkout"]), 0);
    }

    #[test]
    fn other_fetch_failures_propagate() {
        let executor = ScriptedExecutor::new().fail_on(
            &["fetch"],
            128,
            "fatal: unable to access remote: connection refused",
        );
        let git = Git::new(&executor);
        let err = git.switch_to_branch("release-2023").expect_err("fails");
        assert!(matches!(err, GitError::Execution(_)));
    }

    #[test]
    fn changed_path_count_counts_non_empty_lines() {
        let executor = ScriptedExecutor::new().on(
            &["diff", "aaaaaaa...bbbbbbb", "--name-only"],
            "app/version.properties\nsrc/Foo.java\n\n",
        );
        let git = Git::new(&executor);
        assert_eq!(git.changed_path_count("aaaaaaa", "bbbbbbb").expect("count"), 2);
    }

    #[test]
    fn changed_path_count_of_empty_diff_is_zero() {
        let executor = ScriptedExecutor::new();
        let git = Git::new(&executor);
        assert_eq!(git.changed_path_count("a", "b").expect("count"), 0);
    }

    #[test]
    fn configure_identity_sets_email_then_name() {
        let executor = ScriptedExecutor::new();
        let git = Git::new(&executor);
        git.configure_identity(&BotIdentity {
            name: "Bot".to_string(),
            email: "bot@example.com".to_string(),
        })
        .expect("identity");
        assert_eq!(
            executor.calls(),
            vec![
                "git config user.email bot@example.com",
                "git config user.name Bot",
            ]
        );
    }

    #[test]
    fn unmerged_paths_preserves_order() {
        let executor = ScriptedExecutor::new().on(
            &["diff", "--name-only", "--diff-filter=U"],
            "src/Foo.java\nsrc/Bar.java",
        );
        let git = Git::new(&executor);
        let conflicts = git.unmerged_paths().expect("conflicts");
        assert_eq!(conflicts.paths(), ["src/Foo.java", "src/Bar.java"]);
    }

    #[test]
    fn merge_in_progress_reads_merge_head() {
        let executor = ScriptedExecutor::new().on(
            &["rev-parse", "-q", "--verify", "MERGE_HEAD"],
            "0123456789abcdef0123456789abcdef01234567",
        );
        assert!(Git::new(&executor).merge_in_progress().expect("check"));

        let executor =
            ScriptedExecutor::new().fail_on(&["rev-parse", "-q", "--verify", "MERGE_HEAD"], 1, "");
        assert!(!Git::new(&executor).merge_in_progress().expect("check"));

        let executor = ScriptedExecutor::new().fail_on(
            &["rev-parse", "-q", "--verify", "MERGE_HEAD"],
            128,
            "fatal: not a git repository",
        );
        assert!(Git::new(&executor).merge_in_progress().is_err());
    }

    #[test]
    fn checkout_from_names_commit_and_path() {
        let executor = ScriptedExecutor::new();
        Git::new(&executor)
            .checkout_from("5555555", "app/version.properties")
            .expect("checkout");
        assert_eq!(
            executor.calls(),
            vec!["git checkout 5555555 -- app/version.properties"]
        );
    }

    #[test]
    fn has_staged_changes_reads_diff_exit_code() {
        let executor = ScriptedExecutor::new();
        assert!(!Git::new(&executor).has_staged_changes().expect("check"));

        let executor = ScriptedExecutor::new().fail_on(&["diff", "--cached", "--quiet"], 1, "");
        assert!(Git::new(&executor).has_staged_changes().expect("check"));

        let executor = ScriptedExecutor::new().fail_on(
            &["diff", "--cached", "--quiet"],
            128,
            "fatal: bad revision",
        );
        assert!(Git::new(&executor).has_staged_changes().is_err());
    }
}
