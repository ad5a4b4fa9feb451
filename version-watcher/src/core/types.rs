//! Shared types for the merge-forward chain.
//!
//! Inputs (`ChangeOrigin`, `RunOptions`) are built once before the chain starts
//! and never mutated. Outcomes describe how a run or a single step ended.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Commit range whose push triggered the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeOrigin {
    /// Branch the version bump was pushed to (without `refs/heads/`).
    pub base_branch: String,
    /// Commit the branch pointed at before the push.
    pub before: String,
    /// Commit the branch points at after the push.
    pub head: String,
}

/// Committer identity used for generated merge commits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BotIdentity {
    pub name: String,
    pub email: String,
}

impl Default for BotIdentity {
    fn default() -> Self {
        Self {
            name: "Version Watcher Bot".to_string(),
            email: "version-watcher-bot@spiderstrategies.com".to_string(),
        }
    }
}

impl fmt::Display for BotIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <{}>", self.name, self.email)
    }
}

/// Options fixed for the lifetime of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    /// Version-marker file, relative to the repository root.
    pub version_file: String,
    /// Skip identity configuration.
    pub dry_run: bool,
    pub identity: BotIdentity,
    /// Largest number of changed paths between `before` and `head` that is
    /// still merged forward automatically.
    pub max_changed_files: usize,
}

/// Paths left unmerged after a merge attempt, in the order git reports them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConflictSet(Vec<String>);

impl ConflictSet {
    pub fn new(paths: Vec<String>) -> Self {
        Self(paths)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn paths(&self) -> &[String] {
        &self.0
    }

    pub fn contains(&self, path: &str) -> bool {
        self.0.iter().any(|p| p == path)
    }
}

impl fmt::Display for ConflictSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("\n"))
    }
}

/// Result of a single chain step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// Move on to the next step.
    Continue,
    /// Stop the run successfully; nothing (more) should be merged.
    AbortGracefully(String),
    /// Stop the run and mark it failed; a human has to take over.
    AbortWithFailure(String),
}

/// States of the merge-forward state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    SwitchingToBase,
    CheckingDiffScope,
    ConfiguringIdentity,
    SwitchingToTarget,
    Merging,
    ResolvingVersionFile,
    CheckingConflicts,
    Committing,
    Pushing,
    AdvancingCursor,
    Done,
    AbortedGracefully,
    AbortedWithFailure,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Idle => "idle",
            Self::SwitchingToBase => "switching to base branch",
            Self::CheckingDiffScope => "checking diff scope",
            Self::ConfiguringIdentity => "configuring git identity",
            Self::SwitchingToTarget => "switching to target branch",
            Self::Merging => "merging",
            Self::ResolvingVersionFile => "resolving version file",
            Self::CheckingConflicts => "checking conflicts",
            Self::Committing => "committing",
            Self::Pushing => "pushing",
            Self::AdvancingCursor => "advancing cursor",
            Self::Done => "done",
            Self::AbortedGracefully => "aborted gracefully",
            Self::AbortedWithFailure => "aborted with failure",
        };
        f.write_str(label)
    }
}

/// A target branch that received (and pushed) a merge commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedBranch {
    pub branch: String,
    pub commit: String,
}

/// Terminal state of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every target branch was merged.
    Done { merged: Vec<MergedBranch> },
    /// The run stopped without doing anything that needs attention.
    AbortedGracefully { reason: String },
    /// The run stopped and needs a human. `merged` lists the branches that
    /// were already pushed before the failure.
    AbortedWithFailure {
        phase: RunPhase,
        reason: String,
        merged: Vec<MergedBranch>,
    },
}

impl RunOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::AbortedWithFailure { .. })
    }

    /// Branches that received a pushed merge commit, in chain order.
    pub fn merged(&self) -> &[MergedBranch] {
        match self {
            Self::Done { merged } | Self::AbortedWithFailure { merged, .. } => merged,
            Self::AbortedGracefully { .. } => &[],
        }
    }
}
