//! Push event payload written by the CI system (`$GITHUB_EVENT_PATH`).

use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result, anyhow};
use regex::Regex;
use serde::Deserialize;

use crate::core::message::branch_from_ref;
use crate::core::types::ChangeOrigin;

static COMMIT_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9a-fA-F]{7,64}$").expect("valid commit id regex"));

/// The subset of a push event the watcher reads.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct PushEvent {
    #[serde(rename = "ref")]
    pub git_ref: String,
    pub before: String,
    /// Absent when the push deleted the branch.
    #[serde(default)]
    pub head_commit: Option<HeadCommit>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct HeadCommit {
    pub id: String,
}

impl PushEvent {
    pub fn into_origin(self) -> Result<ChangeOrigin> {
        let head = self
            .head_commit
            .ok_or_else(|| anyhow!("push event for {} has no head commit", self.git_ref))?;
        change_origin(&self.git_ref, &self.before, &head.id)
    }
}

pub fn load_push_event(path: &Path) -> Result<PushEvent> {
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parse {}", path.display()))
}

/// Build and validate the commit range that triggered the run.
pub fn change_origin(git_ref: &str, before: &str, head: &str) -> Result<ChangeOrigin> {
    let base_branch =
        branch_from_ref(git_ref).ok_or_else(|| anyhow!("'{git_ref}' is not a branch ref"))?;
    validate_commit_id("before", before)?;
    validate_commit_id("head", head)?;
    Ok(ChangeOrigin {
        base_branch: base_branch.to_string(),
        before: before.to_string(),
        head: head.to_string(),
    })
}

fn validate_commit_id(label: &str, id: &str) -> Result<()> {
    if !COMMIT_ID_RE.is_match(id) {
        return Err(anyhow!("{label} commit id '{id}' is not a hex commit id"));
    }
    Ok(())
}
