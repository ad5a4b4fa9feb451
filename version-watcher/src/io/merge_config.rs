//! Merge configuration (JSON).
//!
//! ```json
//! {
//!   "mergeOperations": { "release-2022": "release-2023" },
//!   "branches": { "release-2022": { "alias": "2022", "milestoneNumber": 1 } }
//! }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::core::targets::{TargetError, merge_targets};

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MergeConfig {
    /// Branch -> branch it merges forward into.
    pub merge_operations: BTreeMap<String, String>,
    #[serde(default)]
    pub branches: BTreeMap<String, BranchInfo>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BranchInfo {
    #[serde(default)]
    pub alias: Option<String>,
    pub milestone_number: u64,
}

impl MergeConfig {
    /// Ordered branches a change on `base` is merged forward into.
    pub fn merge_targets(&self, base: &str) -> Result<Vec<String>, TargetError> {
        merge_targets(&self.merge_operations, base)
    }

    /// Release branch a milestone is assigned to.
    pub fn branch_for_milestone(&self, milestone: u64) -> Option<&str> {
        self.branches
            .iter()
            .find(|(_, info)| info.milestone_number == milestone)
            .map(|(name, _)| name.as_str())
    }
}

pub fn load_merge_config(path: &Path) -> Result<MergeConfig> {
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parse {}", path.display()))
}
