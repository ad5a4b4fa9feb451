//! Merge target resolution.
//!
//! `mergeOperations` maps each branch to the branch it merges forward into.
//! The chain for a base branch is the sequence of successors reached by
//! following that map until a branch has none.

use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TargetError {
    #[error("merge operations form a cycle at '{branch}' (chain so far: {})", chain.join(" -> "))]
    Cycle { branch: String, chain: Vec<String> },
}

/// Ordered merge targets for `base`, earliest first. Empty when `base` has no successor.
pub fn merge_targets(
    operations: &BTreeMap<String, String>,
    base: &str,
) -> Result<Vec<String>, TargetError> {
    let mut visited = BTreeSet::from([base]);
    let mut targets = Vec::new();
    let mut current = operations.get(base);
    while let Some(next) = current {
        if !visited.insert(next.as_str()) {
            return Err(TargetError::Cycle {
                branch: next.clone(),
                chain: targets,
            });
        }
        targets.push(next.clone());
        current = operations.get(next);
    }
    Ok(targets)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ops(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(from, to)| (from.to_string(), to.to_string()))
            .collect()
    }

    #[test]
    fn follows_chain_in_order() {
        let operations = ops(&[
            ("release-2022", "release-2023"),
            ("release-2023", "release-2024"),
            ("release-2024", "main"),
        ]);
        let targets = merge_targets(&operations, "release-2022").expect("targets");
        assert_eq!(targets, vec!["release-2023", "release-2024", "main"]);
    }

    #[test]
    fn starts_mid_chain() {
        let operations = ops(&[
            ("release-2022", "release-2023"),
            ("release-2023", "release-2024"),
        ]);
        let targets = merge_targets(&operations, "release-2023").expect("targets");
        assert_eq!(targets, vec!["release-2024"]);
    }

    #[test]
    fn unknown_base_has_no_targets() {
        let operations = ops(&[("release-2022", "release-2023")]);
        let targets = merge_targets(&operations, "feature/x").expect("targets");
        assert!(targets.is_empty());
    }

    #[test]
    fn detects_cycles() {
        let operations = ops(&[("a", "b"), ("b", "c"), ("c", "a")]);
        let err = merge_targets(&operations, "a").expect_err("cycle");
        assert_eq!(
            err,
            TargetError::Cycle {
                branch: "a".to_string(),
                chain: vec!["b".to_string(), "c".to_string()],
            }
        );
    }

    #[test]
    fn detects_self_loop() {
        let operations = ops(&[("a", "a")]);
        assert!(merge_targets(&operations, "a").is_err());
    }
}
