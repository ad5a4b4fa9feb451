//! Naming helpers: branch names from refs, short commit ids, commit messages.

const BRANCH_REF_PREFIX: &str = "refs/heads/";
const SHORT_SHA_LEN: usize = 7;

/// Strip `refs/heads/` from a pushed ref. Tags and other refs yield `None`.
pub fn branch_from_ref(git_ref: &str) -> Option<&str> {
    git_ref
        .strip_prefix(BRANCH_REF_PREFIX)
        .filter(|name| !name.is_empty())
}

/// First seven characters of a commit id (the whole id if shorter).
pub fn short_sha(id: &str) -> &str {
    match id.char_indices().nth(SHORT_SHA_LEN) {
        Some((idx, _)) => &id[..idx],
        None => id,
    }
}

/// Message of the merge commit created on `target`.
pub fn commit_message(base_branch: &str, head: &str, target: &str) -> String {
    format!(
        "merged {base_branch} ({}) version.properties bump into {target}",
        short_sha(head)
    )
}
