//! Merge-forward of version bumps across a chain of release branches.
//!
//! When a version bump lands on a release branch, the watcher merges it into
//! every later release branch in turn while keeping each branch's own version
//! file, and stops as soon as a merge needs a human.
//!
//! - **[`core`]**: Pure, deterministic logic (target chains, naming, outcome types).
//! - **[`io`]**: Side-effecting operations (git subprocesses, config files,
//!   CI payloads, reporting). Isolated behind traits to enable fakes in tests.
//!
//! [`chain`] drives the state machine on top of [`merge_step`]; [`cli`]
//! assembles inputs for the `version-watcher` binary.

pub mod chain;
pub mod cli;
pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod merge_step;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
