//! Stable exit codes for version-watcher CLI commands.

/// Run completed, or stopped without anything needing attention.
pub const OK: i32 = 0;
/// Run failed: conflicts, operational errors, or invalid inputs.
pub const FAILED: i32 = 1;
