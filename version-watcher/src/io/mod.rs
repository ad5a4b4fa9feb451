//! I/O helpers: git subprocesses, configuration files, CI payloads, reporting.

pub mod event;
pub mod executor;
pub mod git;
pub mod merge_config;
pub mod process;
pub mod reporter;
pub mod settings;
