//! Deterministic, pure logic shared by the merge-forward chain.
//!
//! Core modules are free of I/O side effects. They operate on in-memory data
//! and return deterministic outputs suitable for tests.

pub mod message;
pub mod targets;
pub mod types;
