// Rust 1.92 compiler bug: false positives for thiserror/miette derive macro fields
// https://github.com/rust-lang/rust/issues/147648
#![allow(unused_assignments)]

//! cachequota - keeps a GitHub Actions cache under its size quota
//!
//! The binary wraps [`cachequota_core`] for use as a workflow step:
//!
//! - `pre-save`: free room right before a new entry is saved, using the
//!   projected size of that entry
//! - `cleanup`: repository-wide eviction, repeated until usage converges
//! - `status`: usage and the planner's decision, read-only
//! - `estimate`: buffered size of a set of paths
//!
//! Cleanup never fails the job on remote trouble. The run exits successfully
//! and reports `cleanup-status=unavailable` instead.

// CLI needs to output to stdout/stderr
#![allow(clippy::print_stdout, clippy::print_stderr)]

/// CLI argument parsing and exit codes.
pub mod cli;
/// Subcommand implementations.
pub mod commands;
/// GitHub Actions step outputs.
pub mod outputs;
/// Tracing setup.
pub mod tracing;
