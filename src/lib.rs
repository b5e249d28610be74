//! dar library crate: re-exports for integration tests.
//!
//! The primary interface is the `dar` binary. This lib.rs exposes the graph,
//! diff and rewrite modules so that tests can drive a rebase against an
//! in-memory graph and filesystem without going through the CLI.

pub mod config;
pub mod error;
pub mod format;
pub mod graph;
pub mod model;
pub mod project;
pub mod rebase;
pub mod rebase_cmd;
pub mod telemetry;
