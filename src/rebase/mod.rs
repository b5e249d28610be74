//! The rebase engine.
//!
//! [`diff`] finds where two branches of one application diverge;
//! [`rewrite`] renumbers the remote branch's migrations and re-links them
//! onto the local branch, using [`declaration`] for the source edits.

pub mod declaration;
pub mod diff;
pub mod formatter;
pub mod fs;
pub mod rewrite;

pub use diff::{RebasePlan, compute_rebase_plan};
pub use rewrite::{MigrationSource, RewriteStep, Rewriter};
