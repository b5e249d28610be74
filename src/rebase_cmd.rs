//! The `dar <app> <migration>` command.
//!
//! Locates the project, loads its migration graph, picks the other leaf of
//! the app as the rebase target, then either prints the planned renames
//! (`--dry-run`) or applies them, one `Rebasing <app>.<name>` line per file.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use clap::Args;
use serde::Serialize;

use crate::config::{DarConfig, Strategy};
use crate::error::RebaseError;
use crate::format::OutputFormat;
use crate::graph::{MigrationGraph, app_leaf_nodes};
use crate::model::MigrationNode;
use crate::project::{DiskMigrations, find_project_root};
use crate::rebase::formatter::{CommandFormatter, Formatter, NoFormatter};
use crate::rebase::fs::DiskFs;
use crate::rebase::{RebasePlan, RewriteStep, Rewriter, compute_rebase_plan};

const NOTHING_TO_REBASE: &str = "No migrations to rebase";

/// Rebase one of two conflicting migration branches onto the other
///
/// The named migration's branch is renumbered and re-linked so that it
/// follows the other leaf migration of the same app.
#[derive(Args, Debug, Default)]
pub struct RebaseArgs {
    /// The app_label of the two conflicting migrations
    pub app: String,

    /// The name of the migration that will be rebased on top of the other
    /// conflicting migration
    pub migration: String,

    /// Show what would be renamed without touching any file
    #[arg(long)]
    pub dry_run: bool,

    /// Dry-run output format: text or json
    #[arg(long, requires = "dry_run")]
    pub format: Option<OutputFormat>,

    /// Shorthand for --format json
    #[arg(long, hide = true, conflicts_with = "format", requires = "dry_run")]
    pub json: bool,

    /// How dependency declarations are rewritten (default from .dar.toml)
    #[arg(long, value_enum)]
    pub strategy: Option<Strategy>,

    /// Do not run the code formatter on rewritten files
    #[arg(long)]
    pub no_format: bool,

    /// Start looking for manage.py here instead of the current directory
    #[arg(short = 'C', long, value_name = "DIR")]
    pub directory: Option<PathBuf>,
}

/// Pick the local leaf for rebasing `remote` onto.
///
/// Returns `Ok(None)` when the app has fewer than two leaves, i.e. there is
/// no conflict.
///
/// # Errors
/// `remote` unknown, more than two leaves, or `remote` not among the leaves.
pub fn select_local(
    graph: &dyn MigrationGraph,
    remote: &MigrationNode,
) -> Result<Option<MigrationNode>, RebaseError> {
    if !graph.contains(remote) {
        return Err(RebaseError::MigrationNotFound {
            node: remote.clone(),
        });
    }
    let mut leaves = app_leaf_nodes(graph, &remote.app_label);
    if leaves.len() < 2 {
        return Ok(None);
    }
    if leaves.len() > 2 {
        return Err(RebaseError::TooManyLeafNodes {
            app_label: remote.app_label.clone(),
            leaves,
        });
    }
    let Some(position) = leaves.iter().position(|leaf| leaf == remote) else {
        return Err(RebaseError::NotALeaf {
            node: remote.clone(),
            candidates: leaves,
        });
    };
    leaves.remove(position);
    Ok(leaves.pop())
}

#[derive(Serialize)]
struct DryRun<'a> {
    #[serde(flatten)]
    plan: &'a RebasePlan,
    strategy: Strategy,
    steps: &'a [RewriteStep],
}

/// Run the rebase described by `args`, writing progress to `out`.
///
/// Every file is planned before any is touched, so declaration problems fail
/// the run with the project unchanged.
///
/// # Errors
/// Any [`RebaseError`] from discovery, leaf selection, planning or applying,
/// and failures writing to `out`.
pub fn run(args: &RebaseArgs, out: &mut dyn Write) -> Result<()> {
    let start = match &args.directory {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().context("cannot determine the current directory")?,
    };
    let root = find_project_root(&start)?;
    let config = DarConfig::load_from_root(&root).map_err(RebaseError::from)?;
    let migrations = DiskMigrations::load(&root, &config.discovery)?;
    tracing::debug!(root = %root.display(), "loaded migration graph");

    let remote = MigrationNode::new(&args.app, &args.migration);
    let Some(local) = select_local(&migrations, &remote)? else {
        return say(out, NOTHING_TO_REBASE);
    };
    let plan = compute_rebase_plan(&migrations, &args.app, &local, &remote)?;
    if plan.is_empty() {
        return say(out, NOTHING_TO_REBASE);
    }

    let strategy = args.strategy.unwrap_or(config.rebase.strategy);
    let command_formatter = if args.no_format || args.dry_run {
        None
    } else {
        CommandFormatter::from_command(&config.format.command)
    };
    let formatter: &dyn Formatter = match &command_formatter {
        Some(f) => f,
        None => &NoFormatter,
    };

    let rewriter = Rewriter::new(&DiskFs, &migrations, formatter, strategy);
    let steps = rewriter.plan(&plan)?;

    if args.dry_run {
        let format = if args.json {
            OutputFormat::Json
        } else {
            args.format.unwrap_or_default()
        };
        return print_dry_run(out, format, &plan, strategy, &steps);
    }

    let mut progress = Ok(());
    rewriter.apply(&steps, |step| {
        if progress.is_ok() {
            progress = writeln!(out, "Rebasing {}", step.migration).and_then(|()| out.flush());
        }
    })?;
    progress.map_err(|e| anyhow!("failed to write output: {e}"))
}

fn say(out: &mut dyn Write, line: &str) -> Result<()> {
    writeln!(out, "{line}").map_err(|e| anyhow!("failed to write output: {e}"))
}

fn print_dry_run(
    out: &mut dyn Write,
    format: OutputFormat,
    plan: &RebasePlan,
    strategy: Strategy,
    steps: &[RewriteStep],
) -> Result<()> {
    let text = match format {
        OutputFormat::Json => format.serialize(&DryRun {
            plan,
            strategy,
            steps,
        })?,
        OutputFormat::Text => {
            let mut text = format!(
                "Rebase {} onto {} (common base {}):",
                plan.remote, plan.local, plan.base
            );
            for step in steps {
                text.push_str(&format!("\n  {} -> {}", step.migration, step.renamed));
            }
            text
        }
    };
    say(out, &text)
}
