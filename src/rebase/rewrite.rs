//! Renumbering and re-linking of the migrations being rebased.
//!
//! Rewriting is two-phase. [`Rewriter::plan`] reads every file and computes
//! its new name and contents in memory; nothing on disk changes, so any
//! file whose declaration cannot be rewritten is reported before the first
//! rename. [`Rewriter::apply`] then renames and writes each file in order.
//! A failure during apply leaves earlier steps in place.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::Strategy;
use crate::error::RebaseError;
use crate::model::{MigrationNode, renumber};
use crate::rebase::declaration::{self, DependencyEntry};
use crate::rebase::diff::RebasePlan;
use crate::rebase::formatter::{Formatter, FormatterError};
use crate::rebase::fs::MigrationFs;

/// Resolves a migration to the file that defines it.
pub trait MigrationSource {
    /// Path of the migration's source file, or `None` if it has none
    /// (e.g. migrations of installed third-party apps).
    fn source_path(&self, node: &MigrationNode) -> Option<PathBuf>;
}

/// One migration's rename and rewrite.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RewriteStep {
    /// The migration as it is now.
    pub migration: MigrationNode,
    /// The migration after renumbering.
    pub renamed: MigrationNode,
    /// The dependency being replaced.
    pub old_dependency: MigrationNode,
    /// What it is replaced with.
    pub new_dependency: MigrationNode,
    /// Current file.
    pub path: PathBuf,
    /// File after the rename.
    pub new_path: PathBuf,
    /// Rewritten file contents.
    #[serde(skip)]
    pub contents: String,
}

/// Applies a [`RebasePlan`] to migration files.
pub struct Rewriter<'a> {
    fs: &'a dyn MigrationFs,
    source: &'a dyn MigrationSource,
    formatter: &'a dyn Formatter,
    strategy: Strategy,
}

impl<'a> Rewriter<'a> {
    /// Create a rewriter.
    pub fn new(
        fs: &'a dyn MigrationFs,
        source: &'a dyn MigrationSource,
        formatter: &'a dyn Formatter,
        strategy: Strategy,
    ) -> Self {
        Self {
            fs,
            source,
            formatter,
            strategy,
        }
    }

    /// Compute every step of the rebase without touching the filesystem.
    ///
    /// `base` starts at the plan's common base and `head` at the local leaf.
    /// After each migration, `base` becomes that migration's original
    /// identity (what the next one depends on) and `head` its new identity.
    ///
    /// # Errors
    /// Fails if a file cannot be located or read, a name has no sequence
    /// number, or a declaration cannot be rewritten with the strategy.
    pub fn plan(&self, plan: &RebasePlan) -> Result<Vec<RewriteStep>, RebaseError> {
        let mut steps = Vec::with_capacity(plan.to_rebase.len());
        let mut base = plan.base.clone();
        let mut head = plan.local.clone();

        for migration in &plan.to_rebase {
            let path = self
                .source
                .source_path(migration)
                .ok_or_else(|| RebaseError::MissingSource {
                    node: migration.clone(),
                })?;
            let new_name = renumber(&head.name, &migration.name)?;
            let new_path = renamed_path(&path, &new_name);

            let text = self
                .fs
                .read_to_string(&path)
                .map_err(|e| RebaseError::io(&path, e))?;
            let contents = self.rewrite_text(migration, &path, &text, &base, &head)?;

            let renamed = migration.with_name(new_name);
            steps.push(RewriteStep {
                migration: migration.clone(),
                renamed: renamed.clone(),
                old_dependency: base,
                new_dependency: head,
                path,
                new_path,
                contents,
            });

            base = migration.clone();
            head = renamed;
        }

        Ok(steps)
    }

    fn rewrite_text(
        &self,
        migration: &MigrationNode,
        path: &Path,
        text: &str,
        base: &MigrationNode,
        head: &MigrationNode,
    ) -> Result<String, RebaseError> {
        let declaration_error = |source| RebaseError::Declaration {
            path: path.to_owned(),
            source,
        };
        match self.strategy {
            Strategy::Targeted => {
                declaration::replace_dependency(text, base, head).map_err(declaration_error)
            }
            Strategy::Single => {
                check_single_dependency(migration, text, base)?;
                declaration::replace_all_dependencies(text, head).map_err(declaration_error)
            }
        }
    }

    /// Rename and rewrite each file, in order.
    ///
    /// `on_step` is called before each step is applied. The formatter runs on
    /// every rewritten file; its failures are logged and otherwise ignored.
    ///
    /// # Errors
    /// Returns the first I/O error. Steps before it stay applied.
    pub fn apply(
        &self,
        steps: &[RewriteStep],
        mut on_step: impl FnMut(&RewriteStep),
    ) -> Result<(), RebaseError> {
        for step in steps {
            on_step(step);
            if step.path != step.new_path {
                self.fs
                    .rename(&step.path, &step.new_path)
                    .map_err(|e| RebaseError::io(&step.path, e))?;
            }
            self.fs
                .write(&step.new_path, &step.contents)
                .map_err(|e| RebaseError::io(&step.new_path, e))?;
            tracing::info!(
                from = %step.migration,
                to = %step.renamed,
                path = %step.new_path.display(),
                "rebased migration"
            );

            match self.formatter.format(&step.new_path) {
                Ok(()) => {}
                Err(FormatterError::NotInstalled(program)) => {
                    tracing::debug!(%program, "formatter not installed, skipping");
                }
                Err(err) => {
                    tracing::warn!(path = %step.new_path.display(), "{err}");
                }
            }
        }
        Ok(())
    }
}

/// `dir/<new_name>.<ext>`, keeping the original extension.
fn renamed_path(path: &Path, new_name: &str) -> PathBuf {
    let file_name = match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) => format!("{new_name}.{ext}"),
        None => new_name.to_owned(),
    };
    path.with_file_name(file_name)
}

/// The single-dependency strategy only handles migrations whose declaration
/// is exactly one literal dependency on `base`.
fn check_single_dependency(
    migration: &MigrationNode,
    text: &str,
    base: &MigrationNode,
) -> Result<(), RebaseError> {
    let unsupported = |reason: String| RebaseError::UnsupportedDependencies {
        node: migration.clone(),
        reason,
    };
    let declaration = declaration::parse(text)
        .map_err(|e| unsupported(format!("has an unreadable dependencies declaration ({e})")))?
        .ok_or_else(|| unsupported("has no dependencies declaration".to_owned()))?;

    match declaration.entries.as_slice() {
        [DependencyEntry::Pair { node, .. }] if node == base => Ok(()),
        [DependencyEntry::Pair { node, .. }] if !node.is_in_app(&migration.app_label) => {
            Err(unsupported(format!("depends on another app ({node})")))
        }
        [DependencyEntry::Pair { node, .. }] => {
            Err(unsupported(format!("depends on {node} instead of {base}")))
        }
        [DependencyEntry::Other { text }] => {
            Err(unsupported(format!("has a non-literal dependency ({text})")))
        }
        entries => Err(unsupported(format!("has {} dependencies", entries.len()))),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
