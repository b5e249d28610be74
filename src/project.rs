//! Django project discovery.
//!
//! Finds the project root by its `manage.py`, then loads every
//! `<app>/migrations/*.py` file beneath it into a [`MigrationGraph`]. The app
//! label is the name of the directory holding `migrations/`, which matches
//! Django's default `AppConfig.label`.
//!
//! Dependencies on apps with no migrations in the project (Django's own
//! `auth`, third-party packages) become external nodes: they take part in
//! forward plans but have no source file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::config::{ConfigError, DiscoveryConfig};
use crate::error::RebaseError;
use crate::graph::{GraphError, InMemoryGraph, MigrationGraph, app_leaf_nodes};
use crate::model::MigrationNode;
use crate::rebase::MigrationSource;
use crate::rebase::declaration::{self, DependencyEntry};

/// The file that marks a project root.
pub const PROJECT_MARKER: &str = "manage.py";

const MIGRATIONS_DIR: &str = "migrations";
const FIRST: &str = "__first__";
const LATEST: &str = "__latest__";

/// Walk upward from `start` (inclusive) to the first directory holding
/// `manage.py`.
///
/// # Errors
/// [`RebaseError::ProjectRootNotFound`] if no ancestor has one.
pub fn find_project_root(start: &Path) -> Result<PathBuf, RebaseError> {
    start
        .ancestors()
        .find(|dir| dir.join(PROJECT_MARKER).is_file())
        .map(Path::to_path_buf)
        .ok_or(RebaseError::ProjectRootNotFound {
            marker: PROJECT_MARKER,
        })
}

// ---------------------------------------------------------------------------
// DiskMigrations
// ---------------------------------------------------------------------------

/// Migrations loaded from a project directory.
#[derive(Debug, Default)]
pub struct DiskMigrations {
    graph: InMemoryGraph,
    paths: BTreeMap<MigrationNode, PathBuf>,
    apps: BTreeMap<String, PathBuf>,
}

impl DiskMigrations {
    /// Discover and parse every migration under `root`.
    ///
    /// # Errors
    /// Fails on invalid exclude patterns, unreadable or unparsable migration
    /// files, duplicate app labels, and dependencies on migrations that don't
    /// exist in a known app.
    pub fn load(root: &Path, config: &DiscoveryConfig) -> Result<Self, RebaseError> {
        let excludes = config
            .exclude
            .iter()
            .map(|p| {
                glob::Pattern::new(p).map_err(|e| {
                    RebaseError::Config(ConfigError {
                        path: None,
                        message: format!("invalid exclude pattern '{p}': {e}"),
                    })
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut loaded = Self::default();
        let mut declared: Vec<(MigrationNode, Vec<MigrationNode>)> = Vec::new();

        for path in migration_files(root)? {
            let relative = path.strip_prefix(root).unwrap_or(&path);
            if excludes.iter().any(|p| p.matches_path(relative)) {
                tracing::debug!(path = %relative.display(), "excluded");
                continue;
            }
            let Some((app_label, name)) = identify(&path) else {
                continue;
            };
            loaded.register_app(&app_label, &path)?;

            let text = std::fs::read_to_string(&path).map_err(|e| RebaseError::io(&path, e))?;
            let node = MigrationNode::new(app_label, name);
            let deps = parse_dependencies(&node, &path, &text)?;
            tracing::debug!(%node, dependencies = deps.len(), "loaded migration");

            loaded.graph.add_node(node.clone());
            loaded.paths.insert(node.clone(), path);
            declared.push((node, deps));
        }

        // Literal edges first, so __first__/__latest__ see each app's chain.
        let (special, literal): (Vec<_>, Vec<_>) = declared
            .into_iter()
            .flat_map(|(node, deps)| deps.into_iter().map(move |dep| (node.clone(), dep)))
            .partition(|(_, dep)| dep.name == FIRST || dep.name == LATEST);

        for (node, dep) in literal {
            let dep = loaded.resolve_literal(&node, dep)?;
            loaded.graph.add_dependency(&node, &dep);
        }
        let mut resolved = Vec::with_capacity(special.len());
        for (node, dep) in special {
            resolved.push((loaded.resolve_special(&node, dep)?, node));
        }
        for (dep, node) in resolved {
            loaded.graph.add_dependency(&node, &dep);
        }

        Ok(loaded)
    }

    fn register_app(&mut self, app_label: &str, file: &Path) -> Result<(), RebaseError> {
        let dir = file.parent().map(Path::to_path_buf).unwrap_or_default();
        match self.apps.get(app_label) {
            Some(existing) if *existing != dir => Err(RebaseError::DuplicateApp {
                app_label: app_label.to_owned(),
                first: existing.clone(),
                second: dir,
            }),
            Some(_) => Ok(()),
            None => {
                self.apps.insert(app_label.to_owned(), dir);
                Ok(())
            }
        }
    }

    fn resolve_literal(
        &self,
        node: &MigrationNode,
        dep: MigrationNode,
    ) -> Result<MigrationNode, RebaseError> {
        if self.apps.contains_key(&dep.app_label) && !self.paths.contains_key(&dep) {
            return Err(RebaseError::MissingDependency {
                node: node.clone(),
                dependency: dep,
            });
        }
        Ok(dep)
    }

    fn resolve_special(
        &self,
        node: &MigrationNode,
        dep: MigrationNode,
    ) -> Result<MigrationNode, RebaseError> {
        if !self.apps.contains_key(&dep.app_label) {
            return Ok(dep);
        }
        let candidates = if dep.name == FIRST {
            self.graph.app_root_nodes(&dep.app_label)
        } else {
            app_leaf_nodes(&self.graph, &dep.app_label)
        };
        candidates
            .into_iter()
            .next()
            .ok_or(RebaseError::MissingDependency {
                node: node.clone(),
                dependency: dep,
            })
    }
}

impl MigrationGraph for DiskMigrations {
    fn contains(&self, node: &MigrationNode) -> bool {
        self.graph.contains(node)
    }

    fn leaf_nodes(&self) -> Vec<MigrationNode> {
        self.graph.leaf_nodes()
    }

    fn forward_plan(&self, node: &MigrationNode) -> Result<Vec<MigrationNode>, GraphError> {
        self.graph.forward_plan(node)
    }
}

impl MigrationSource for DiskMigrations {
    fn source_path(&self, node: &MigrationNode) -> Option<PathBuf> {
        self.paths.get(node).cloned()
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// All `**/migrations/*.py` files under `root`, sorted.
fn migration_files(root: &Path) -> Result<Vec<PathBuf>, RebaseError> {
    let pattern = format!(
        "{}/**/{MIGRATIONS_DIR}/*.py",
        glob::Pattern::escape(&root.to_string_lossy())
    );
    let paths = glob::glob(&pattern).map_err(|e| {
        RebaseError::Config(ConfigError {
            path: None,
            message: format!("cannot search {}: {e}", root.display()),
        })
    })?;
    let mut files = Vec::new();
    for entry in paths {
        match entry {
            Ok(path) if path.is_file() => files.push(path),
            Ok(_) => {}
            Err(e) => {
                let path = e.path().to_owned();
                return Err(RebaseError::io(path, e.into_error()));
            }
        }
    }
    files.sort();
    Ok(files)
}

/// `(app_label, migration_name)` for a migration file, or `None` for
/// `__init__.py` and other non-migration modules.
fn identify(path: &Path) -> Option<(String, String)> {
    let name = path.file_stem()?.to_str()?;
    if name.starts_with('_') || name.starts_with('~') {
        return None;
    }
    let app_dir = path.parent()?.parent()?;
    let app_label = app_dir.file_name()?.to_str()?;
    Some((app_label.to_owned(), name.to_owned()))
}

fn parse_dependencies(
    node: &MigrationNode,
    path: &Path,
    text: &str,
) -> Result<Vec<MigrationNode>, RebaseError> {
    let declaration = declaration::parse(text).map_err(|source| RebaseError::Declaration {
        path: path.to_owned(),
        source,
    })?;
    let Some(declaration) = declaration else {
        return Ok(Vec::new());
    };
    for entry in &declaration.entries {
        if let DependencyEntry::Other { text } = entry {
            tracing::debug!(%node, entry = %text, "skipping non-literal dependency");
        }
    }
    Ok(declaration.nodes().cloned().collect())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
