//! Error types for the rebase tool.
//!
//! [`RebaseError`] is the single error type surfaced to the command line. Its
//! `Display` output is the exact text printed on stderr, so messages are
//! phrased for the person running the tool.

use std::fmt;
use std::io;
use std::path::PathBuf;

use crate::config::ConfigError;
use crate::graph::GraphError;
use crate::model::{MigrationNode, ValidationError};
use crate::rebase::declaration::DeclarationError;

// ---------------------------------------------------------------------------
// RebaseError
// ---------------------------------------------------------------------------

/// Everything that can stop a rebase.
#[derive(Debug)]
pub enum RebaseError {
    /// No project marker file was found above the working directory.
    ProjectRootNotFound {
        /// The marker file that was searched for.
        marker: &'static str,
    },

    /// The named migration is not part of the graph.
    MigrationNotFound {
        /// The migration that was asked for.
        node: MigrationNode,
    },

    /// The named migration exists but something depends on it.
    NotALeaf {
        /// The migration that was asked for.
        node: MigrationNode,
        /// The application's leaf nodes, sorted.
        candidates: Vec<MigrationNode>,
    },

    /// The application has more than two leaf nodes.
    TooManyLeafNodes {
        /// The application.
        app_label: String,
        /// Its leaf nodes, sorted.
        leaves: Vec<MigrationNode>,
    },

    /// The two branches share no ancestor within the application.
    NoCommonBase {
        /// The branch being rebased onto.
        local: MigrationNode,
        /// The branch being rebased.
        remote: MigrationNode,
    },

    /// A migration name does not carry a sequence number.
    InvalidMigrationName(ValidationError),

    /// A migration's dependencies are too complex for the selected strategy.
    UnsupportedDependencies {
        /// The migration that was rejected.
        node: MigrationNode,
        /// What is wrong with its dependencies.
        reason: String,
    },

    /// A migration's dependency declaration could not be read or rewritten.
    Declaration {
        /// The file being processed.
        path: PathBuf,
        /// What went wrong.
        source: DeclarationError,
    },

    /// A migration in the graph has no backing source file.
    MissingSource {
        /// The migration.
        node: MigrationNode,
    },

    /// Two directories define migrations for the same app label.
    DuplicateApp {
        /// The clashing label.
        app_label: String,
        /// The first migrations directory seen.
        first: PathBuf,
        /// The second one.
        second: PathBuf,
    },

    /// A migration depends on a migration of a known app that doesn't exist.
    MissingDependency {
        /// The declaring migration.
        node: MigrationNode,
        /// The dependency that could not be found.
        dependency: MigrationNode,
    },

    /// The graph could not be walked.
    Graph(GraphError),

    /// The configuration file is invalid.
    Config(ConfigError),

    /// An I/O error on a specific file.
    Io {
        /// The file involved.
        path: PathBuf,
        /// The underlying error.
        source: io::Error,
    },
}

impl RebaseError {
    /// Wrap an I/O error with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

// ---------------------------------------------------------------------------
// Display
// ---------------------------------------------------------------------------

fn write_candidates(f: &mut fmt::Formatter<'_>, nodes: &[MigrationNode]) -> fmt::Result {
    for node in nodes {
        write!(f, "\n- {node}")?;
    }
    Ok(())
}

impl fmt::Display for RebaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProjectRootNotFound { marker } => write!(f, "Could not locate {marker}"),
            Self::MigrationNotFound { node } => write!(f, "Migration {node} doesn't exist"),
            Self::NotALeaf { node, candidates } => {
                write!(
                    f,
                    "Migration {node} is not a leaf node. Possible rebase candidates:"
                )?;
                write_candidates(f, candidates)
            }
            Self::TooManyLeafNodes { app_label, leaves } => {
                write!(
                    f,
                    "Too many leaf nodes in {app_label}; only two diverging branches can be rebased:"
                )?;
                write_candidates(f, leaves)
            }
            Self::NoCommonBase { .. } => {
                write!(f, "The given migrations don't have a common base")
            }
            Self::InvalidMigrationName(err) => write!(f, "{err}"),
            Self::UnsupportedDependencies { node, reason } => {
                write!(
                    f,
                    "Migration {node} {reason}. This is too complicated to rebase automatically, rebase it manually."
                )
            }
            Self::Declaration { path, source } => {
                write!(f, "Failed to rewrite {}: {source}", path.display())
            }
            Self::MissingSource { node } => {
                write!(f, "Migration {node} has no source file in this project")
            }
            Self::DuplicateApp {
                app_label,
                first,
                second,
            } => {
                write!(
                    f,
                    "App label '{app_label}' is defined by both {} and {}",
                    first.display(),
                    second.display()
                )
            }
            Self::MissingDependency { node, dependency } => {
                write!(
                    f,
                    "Migration {node} depends on {dependency}, which doesn't exist"
                )
            }
            Self::Graph(err) => write!(f, "{err}"),
            Self::Config(err) => write!(f, "{err}"),
            Self::Io { path, source } => write!(f, "{}: {source}", path.display()),
        }
    }
}

// ---------------------------------------------------------------------------
// std::error::Error
// ---------------------------------------------------------------------------

impl std::error::Error for RebaseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Declaration { source, .. } => Some(source),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// From impls
// ---------------------------------------------------------------------------

impl From<GraphError> for RebaseError {
    fn from(err: GraphError) -> Self {
        Self::Graph(err)
    }
}

impl From<ValidationError> for RebaseError {
    fn from(err: ValidationError) -> Self {
        Self::InvalidMigrationName(err)
    }
}

impl From<ConfigError> for RebaseError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
