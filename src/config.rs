//! Project configuration (`.dar.toml`).
//!
//! An optional file at the project root tunes the rewrite strategy, the
//! formatter command and which paths are searched for migrations. A missing
//! file means all defaults.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// File name of the configuration, relative to the project root.
pub const CONFIG_FILE: &str = ".dar.toml";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DarConfig {
    /// Rewrite settings.
    #[serde(default)]
    pub rebase: RebaseConfig,

    /// Formatter settings.
    #[serde(default)]
    pub format: FormatConfig,

    /// Migration discovery settings.
    #[serde(default)]
    pub discovery: DiscoveryConfig,
}

// ---------------------------------------------------------------------------
// RebaseConfig
// ---------------------------------------------------------------------------

/// How dependency declarations are rewritten.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RebaseConfig {
    /// The rewrite strategy.
    #[serde(default)]
    pub strategy: Strategy,
}

/// Dependency rewrite strategy.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Replace only the `(app, name)` entry pointing at the old parent.
    #[default]
    Targeted,
    /// Replace the whole list with a single entry; only migrations with
    /// exactly one same-app dependency are accepted.
    Single,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Targeted => write!(f, "targeted"),
            Self::Single => write!(f, "single"),
        }
    }
}

// ---------------------------------------------------------------------------
// FormatConfig
// ---------------------------------------------------------------------------

/// Formatter run on each rewritten file.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FormatConfig {
    /// Command line; the file path is appended. Empty disables formatting.
    #[serde(default = "default_format_command")]
    pub command: Vec<String>,
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self {
            command: default_format_command(),
        }
    }
}

fn default_format_command() -> Vec<String> {
    vec!["black".to_owned(), "--quiet".to_owned()]
}

// ---------------------------------------------------------------------------
// DiscoveryConfig
// ---------------------------------------------------------------------------

/// Where migrations are searched for.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DiscoveryConfig {
    /// Glob patterns, relative to the project root, of paths to skip.
    /// Setting this replaces the defaults.
    #[serde(default = "default_exclude")]
    pub exclude: Vec<String>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            exclude: default_exclude(),
        }
    }
}

fn default_exclude() -> Vec<String> {
    [
        "**/.git/**",
        "**/.venv/**",
        "**/venv/**",
        "**/.tox/**",
        "**/site-packages/**",
        "**/node_modules/**",
    ]
    .into_iter()
    .map(str::to_owned)
    .collect()
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Error loading a configuration file.
#[derive(Debug)]
pub struct ConfigError {
    /// The path that was being loaded (if available).
    pub path: Option<std::path::PathBuf>,
    /// Human-readable message with line-level detail when possible.
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(p) = &self.path {
            write!(f, "{}: {}", p.display(), self.message)
        } else {
            write!(f, "config error: {}", self.message)
        }
    }
}

impl std::error::Error for ConfigError {}

impl DarConfig {
    /// Load configuration from `<root>/.dar.toml`.
    ///
    /// # Errors
    /// Returns `ConfigError` on I/O errors (other than not-found) or parse errors.
    pub fn load_from_root(root: &Path) -> Result<Self, ConfigError> {
        Self::load(&root.join(CONFIG_FILE))
    }

    /// Load configuration from a TOML file.
    ///
    /// - If the file does not exist, returns all defaults (not an error).
    /// - If the file exists but contains invalid TOML or unknown fields,
    ///   returns a [`ConfigError`] with line-level detail.
    ///
    /// # Errors
    /// Returns `ConfigError` on I/O errors (other than not-found) or parse errors.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(ConfigError {
                    path: Some(path.to_owned()),
                    message: format!("could not read file: {e}"),
                });
            }
        };
        Self::parse(&contents).map_err(|mut e| {
            e.path = Some(path.to_owned());
            e
        })
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    /// Returns `ConfigError` on invalid TOML or unknown fields.
    pub fn parse(toml_str: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml_str).map_err(|e| {
            let mut message = e.message().to_owned();
            if let Some(span) = e.span() {
                let line = toml_str[..span.start]
                    .chars()
                    .filter(|&c| c == '\n')
                    .count()
                    + 1;
                message = format!("line {line}: {message}");
            }
            ConfigError {
                path: None,
                message,
            }
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
