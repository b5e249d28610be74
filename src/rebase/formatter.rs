//! Best-effort code formatting of rewritten migrations.
//!
//! Formatting is cosmetic. The rewriter logs formatter failures and carries
//! on; a missing formatter binary is not an error.

use std::fmt;
use std::io;
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};

/// A post-processing hook run on each rewritten file.
pub trait Formatter {
    /// Format the file at `path` in place.
    ///
    /// # Errors
    /// Returns a [`FormatterError`] when the formatter is missing or fails.
    /// Callers treat every error as non-fatal.
    fn format(&self, path: &Path) -> Result<(), FormatterError>;
}

/// Why a formatter run did not succeed.
#[derive(Debug)]
pub enum FormatterError {
    /// The formatter program is not installed.
    NotInstalled(String),
    /// The formatter ran and exited unsuccessfully.
    Failed(ExitStatus),
    /// The formatter could not be started.
    Io(io::Error),
}

impl fmt::Display for FormatterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotInstalled(program) => write!(f, "formatter '{program}' is not installed"),
            Self::Failed(status) => write!(f, "formatter exited with {status}"),
            Self::Io(err) => write!(f, "failed to run formatter: {err}"),
        }
    }
}

impl std::error::Error for FormatterError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

/// Runs an external program with the file path appended to its arguments.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandFormatter {
    program: String,
    args: Vec<String>,
}

impl CommandFormatter {
    /// Build from a command line such as `["black", "--quiet"]`.
    ///
    /// Returns `None` for an empty command, which disables formatting.
    #[must_use]
    pub fn from_command(command: &[String]) -> Option<Self> {
        let (program, args) = command.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }
}

impl Formatter for CommandFormatter {
    fn format(&self, path: &Path) -> Result<(), FormatterError> {
        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|e| {
                if e.kind() == io::ErrorKind::NotFound {
                    FormatterError::NotInstalled(self.program.clone())
                } else {
                    FormatterError::Io(e)
                }
            })?;
        if status.success() {
            Ok(())
        } else {
            Err(FormatterError::Failed(status))
        }
    }
}

/// Does nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoFormatter;

impl Formatter for NoFormatter {
    fn format(&self, _path: &Path) -> Result<(), FormatterError> {
        Ok(())
    }
}
