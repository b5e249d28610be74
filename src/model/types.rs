//! Core migration types.
//!
//! A migration is identified by its application label and its name. Names
//! follow the `<sequence>_<suffix>` convention (`0002_reporter_handle`); the
//! sequence number is advisory and only consulted when computing the next
//! number during a rebase.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// MigrationNode
// ---------------------------------------------------------------------------

/// A single migration, identified by `(app_label, name)`.
///
/// Ordering is lexicographic by app label, then name. It is only used to
/// produce stable diagnostics; graph order never depends on it.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MigrationNode {
    /// Application label (`testapp`).
    pub app_label: String,
    /// Migration name (`0001_initial`).
    pub name: String,
}

impl MigrationNode {
    /// Create a node from an app label and migration name.
    pub fn new(app_label: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            app_label: app_label.into(),
            name: name.into(),
        }
    }

    /// The same migration under a different name.
    #[must_use]
    pub fn with_name(&self, name: impl Into<String>) -> Self {
        Self {
            app_label: self.app_label.clone(),
            name: name.into(),
        }
    }

    /// Returns `true` if this node belongs to `app_label`.
    #[must_use]
    pub fn is_in_app(&self, app_label: &str) -> bool {
        self.app_label == app_label
    }

    /// The numeric prefix of the name.
    ///
    /// # Errors
    /// Returns a [`ValidationError`] if the part before the first `_` is
    /// empty or not entirely ASCII digits.
    pub fn sequence_number(&self) -> Result<u32, ValidationError> {
        sequence_number(&self.name)
    }

    /// The descriptive part of the name (everything after the first `_`).
    #[must_use]
    pub fn suffix(&self) -> &str {
        self.name.split_once('_').map_or("", |(_, suffix)| suffix)
    }
}

impl fmt::Display for MigrationNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.app_label, self.name)
    }
}

// ---------------------------------------------------------------------------
// Naming
// ---------------------------------------------------------------------------

/// Parse the sequence number from a migration name.
///
/// # Errors
/// Returns a [`ValidationError`] if the prefix is not a valid number.
pub fn sequence_number(name: &str) -> Result<u32, ValidationError> {
    let prefix = name.split_once('_').map_or(name, |(prefix, _)| prefix);
    if prefix.is_empty() || !prefix.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ValidationError {
            value: name.to_owned(),
            reason: "name must start with a numeric sequence, e.g. 0002_add_field".to_owned(),
        });
    }
    prefix.parse().map_err(|e| ValidationError {
        value: name.to_owned(),
        reason: format!("sequence number out of range: {e}"),
    })
}

/// Compute the name `original_name` takes when stacked directly on `head_name`.
///
/// The new sequence number is the head's number plus one, zero-padded to four
/// digits, followed by the original's suffix. The original's own number is
/// ignored.
///
/// # Errors
/// Returns a [`ValidationError`] if `head_name` has no numeric prefix.
pub fn renumber(head_name: &str, original_name: &str) -> Result<String, ValidationError> {
    let next = sequence_number(head_name)?
        .checked_add(1)
        .ok_or_else(|| ValidationError {
            value: head_name.to_owned(),
            reason: "sequence number overflow".to_owned(),
        })?;
    match original_name.split_once('_') {
        Some((_, suffix)) => Ok(format!("{next:04}_{suffix}")),
        None => Ok(format!("{next:04}")),
    }
}

// ---------------------------------------------------------------------------
// ValidationError
// ---------------------------------------------------------------------------

/// A migration name that does not follow the `<sequence>_<suffix>` convention.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationError {
    /// The offending name.
    pub value: String,
    /// Why it was rejected.
    pub reason: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid migration name '{}': {}", self.value, self.reason)
    }
}

impl std::error::Error for ValidationError {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
