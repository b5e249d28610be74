//! Migration data model.

pub mod types;

pub use types::{MigrationNode, ValidationError, renumber, sequence_number};
