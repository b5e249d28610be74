//! Dependency declarations inside migration source files.
//!
//! A migration file declares its parents in a class attribute:
//!
//! ```python
//! class Migration(migrations.Migration):
//!     dependencies = [
//!         ("testapp", "0001_initial"),
//!         migrations.swappable_dependency(settings.AUTH_USER_MODEL),
//!     ]
//! ```
//!
//! The file is parsed with tree-sitter and the list is turned into entries
//! with byte spans. Rewrites splice new text into those spans only, so the
//! rest of the file (operations, imports, comments, quote style) is kept
//! byte for byte.

use std::fmt;
use std::ops::Range;

use tree_sitter::{Node, Parser, Tree};

use crate::model::MigrationNode;

const DEPENDENCIES_ATTR: &str = "dependencies";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// The parsed `dependencies = [...]` attribute of a migration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Declaration {
    /// Byte span of the list literal (brackets included).
    pub span: Range<usize>,
    /// Entries in source order.
    pub entries: Vec<DependencyEntry>,
}

/// One element of a dependency list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DependencyEntry {
    /// A literal `(app_label, name)` tuple.
    Pair {
        /// The referenced migration.
        node: MigrationNode,
        /// Byte span of the app label's string contents (quotes excluded).
        app_span: Range<usize>,
        /// Byte span of the name's string contents (quotes excluded).
        name_span: Range<usize>,
    },
    /// Anything else, e.g. `migrations.swappable_dependency(...)`.
    Other {
        /// Source text of the entry.
        text: String,
    },
}

impl DependencyEntry {
    /// The referenced migration, if this entry is a literal pair.
    #[must_use]
    pub const fn node(&self) -> Option<&MigrationNode> {
        match self {
            Self::Pair { node, .. } => Some(node),
            Self::Other { .. } => None,
        }
    }
}

impl Declaration {
    /// Literal `(app, name)` dependencies, in source order.
    pub fn nodes(&self) -> impl Iterator<Item = &MigrationNode> {
        self.entries.iter().filter_map(DependencyEntry::node)
    }
}

// ---------------------------------------------------------------------------
// DeclarationError
// ---------------------------------------------------------------------------

/// Errors from parsing or rewriting a dependency declaration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeclarationError {
    /// The Python grammar could not be loaded.
    ParserSetup(String),
    /// tree-sitter returned no tree.
    ParseFailed,
    /// No `dependencies = [...]` attribute was found.
    NotFound,
    /// The attribute exists but its value is not a well-formed list.
    Malformed,
    /// The list has no entry for the migration being replaced.
    DependencyNotFound(MigrationNode),
}

impl fmt::Display for DeclarationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ParserSetup(msg) => write!(f, "parser setup failed: {msg}"),
            Self::ParseFailed => write!(f, "failed to parse migration source"),
            Self::NotFound => write!(f, "no dependencies declaration found"),
            Self::Malformed => write!(f, "dependencies declaration is not a plain list"),
            Self::DependencyNotFound(node) => {
                write!(f, "no dependency on {node} in the dependencies declaration")
            }
        }
    }
}

impl std::error::Error for DeclarationError {}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

fn parse_tree(source: &str) -> Result<Tree, DeclarationError> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_python::LANGUAGE.into())
        .map_err(|e| DeclarationError::ParserSetup(format!("{e}")))?;
    parser
        .parse(source, None)
        .ok_or(DeclarationError::ParseFailed)
}

/// Parse the dependency declaration of a migration file.
///
/// Returns `Ok(None)` when the file has no `dependencies` attribute, which is
/// legal for initial migrations.
///
/// # Errors
/// Returns [`DeclarationError::Malformed`] if the attribute's value is not a
/// list or tuple literal, or contains syntax errors.
pub fn parse(source: &str) -> Result<Option<Declaration>, DeclarationError> {
    let tree = parse_tree(source)?;
    let Some(value) = find_dependencies_value(tree.root_node(), source) else {
        return Ok(None);
    };
    if !matches!(value.kind(), "list" | "tuple") || value.has_error() {
        return Err(DeclarationError::Malformed);
    }

    let mut entries = Vec::new();
    for i in 0..value.named_child_count() {
        let Some(child) = value.named_child(i) else { continue };
        if child.kind() == "comment" {
            continue;
        }
        entries.push(parse_entry(child, source));
    }

    Ok(Some(Declaration {
        span: value.byte_range(),
        entries,
    }))
}

/// Locate the right-hand side of `dependencies = ...` in a class body.
fn find_dependencies_value<'tree>(root: Node<'tree>, source: &str) -> Option<Node<'tree>> {
    for i in 0..root.named_child_count() {
        let Some(item) = root.named_child(i) else { continue };
        let class = match item.kind() {
            "class_definition" => item,
            "decorated_definition" => match item.child_by_field_name("definition") {
                Some(def) if def.kind() == "class_definition" => def,
                _ => continue,
            },
            _ => continue,
        };
        let Some(body) = class.child_by_field_name("body") else { continue };
        for j in 0..body.named_child_count() {
            let Some(stmt) = body.named_child(j) else { continue };
            if stmt.kind() != "expression_statement" {
                continue;
            }
            let Some(assignment) = stmt.named_child(0) else { continue };
            if assignment.kind() != "assignment" {
                continue;
            }
            let is_dependencies = assignment
                .child_by_field_name("left")
                .is_some_and(|left| {
                    left.kind() == "identifier" && &source[left.byte_range()] == DEPENDENCIES_ATTR
                });
            if is_dependencies {
                return assignment.child_by_field_name("right");
            }
        }
    }
    None
}

fn parse_entry(node: Node<'_>, source: &str) -> DependencyEntry {
    let other = || DependencyEntry::Other {
        text: source[node.byte_range()].to_owned(),
    };
    if node.kind() != "tuple" {
        return other();
    }
    let mut strings = Vec::new();
    for i in 0..node.named_child_count() {
        let Some(child) = node.named_child(i) else { continue };
        match child.kind() {
            "comment" => {}
            "string" => match string_contents(child, source) {
                Some(span) => strings.push(span),
                None => return other(),
            },
            _ => return other(),
        }
    }
    let Ok([app_span, name_span]) = <[Range<usize>; 2]>::try_from(strings) else {
        return other();
    };
    DependencyEntry::Pair {
        node: MigrationNode::new(&source[app_span.clone()], &source[name_span.clone()]),
        app_span,
        name_span,
    }
}

/// Byte span between the opening and closing quotes of a plain string
/// literal. Prefixed literals (f-strings, bytes) and interpolations yield
/// `None`.
fn string_contents(node: Node<'_>, source: &str) -> Option<Range<usize>> {
    let count = node.child_count();
    if count < 2 {
        return None;
    }
    let start = node.child(0)?;
    let end = node.child(count - 1)?;
    if start.kind() != "string_start" || end.kind() != "string_end" {
        return None;
    }
    let prefix = &source[start.byte_range()];
    if prefix.chars().any(|c| matches!(c, 'f' | 'F' | 'b' | 'B')) {
        return None;
    }
    for i in 0..count {
        let Some(child) = node.child(i) else { continue };
        if child.kind() == "interpolation" {
            return None;
        }
    }
    Some(start.end_byte()..end.start_byte())
}

// ---------------------------------------------------------------------------
// Rewriting
// ---------------------------------------------------------------------------

/// Replace the dependency on `from` with a dependency on `to`.
///
/// Only the string contents of the matching tuple change; quotes,
/// whitespace, comments and every other entry are kept as they are. All
/// entries equal to `from` are replaced.
///
/// # Errors
/// [`DeclarationError::NotFound`] if the file has no declaration,
/// [`DeclarationError::DependencyNotFound`] if no entry matches `from`.
pub fn replace_dependency(
    source: &str,
    from: &MigrationNode,
    to: &MigrationNode,
) -> Result<String, DeclarationError> {
    let declaration = parse(source)?.ok_or(DeclarationError::NotFound)?;

    let mut edits: Vec<(Range<usize>, &str)> = Vec::new();
    for entry in &declaration.entries {
        if let DependencyEntry::Pair {
            node,
            app_span,
            name_span,
        } = entry
            && node == from
        {
            edits.push((app_span.clone(), to.app_label.as_str()));
            edits.push((name_span.clone(), to.name.as_str()));
        }
    }
    if edits.is_empty() {
        return Err(DeclarationError::DependencyNotFound(from.clone()));
    }

    Ok(splice(source, edits))
}

/// Replace the whole dependency list with a single dependency on `to`.
///
/// # Errors
/// [`DeclarationError::NotFound`] if the file has no declaration.
pub fn replace_all_dependencies(
    source: &str,
    to: &MigrationNode,
) -> Result<String, DeclarationError> {
    let declaration = parse(source)?.ok_or(DeclarationError::NotFound)?;
    let replacement = format!("[(\"{}\", \"{}\")]", to.app_label, to.name);
    Ok(splice(source, vec![(declaration.span, replacement.as_str())]))
}

/// Apply non-overlapping edits, back to front so earlier spans stay valid.
fn splice(source: &str, mut edits: Vec<(Range<usize>, &str)>) -> String {
    edits.sort_by_key(|(span, _)| std::cmp::Reverse(span.start));
    let mut out = source.to_owned();
    for (span, text) in edits {
        out.replace_range(span, text);
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
