//! The migration dependency graph.
//!
//! [`MigrationGraph`] is the read-only view the rebase needs: leaf nodes and
//! forward plans. [`InMemoryGraph`] implements it over adjacency maps and is
//! what the project loader produces.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;

use crate::model::MigrationNode;

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Read-only access to a migration dependency graph.
pub trait MigrationGraph {
    /// Returns `true` if `node` is part of the graph.
    fn contains(&self, node: &MigrationNode) -> bool;

    /// Nodes that no node of their own app depends on, sorted.
    ///
    /// Dependents in other apps don't count: a migration another app builds
    /// on is still the tip of its own app's history.
    fn leaf_nodes(&self) -> Vec<MigrationNode>;

    /// The ancestors of `node` from the root of its chain through `node`
    /// itself, dependencies before dependents.
    ///
    /// # Errors
    /// Returns [`GraphError::NodeNotFound`] if `node` (or one of its
    /// dependencies) is not in the graph, and
    /// [`GraphError::CircularDependency`] if the walk finds a cycle.
    fn forward_plan(&self, node: &MigrationNode) -> Result<Vec<MigrationNode>, GraphError>;
}

/// Leaf nodes of `graph` belonging to `app_label`, sorted.
pub fn app_leaf_nodes(graph: &dyn MigrationGraph, app_label: &str) -> Vec<MigrationNode> {
    graph
        .leaf_nodes()
        .into_iter()
        .filter(|node| node.is_in_app(app_label))
        .collect()
}

// ---------------------------------------------------------------------------
// GraphError
// ---------------------------------------------------------------------------

/// Errors raised while walking the graph.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GraphError {
    /// The node is not in the graph.
    NodeNotFound(MigrationNode),
    /// The dependency chain loops back on itself through this node.
    CircularDependency(MigrationNode),
}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NodeNotFound(node) => write!(f, "migration {node} is not in the graph"),
            Self::CircularDependency(node) => {
                write!(f, "circular dependency detected at migration {node}")
            }
        }
    }
}

impl std::error::Error for GraphError {}

// ---------------------------------------------------------------------------
// InMemoryGraph
// ---------------------------------------------------------------------------

/// A migration graph held in memory.
///
/// Edges run from a node to each of its dependencies. Adding a dependency on
/// a node that was never added registers that node implicitly.
#[derive(Clone, Debug, Default)]
pub struct InMemoryGraph {
    dependencies: BTreeMap<MigrationNode, BTreeSet<MigrationNode>>,
    dependents: BTreeMap<MigrationNode, BTreeSet<MigrationNode>>,
}

impl InMemoryGraph {
    /// An empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node with no dependencies (yet).
    pub fn add_node(&mut self, node: MigrationNode) {
        self.dependencies.entry(node.clone()).or_default();
        self.dependents.entry(node).or_default();
    }

    /// Record that `child` depends on `parent`.
    pub fn add_dependency(&mut self, child: &MigrationNode, parent: &MigrationNode) {
        self.add_node(child.clone());
        self.add_node(parent.clone());
        if let Some(deps) = self.dependencies.get_mut(child) {
            deps.insert(parent.clone());
        }
        if let Some(children) = self.dependents.get_mut(parent) {
            children.insert(child.clone());
        }
    }

    /// Nodes of `app_label` with no dependency inside the same app, sorted.
    #[must_use]
    pub fn app_root_nodes(&self, app_label: &str) -> Vec<MigrationNode> {
        self.dependencies
            .iter()
            .filter(|(node, deps)| {
                node.is_in_app(app_label) && !deps.iter().any(|dep| dep.is_in_app(app_label))
            })
            .map(|(node, _)| node.clone())
            .collect()
    }
}

impl MigrationGraph for InMemoryGraph {
    fn contains(&self, node: &MigrationNode) -> bool {
        self.dependencies.contains_key(node)
    }

    fn leaf_nodes(&self) -> Vec<MigrationNode> {
        self.dependents
            .iter()
            .filter(|(node, children)| {
                !children
                    .iter()
                    .any(|child| child.is_in_app(&node.app_label))
            })
            .map(|(node, _)| node.clone())
            .collect()
    }

    fn forward_plan(&self, target: &MigrationNode) -> Result<Vec<MigrationNode>, GraphError> {
        if !self.contains(target) {
            return Err(GraphError::NodeNotFound(target.clone()));
        }

        // Iterative post-order DFS. Dependencies are pushed in sorted order,
        // so the largest is expanded first; the result is deterministic.
        let mut plan = Vec::new();
        let mut done: HashSet<&MigrationNode> = HashSet::new();
        let mut on_path: HashSet<&MigrationNode> = HashSet::new();
        let mut stack: Vec<(&MigrationNode, bool)> = vec![(target, false)];

        while let Some((node, expanded)) = stack.pop() {
            if expanded {
                on_path.remove(node);
                if done.insert(node) {
                    plan.push(node.clone());
                }
                continue;
            }
            if done.contains(node) {
                continue;
            }
            if !on_path.insert(node) {
                return Err(GraphError::CircularDependency(node.clone()));
            }
            let deps = self
                .dependencies
                .get(node)
                .ok_or_else(|| GraphError::NodeNotFound(node.clone()))?;
            stack.push((node, true));
            for dep in deps {
                if on_path.contains(dep) {
                    return Err(GraphError::CircularDependency(dep.clone()));
                }
                if !done.contains(dep) {
                    stack.push((dep, false));
                }
            }
        }

        Ok(plan)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
