//! Branch divergence between two leaf migrations.
//!
//! Both leaves' forward plans are narrowed to one application and walked in
//! lock-step. The last position where they agree is the common base; the
//! rest of the remote plan is the sequence of migrations to rebase.

use serde::Serialize;

use crate::error::RebaseError;
use crate::graph::MigrationGraph;
use crate::model::MigrationNode;

/// The result of diffing two branches of one application.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RebasePlan {
    /// The application both branches belong to.
    pub app_label: String,
    /// The leaf being rebased onto.
    pub local: MigrationNode,
    /// The leaf being rebased.
    pub remote: MigrationNode,
    /// The last migration both branches share.
    pub base: MigrationNode,
    /// Remote-branch migrations after `base`, in dependency order.
    pub to_rebase: Vec<MigrationNode>,
}

impl RebasePlan {
    /// Returns `true` if the remote branch has nothing past the base.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.to_rebase.is_empty()
    }
}

/// Keep only the migrations of `app_label`, preserving order.
#[must_use]
pub fn filter_app(app_label: &str, plan: Vec<MigrationNode>) -> Vec<MigrationNode> {
    plan.into_iter()
        .filter(|node| node.is_in_app(app_label))
        .collect()
}

/// Compute the common base of `local` and `remote` and the remote migrations
/// that have to be rebased onto `local`.
///
/// Dependencies on other applications are dropped from both plans before
/// comparing; they cannot fork this application's chain.
///
/// # Errors
/// [`RebaseError::NoCommonBase`] if the plans differ at the first position,
/// or a graph error if either node cannot be planned.
pub fn compute_rebase_plan(
    graph: &dyn MigrationGraph,
    app_label: &str,
    local: &MigrationNode,
    remote: &MigrationNode,
) -> Result<RebasePlan, RebaseError> {
    let local_plan = filter_app(app_label, graph.forward_plan(local)?);
    let mut remote_plan = filter_app(app_label, graph.forward_plan(remote)?);

    let shared = local_plan
        .iter()
        .zip(&remote_plan)
        .take_while(|(l, r)| l == r)
        .count();
    if shared == 0 {
        return Err(RebaseError::NoCommonBase {
            local: local.clone(),
            remote: remote.clone(),
        });
    }

    let to_rebase = remote_plan.split_off(shared);
    let base = remote_plan.swap_remove(shared - 1);

    tracing::debug!(
        %base,
        count = to_rebase.len(),
        "computed divergence of {local} and {remote}"
    );

    Ok(RebasePlan {
        app_label: app_label.to_owned(),
        local: local.clone(),
        remote: remote.clone(),
        base,
        to_rebase,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
