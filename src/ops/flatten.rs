use std::collections::HashSet;

use tracing::warn;

use crate::model::task::TaskId;
use crate::model::tree::TreeNode;
use crate::ops::store::TaskStore;

/// A visible row with what a renderer needs to draw connector lines
#[derive(Debug, Clone)]
pub struct FlatRow<'a> {
    pub node: &'a TreeNode,
    pub is_expanded: bool,
    /// For each ancestor (root first): whether it is the last sibling, i.e.
    /// whether its continuation line stops
    pub ancestor_last: Vec<bool>,
}

/// Visible nodes in render order: each node, then its children only when its
/// id is in `expanded`. Collapsed subtrees are never entered.
pub fn flatten<'a>(roots: &'a [TreeNode], expanded: &HashSet<TaskId>) -> Vec<&'a TreeNode> {
    let mut out = Vec::new();
    flatten_inner(roots, expanded, &mut out);
    out
}

fn flatten_inner<'a>(nodes: &'a [TreeNode], expanded: &HashSet<TaskId>, out: &mut Vec<&'a TreeNode>) {
    for node in nodes {
        out.push(node);
        if node.has_children && expanded.contains(node.id()) {
            flatten_inner(&node.children, expanded, out);
        }
    }
}

/// Like [`flatten`], carrying expansion and connector state per row
pub fn flatten_rows<'a>(roots: &'a [TreeNode], expanded: &HashSet<TaskId>) -> Vec<FlatRow<'a>> {
    let mut rows = Vec::new();
    flatten_rows_inner(roots, expanded, &mut rows, &[]);
    rows
}

fn flatten_rows_inner<'a>(
    nodes: &'a [TreeNode],
    expanded: &HashSet<TaskId>,
    rows: &mut Vec<FlatRow<'a>>,
    ancestor_last: &[bool],
) {
    for node in nodes {
        let is_expanded = node.has_children && expanded.contains(node.id());
        rows.push(FlatRow {
            node,
            is_expanded,
            ancestor_last: ancestor_last.to_vec(),
        });
        if is_expanded {
            let mut next = ancestor_last.to_vec();
            next.push(node.is_last);
            flatten_rows_inner(&node.children, expanded, rows, &next);
        }
    }
}

/// Return `expanded` plus every ancestor of `target`, so the target is visible
/// after flattening. The input set is left untouched.
pub fn expand_ancestors(
    store: &TaskStore,
    target: &TaskId,
    expanded: &HashSet<TaskId>,
) -> HashSet<TaskId> {
    let mut next = expanded.clone();
    let mut seen: HashSet<&TaskId> = HashSet::new();
    let mut current = target;
    seen.insert(current);
    while let Some(parent) = store.parent_of(current) {
        if !seen.insert(&parent.id) {
            warn!(task_id = %target, "structural cycle while revealing task");
            break;
        }
        next.insert(parent.id.clone());
        current = &parent.id;
    }
    next
}

/// Every id in the forest that has children
pub fn expand_all(roots: &[TreeNode]) -> HashSet<TaskId> {
    let mut set = HashSet::new();
    crate::ops::tree_build::walk(roots, &mut |n| {
        if n.has_children {
            set.insert(n.id().clone());
        }
    });
    set
}

/// Flip one id in a copy of the expanded set
pub fn toggle(expanded: &HashSet<TaskId>, id: &TaskId) -> HashSet<TaskId> {
    let mut next = expanded.clone();
    if !next.remove(id) {
        next.insert(id.clone());
    }
    next
}
