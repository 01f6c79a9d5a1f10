use serde::Serialize;

use super::task::{TaskId, TaskRecord};

/// Maximum nesting level. Roots are level 0; a node at this level never has
/// children in a built tree and cannot gain subtasks.
pub const MAX_DEPTH: usize = 4;

/// A task placed in the derived hierarchy. Rebuilt from the flat records on
/// every structural change and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreeNode {
    pub record: TaskRecord,
    /// Nesting depth (0 = root)
    pub level: usize,
    /// Last sibling under its parent (or last root)
    pub is_last: bool,
    pub has_children: bool,
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    pub fn id(&self) -> &TaskId {
        &self.record.id
    }

    /// Number of nodes below this one in the built tree
    pub fn descendant_count(&self) -> usize {
        self.children
            .iter()
            .map(|c| 1 + c.descendant_count())
            .sum()
    }
}
