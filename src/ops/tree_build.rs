use std::collections::HashMap;

use tracing::{debug, warn};

use crate::model::task::{TaskId, TaskRecord};
use crate::model::tree::{MAX_DEPTH, TreeNode};

/// The built forest plus what the builder had to work around
#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    pub roots: Vec<TreeNode>,
    /// Each detected parent cycle, members in input order. The first member was
    /// promoted to root.
    pub cycles: Vec<Vec<TaskId>>,
    /// Records deeper than `MAX_DEPTH`, left out of the tree
    pub excluded: Vec<TaskId>,
    /// Records whose parent id does not resolve (placed as roots)
    pub orphans: Vec<TaskId>,
    /// Ids that appeared more than once; only the first occurrence is used
    pub duplicates: Vec<TaskId>,
}

/// Turn flat records into a forest of root nodes.
///
/// Sibling order is the input order; callers sort beforehand.
pub fn build_hierarchy(records: &[TaskRecord]) -> Vec<TreeNode> {
    build_hierarchy_with_report(records).roots
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Walk {
    Unvisited,
    OnPath,
    Done,
}

pub fn build_hierarchy_with_report(records: &[TaskRecord]) -> BuildReport {
    let mut report = BuildReport::default();

    // Index by id; later duplicates are dropped
    let mut index: HashMap<&TaskId, usize> = HashMap::with_capacity(records.len());
    let mut live = vec![true; records.len()];
    for (i, record) in records.iter().enumerate() {
        if index.contains_key(&record.id) {
            warn!(task_id = %record.id, "duplicate task id, ignoring later record");
            report.duplicates.push(record.id.clone());
            live[i] = false;
        } else {
            index.insert(&record.id, i);
        }
    }

    let mut parent: Vec<Option<usize>> = records
        .iter()
        .enumerate()
        .map(|(i, record)| {
            if !live[i] {
                return None;
            }
            let pid = record.parent_task_id.as_ref()?;
            match index.get(pid) {
                Some(&p) => Some(p),
                None => {
                    debug!(task_id = %record.id, parent_id = %pid, "parent not found, placing task at root");
                    report.orphans.push(record.id.clone());
                    None
                }
            }
        })
        .collect();

    break_cycles(records, &live, &mut parent, &mut report);

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); records.len()];
    let mut roots = Vec::new();
    for i in (0..records.len()).filter(|&i| live[i]) {
        match parent[i] {
            Some(p) => children[p].push(i),
            None => roots.push(i),
        }
    }

    let mut visited = vec![false; records.len()];
    let mut builder = Builder {
        records,
        children: &children,
        visited: &mut visited,
        excluded: &mut report.excluded,
    };
    report.roots = builder.build_group(&roots, 0);

    if !report.excluded.is_empty() {
        debug!(count = report.excluded.len(), "records below the maximum depth left out of the tree");
    }
    report
}

/// Follow parent links from every record; when a walk runs back into its own
/// path, promote the cycle member that comes first in input order to root.
fn break_cycles(
    records: &[TaskRecord],
    live: &[bool],
    parent: &mut [Option<usize>],
    report: &mut BuildReport,
) {
    let mut state = vec![Walk::Unvisited; records.len()];
    for start in 0..records.len() {
        if !live[start] || state[start] != Walk::Unvisited {
            continue;
        }
        let mut path = Vec::new();
        let mut current = start;
        loop {
            state[current] = Walk::OnPath;
            path.push(current);
            let Some(p) = parent[current] else { break };
            match state[p] {
                Walk::Unvisited => current = p,
                Walk::Done => break,
                Walk::OnPath => {
                    let from = path.iter().position(|&i| i == p).unwrap_or(0);
                    let mut members: Vec<usize> = path[from..].to_vec();
                    members.sort_unstable();
                    let promoted = members[0];
                    parent[promoted] = None;
                    let ids: Vec<TaskId> = members.iter().map(|&i| records[i].id.clone()).collect();
                    warn!(
                        task_id = %records[promoted].id,
                        cycle = ?ids.iter().map(TaskId::as_str).collect::<Vec<_>>(),
                        "structural cycle in parent links, promoting task to root"
                    );
                    report.cycles.push(ids);
                    break;
                }
            }
        }
        for i in path {
            state[i] = Walk::Done;
        }
    }
}

struct Builder<'a> {
    records: &'a [TaskRecord],
    children: &'a [Vec<usize>],
    visited: &'a mut [bool],
    excluded: &'a mut Vec<TaskId>,
}

impl Builder<'_> {
    fn build_group(&mut self, group: &[usize], level: usize) -> Vec<TreeNode> {
        let mut nodes = Vec::with_capacity(group.len());
        for &i in group {
            if self.visited[i] {
                warn!(task_id = %self.records[i].id, "task reached twice while building, skipping");
                continue;
            }
            self.visited[i] = true;
            nodes.push(self.build_node(i, level));
        }
        let count = nodes.len();
        for (pos, node) in nodes.iter_mut().enumerate() {
            node.is_last = pos + 1 == count;
        }
        nodes
    }

    fn build_node(&mut self, i: usize, level: usize) -> TreeNode {
        let children = if level >= MAX_DEPTH {
            self.exclude_below(i);
            Vec::new()
        } else {
            let all = self.children;
            self.build_group(&all[i], level + 1)
        };
        TreeNode {
            record: self.records[i].clone(),
            level,
            is_last: false,
            has_children: !children.is_empty(),
            children,
        }
    }

    fn exclude_below(&mut self, i: usize) {
        let all = self.children;
        for &c in &all[i] {
            if self.visited[c] {
                continue;
            }
            self.visited[c] = true;
            self.excluded.push(self.records[c].id.clone());
            self.exclude_below(c);
        }
    }
}

/// Visit every node of a forest, pre-order
pub fn walk<'a>(roots: &'a [TreeNode], f: &mut dyn FnMut(&'a TreeNode)) {
    for node in roots {
        f(node);
        walk(&node.children, f);
    }
}

/// Find a node anywhere in a forest
pub fn find_node<'a>(roots: &'a [TreeNode], id: &TaskId) -> Option<&'a TreeNode> {
    for node in roots {
        if node.id() == id {
            return Some(node);
        }
        if let Some(found) = find_node(&node.children, id) {
            return Some(found);
        }
    }
    None
}

/// Total number of nodes in a forest
pub fn node_count(roots: &[TreeNode]) -> usize {
    roots.iter().map(|n| 1 + n.descendant_count()).sum()
}
