use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use tracing::warn;

use crate::model::task::{TaskId, TaskRecord};

/// A parent chain that revisits a node
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("structural cycle: parent chain of {task_id} revisits {revisited}")]
pub struct StructuralCycle {
    pub task_id: TaskId,
    pub revisited: TaskId,
}

/// In-memory collection of flat task records.
///
/// Keeps the caller's ordering (insertion order) and a parent → children index.
/// Holds no structural knowledge beyond that; the tree is derived elsewhere.
#[derive(Debug, Clone, Default)]
pub struct TaskStore {
    records: IndexMap<TaskId, TaskRecord>,
    by_parent: HashMap<TaskId, Vec<TaskId>>,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from records in caller order. Only the first record with
    /// a given id is kept, matching the tree builder.
    pub fn from_records(records: impl IntoIterator<Item = TaskRecord>) -> Self {
        let mut map: IndexMap<TaskId, TaskRecord> = IndexMap::new();
        for record in records {
            if map.contains_key(&record.id) {
                warn!(task_id = %record.id, "duplicate task id, ignoring later record");
                continue;
            }
            map.insert(record.id.clone(), record);
        }
        let mut store = TaskStore {
            records: map,
            by_parent: HashMap::new(),
        };
        store.reindex();
        store
    }

    fn reindex(&mut self) {
        self.by_parent.clear();
        for record in self.records.values() {
            if let Some(parent) = &record.parent_task_id {
                self.by_parent
                    .entry(parent.clone())
                    .or_default()
                    .push(record.id.clone());
            }
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: &TaskId) -> Option<&TaskRecord> {
        self.records.get(id)
    }

    pub fn contains(&self, id: &TaskId) -> bool {
        self.records.contains_key(id)
    }

    /// Records in caller order
    pub fn records(&self) -> impl Iterator<Item = &TaskRecord> {
        self.records.values()
    }

    pub fn to_vec(&self) -> Vec<TaskRecord> {
        self.records.values().cloned().collect()
    }

    /// Direct children of `id`, in caller order
    pub fn children_of(&self, id: &TaskId) -> Vec<&TaskRecord> {
        self.by_parent
            .get(id)
            .map(|ids| ids.iter().filter_map(|c| self.records.get(c)).collect())
            .unwrap_or_default()
    }

    /// Records whose parent is absent or does not resolve
    pub fn roots(&self) -> Vec<&TaskRecord> {
        self.records
            .values()
            .filter(|r| {
                r.parent_task_id
                    .as_ref()
                    .is_none_or(|p| !self.records.contains_key(p))
            })
            .collect()
    }

    /// Resolved parent record, if any
    pub fn parent_of(&self, id: &TaskId) -> Option<&TaskRecord> {
        let parent = self.records.get(id)?.parent_task_id.as_ref()?;
        self.records.get(parent)
    }

    /// Insert or replace a record. A replaced record keeps its position.
    pub fn upsert(&mut self, record: TaskRecord) {
        self.records.insert(record.id.clone(), record);
        self.reindex();
    }

    /// Modify a record in place. Returns false if the id is unknown.
    pub fn update(&mut self, id: &TaskId, f: impl FnOnce(&mut TaskRecord)) -> bool {
        let Some(record) = self.records.get_mut(id) else {
            return false;
        };
        f(record);
        self.reindex();
        true
    }

    pub fn remove(&mut self, id: &TaskId) -> Option<TaskRecord> {
        let removed = self.records.shift_remove(id);
        if removed.is_some() {
            self.reindex();
        }
        removed
    }

    /// Remove a record and everything below it. Returns the removed records,
    /// the requested one first.
    pub fn remove_subtree(&mut self, id: &TaskId) -> Vec<TaskRecord> {
        if !self.records.contains_key(id) {
            return Vec::new();
        }
        let mut ids = vec![id.clone()];
        ids.extend(self.descendants(id));
        let removed: Vec<TaskRecord> = ids
            .iter()
            .filter_map(|i| self.records.shift_remove(i))
            .collect();
        self.reindex();
        removed
    }

    /// Ancestor ids of `id`, nearest first. Stops at a parent that does not
    /// resolve (the orphan is its own root).
    pub fn ancestors(&self, id: &TaskId) -> Result<Vec<TaskId>, StructuralCycle> {
        let mut chain = Vec::new();
        let mut seen: HashSet<&TaskId> = HashSet::new();
        let Some(mut current) = self.records.get(id) else {
            return Ok(chain);
        };
        seen.insert(&current.id);
        while let Some(parent_id) = &current.parent_task_id {
            let Some(parent) = self.records.get(parent_id) else {
                break;
            };
            if !seen.insert(&parent.id) {
                return Err(StructuralCycle {
                    task_id: id.clone(),
                    revisited: parent.id.clone(),
                });
            }
            chain.push(parent.id.clone());
            current = parent;
        }
        Ok(chain)
    }

    /// Nesting level from the parent chain. A cyclic chain is promoted to root.
    pub fn level_of(&self, id: &TaskId) -> Option<usize> {
        if !self.records.contains_key(id) {
            return None;
        }
        match self.ancestors(id) {
            Ok(chain) => Some(chain.len()),
            Err(cycle) => {
                warn!(task_id = %cycle.task_id, revisited = %cycle.revisited, "structural cycle, treating task as root");
                Some(0)
            }
        }
    }

    /// All ids below `id`, pre-order
    pub fn descendants(&self, id: &TaskId) -> Vec<TaskId> {
        let mut out = Vec::new();
        let mut seen: HashSet<TaskId> = HashSet::new();
        seen.insert(id.clone());
        self.collect_descendants(id, &mut seen, &mut out);
        out
    }

    fn collect_descendants(&self, id: &TaskId, seen: &mut HashSet<TaskId>, out: &mut Vec<TaskId>) {
        let Some(children) = self.by_parent.get(id) else {
            return;
        };
        for child in children {
            if !seen.insert(child.clone()) {
                continue;
            }
            out.push(child.clone());
            self.collect_descendants(child, seen, out);
        }
    }

    /// Next free id of the form `PREFIX-NNN`, one past the highest number
    /// already used with that prefix
    pub fn next_id(&self, prefix: &str) -> TaskId {
        let prefix_dash = format!("{}-", prefix);
        let max = self
            .records
            .keys()
            .filter_map(|id| id.as_str().strip_prefix(&prefix_dash))
            .filter_map(|n| n.parse::<usize>().ok())
            .max()
            .unwrap_or(0);
        TaskId::new(format!("{}{:03}", prefix_dash, max + 1))
    }

    /// Project and section `record` belongs to. A field the record leaves
    /// empty is taken from the nearest ancestor that sets it.
    pub fn placement<'a>(&'a self, record: &'a TaskRecord) -> (Option<&'a str>, Option<&'a str>) {
        let mut project = record.project_id.as_deref();
        let mut section = record.section_id.as_deref();
        let mut seen: HashSet<&TaskId> = HashSet::new();
        seen.insert(&record.id);
        let mut next = record.parent_task_id.as_ref();
        while project.is_none() || section.is_none() {
            let Some(parent) = next.and_then(|pid| self.records.get(pid)) else {
                break;
            };
            if !seen.insert(&parent.id) {
                break;
            }
            project = project.or(parent.project_id.as_deref());
            section = section.or(parent.section_id.as_deref());
            next = parent.parent_task_id.as_ref();
        }
        (project, section)
    }

    /// Depth of the subtree below `id` (0 for a leaf)
    pub fn subtree_height(&self, id: &TaskId) -> usize {
        let mut seen: HashSet<TaskId> = HashSet::new();
        seen.insert(id.clone());
        self.height_inner(id, &mut seen)
    }

    fn height_inner(&self, id: &TaskId, seen: &mut HashSet<TaskId>) -> usize {
        let Some(children) = self.by_parent.get(id) else {
            return 0;
        };
        let mut height = 0;
        for child in children {
            if !seen.insert(child.clone()) {
                continue;
            }
            height = height.max(1 + self.height_inner(child, seen));
        }
        height
    }
}
