use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::model::task::{TaskId, TaskRecord};
use crate::model::tree::MAX_DEPTH;
use crate::ops::store::TaskStore;
use crate::ops::tree_build::build_hierarchy_with_report;

/// Structured result from `tt check`, suitable for --json output.
#[derive(Debug, Default, Serialize)]
pub struct CheckResult {
    pub valid: bool,
    pub errors: Vec<CheckError>,
    pub warnings: Vec<CheckWarning>,
}

/// A broken invariant in the stored records
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CheckError {
    /// Parent links form a loop
    Cycle { task_ids: Vec<TaskId> },
    /// The same id appears more than once
    DuplicateId { task_id: TaskId, count: usize },
    /// Nested deeper than the tree can show
    DepthExceeded { task_id: TaskId, depth: usize },
    /// Child due later than its parent
    DueAfterParent { task_id: TaskId, parent_id: TaskId },
}

/// A non-critical issue
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CheckWarning {
    /// Parent id does not resolve; shown as a root
    Orphan { task_id: TaskId, parent_id: TaskId },
    /// Open and past due
    Overdue { task_id: TaskId },
    /// Completed while a direct child is open, e.g. after the child was
    /// reopened; completing the parent again is blocked until it closes
    CompletedWithPendingChildren { task_id: TaskId, pending: usize },
}

/// Validate a record set and return structured results.
///
/// Read-only. Checks performed:
/// 1. No parent cycles
/// 2. No duplicate ids
/// 3. Nesting within `MAX_DEPTH`
/// 4. Child due dates within their parent's
/// 5. Warnings for orphans, overdue tasks and completed tasks with open
///    children
pub fn check_records(records: &[TaskRecord], today: NaiveDate) -> CheckResult {
    let mut result = CheckResult::default();

    let report = build_hierarchy_with_report(records);
    for cycle in report.cycles {
        result.errors.push(CheckError::Cycle { task_ids: cycle });
    }

    let mut counts: HashMap<&TaskId, usize> = HashMap::new();
    for r in records {
        *counts.entry(&r.id).or_default() += 1;
    }
    let mut seen_dup = Vec::new();
    for r in records {
        let count = counts[&r.id];
        if count > 1 && !seen_dup.contains(&&r.id) {
            seen_dup.push(&r.id);
            result.errors.push(CheckError::DuplicateId {
                task_id: r.id.clone(),
                count,
            });
        }
    }

    let store = TaskStore::from_records(records.iter().cloned());
    for task_id in &report.excluded {
        let depth = store.level_of(task_id).unwrap_or(MAX_DEPTH + 1);
        result.errors.push(CheckError::DepthExceeded {
            task_id: task_id.clone(),
            depth,
        });
    }

    for record in store.records() {
        check_record(record, &store, today, &mut result);
    }

    result.valid = result.errors.is_empty();
    result
}

fn check_record(record: &TaskRecord, store: &TaskStore, today: NaiveDate, result: &mut CheckResult) {
    if let Some(pid) = &record.parent_task_id {
        match store.get(pid) {
            None => result.warnings.push(CheckWarning::Orphan {
                task_id: record.id.clone(),
                parent_id: pid.clone(),
            }),
            Some(parent) => {
                if let (Some(child_due), Some(parent_due)) = (record.effective_due(), parent.effective_due())
                    && child_due > parent_due
                {
                    result.errors.push(CheckError::DueAfterParent {
                        task_id: record.id.clone(),
                        parent_id: pid.clone(),
                    });
                }
            }
        }
    }

    if record.completed {
        let pending = store
            .children_of(&record.id)
            .iter()
            .filter(|c| !c.completed)
            .count();
        if pending > 0 {
            result.warnings.push(CheckWarning::CompletedWithPendingChildren {
                task_id: record.id.clone(),
                pending,
            });
        }
    }

    if record.is_overdue(today) {
        result.warnings.push(CheckWarning::Overdue {
            task_id: record.id.clone(),
        });
    }
}
