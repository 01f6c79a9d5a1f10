use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::model::task::{DueDate, TaskId, TaskRecord};
use crate::ops::store::TaskStore;
use crate::ops::validate::{self, Rejection};

/// A change to the record set, as submitted to the backing store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Mutation {
    /// New task; a parent id makes it a subtask
    Create { record: TaskRecord },
    SetDueDate { id: TaskId, due: Option<DueDate> },
    SetCompleted { id: TaskId, completed: bool },
    /// Move a task and its whole subtree to another project/section
    Move {
        id: TaskId,
        project_id: Option<String>,
        section_id: Option<String>,
    },
    /// Attach under another task, or make it a root with `None`
    Reparent { id: TaskId, parent_id: Option<TaskId> },
    /// Delete a task and its whole subtree
    Delete { id: TaskId },
}

impl Mutation {
    pub fn task_id(&self) -> &TaskId {
        match self {
            Mutation::Create { record } => &record.id,
            Mutation::SetDueDate { id, .. }
            | Mutation::SetCompleted { id, .. }
            | Mutation::Move { id, .. }
            | Mutation::Reparent { id, .. }
            | Mutation::Delete { id } => id,
        }
    }
}

/// Error type for mutations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MutationError {
    #[error(transparent)]
    Rejected(#[from] Rejection),
    #[error("task not found: {0}")]
    NotFound(TaskId),
    #[error("task already exists: {0}")]
    DuplicateId(TaskId),
}

fn require<'a>(store: &'a TaskStore, id: &TaskId) -> Result<&'a TaskRecord, MutationError> {
    store
        .get(id)
        .ok_or_else(|| MutationError::NotFound(id.clone()))
}

/// Run a mutation through the matching domain checks without applying it
pub fn validate_mutation(
    store: &TaskStore,
    mutation: &Mutation,
    today: NaiveDate,
) -> Result<(), MutationError> {
    match mutation {
        Mutation::Create { record } => {
            if store.contains(&record.id) {
                return Err(MutationError::DuplicateId(record.id.clone()));
            }
            let parent = match &record.parent_task_id {
                Some(pid) => {
                    let parent = require(store, pid)?;
                    let level = store.level_of(pid).unwrap_or(0);
                    validate::can_add_subtask(parent, level)?;
                    Some(parent)
                }
                None => None,
            };
            if let Some(due) = &record.due_date {
                validate::can_set_due_date(due, parent, today)?;
            }
        }
        Mutation::SetDueDate { id, due } => {
            require(store, id)?;
            if let Some(due) = due {
                validate::can_set_due_date(due, store.parent_of(id), today)?;
                validate::check_children_due_dates(due, &store.children_of(id))?;
            }
        }
        Mutation::SetCompleted { id, completed } => {
            let task = require(store, id)?;
            // Reopening is never gated
            if *completed && !task.completed {
                let children: Vec<TaskRecord> =
                    store.children_of(id).into_iter().cloned().collect();
                validate::can_complete(task, &children)?;
            }
        }
        Mutation::Move {
            id,
            project_id,
            section_id,
        } => {
            let task = require(store, id)?;
            validate::can_move(task, project_id.as_deref(), section_id.as_deref())?;
        }
        Mutation::Reparent { id, parent_id } => {
            require(store, id)?;
            if let Some(pid) = parent_id {
                require(store, pid)?;
            }
            validate::can_reparent(store, id, parent_id.as_ref())?;
        }
        Mutation::Delete { id } => {
            require(store, id)?;
        }
    }
    Ok(())
}

/// Apply an already-validated mutation to the local store
pub fn apply_mutation(
    store: &mut TaskStore,
    mutation: &Mutation,
    now: DateTime<Utc>,
) -> Result<(), MutationError> {
    match mutation {
        Mutation::Create { record } => {
            let mut record = record.clone();
            if let Some(parent) = record.parent_task_id.as_ref().and_then(|p| store.get(p)) {
                if record.project_id.is_none() {
                    record.project_id = parent.project_id.clone();
                }
                if record.section_id.is_none() {
                    record.section_id = parent.section_id.clone();
                }
            }
            store.upsert(record);
        }
        Mutation::SetDueDate { id, due } => {
            touch(store, id, now, |r| r.due_date = *due)?;
        }
        Mutation::SetCompleted { id, completed } => {
            touch(store, id, now, |r| r.completed = *completed)?;
        }
        Mutation::Move {
            id,
            project_id,
            section_id,
        } => {
            require(store, id)?;
            relocate_subtree(store, id, project_id.clone(), section_id.clone(), now);
        }
        Mutation::Reparent { id, parent_id } => {
            touch(store, id, now, |r| r.parent_task_id = parent_id.clone())?;
            if let Some(parent) = parent_id.as_ref().and_then(|p| store.get(p)) {
                let project = parent.project_id.clone();
                let section = parent.section_id.clone();
                relocate_subtree(store, id, project, section, now);
            }
        }
        Mutation::Delete { id } => {
            let removed = store.remove_subtree(id);
            if removed.is_empty() {
                return Err(MutationError::NotFound(id.clone()));
            }
            debug!(task_id = %id, count = removed.len(), "deleted subtree");
        }
    }
    Ok(())
}

fn touch(
    store: &mut TaskStore,
    id: &TaskId,
    now: DateTime<Utc>,
    f: impl FnOnce(&mut TaskRecord),
) -> Result<(), MutationError> {
    let found = store.update(id, |r| {
        f(r);
        r.updated_at = now;
    });
    if found {
        Ok(())
    } else {
        Err(MutationError::NotFound(id.clone()))
    }
}

/// Rewrite the denormalized project/section of a task and every descendant
fn relocate_subtree(
    store: &mut TaskStore,
    id: &TaskId,
    project_id: Option<String>,
    section_id: Option<String>,
    now: DateTime<Utc>,
) {
    let mut ids = vec![id.clone()];
    ids.extend(store.descendants(id));
    for task_id in &ids {
        store.update(task_id, |r| {
            r.project_id = project_id.clone();
            r.section_id = section_id.clone();
            r.updated_at = now;
        });
    }
}

/// A mutation applied optimistically, waiting for the backing store's answer.
///
/// `begin` validates and applies the change locally while keeping a snapshot;
/// `settle` either keeps the change or puts the snapshot back.
#[derive(Debug)]
#[must_use = "a pending mutation must be settled"]
pub struct PendingMutation {
    mutation: Mutation,
    snapshot: TaskStore,
}

impl PendingMutation {
    pub fn begin(
        store: &mut TaskStore,
        mutation: Mutation,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<Self, MutationError> {
        validate_mutation(store, &mutation, today)?;
        let snapshot = store.clone();
        apply_mutation(store, &mutation, now)?;
        Ok(PendingMutation { mutation, snapshot })
    }

    pub fn mutation(&self) -> &Mutation {
        &self.mutation
    }

    /// Commit on `Ok`, restore the pre-mutation records on `Err`
    pub fn settle<E: std::fmt::Display>(self, store: &mut TaskStore, outcome: Result<(), E>) -> Result<(), E> {
        match outcome {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!(task_id = %self.mutation.task_id(), error = %e, "mutation failed, rolling back");
                *store = self.snapshot;
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::task::Priority;
    use crate::ops::validate::RejectionKind;
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap()
    }

    fn later() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 2, 9, 0, 0).unwrap()
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()
    }

    fn day(d: u32) -> DueDate {
        DueDate::AllDay(NaiveDate::from_ymd_opt(2025, 1, d).unwrap())
    }

    fn rec(id: &str) -> TaskRecord {
        TaskRecord::new(id, format!("Task {id}"), ts())
    }

    fn id(s: &str) -> TaskId {
        TaskId::from(s)
    }

    fn store() -> TaskStore {
        TaskStore::from_records(vec![
            rec("A").with_project("work").with_section("todo").with_due(day(10)),
            rec("B").with_parent("A").with_project("work").with_section("todo"),
            rec("C").with_parent("B").with_project("work").with_section("todo"),
            rec("D").with_project("home"),
        ])
    }

    fn run(store: &mut TaskStore, m: Mutation) -> Result<(), MutationError> {
        validate_mutation(store, &m, today())?;
        apply_mutation(store, &m, later())
    }

    #[test]
    fn create_subtask_inherits_project_and_section() {
        let mut s = store();
        run(&mut s, Mutation::Create { record: rec("N").with_parent("C") }).unwrap();
        let n = s.get(&id("N")).unwrap();
        assert_eq!(n.project_id.as_deref(), Some("work"));
        assert_eq!(n.section_id.as_deref(), Some("todo"));
        assert_eq!(s.level_of(&id("N")), Some(3));
    }

    #[test]
    fn create_rejections() {
        let mut s = store();
        assert_eq!(
            run(&mut s, Mutation::Create { record: rec("A") }),
            Err(MutationError::DuplicateId(id("A")))
        );
        assert_eq!(
            run(&mut s, Mutation::Create { record: rec("N").with_parent("ghost") }),
            Err(MutationError::NotFound(id("ghost")))
        );
        let err = run(
            &mut s,
            Mutation::Create {
                record: rec("N").with_parent("A").with_due(day(12)),
            },
        )
        .unwrap_err();
        assert!(matches!(err, MutationError::Rejected(r) if r.kind() == RejectionKind::ExceedsParent));
        assert!(!s.contains(&id("N")));
    }

    #[test]
    fn create_at_depth_limit_rejected() {
        let mut s = store();
        run(&mut s, Mutation::Create { record: rec("L3").with_parent("C") }).unwrap();
        run(&mut s, Mutation::Create { record: rec("L4").with_parent("L3") }).unwrap();
        let err = run(&mut s, Mutation::Create { record: rec("L5").with_parent("L4") }).unwrap_err();
        assert!(matches!(err, MutationError::Rejected(r) if r.kind() == RejectionKind::LevelLimit));
    }

    #[test]
    fn set_due_date_checks_parent_and_children() {
        let mut s = store();
        run(&mut s, Mutation::SetDueDate { id: id("B"), due: Some(day(9)) }).unwrap();
        assert_eq!(s.get(&id("B")).unwrap().due_date, Some(day(9)));
        assert_eq!(s.get(&id("B")).unwrap().updated_at, later());

        // Parent A may not be pulled before child B
        let err = run(&mut s, Mutation::SetDueDate { id: id("A"), due: Some(day(8)) }).unwrap_err();
        assert!(matches!(err, MutationError::Rejected(r) if r.kind() == RejectionKind::ExceedsParent));

        run(&mut s, Mutation::SetDueDate { id: id("B"), due: None }).unwrap();
        assert_eq!(s.get(&id("B")).unwrap().due_date, None);
    }

    #[test]
    fn complete_gate_and_reopen() {
        let mut s = store();
        let err = run(&mut s, Mutation::SetCompleted { id: id("B"), completed: true }).unwrap_err();
        assert!(matches!(err, MutationError::Rejected(r) if r.kind() == RejectionKind::IncompleteChildren));

        run(&mut s, Mutation::SetCompleted { id: id("C"), completed: true }).unwrap();
        run(&mut s, Mutation::SetCompleted { id: id("B"), completed: true }).unwrap();
        assert!(s.get(&id("B")).unwrap().completed);

        // Reopening a child under a completed parent is allowed and leaves the parent alone
        run(&mut s, Mutation::SetCompleted { id: id("C"), completed: false }).unwrap();
        assert!(!s.get(&id("C")).unwrap().completed);
        assert!(s.get(&id("B")).unwrap().completed);
    }

    #[test]
    fn move_rewrites_whole_subtree() {
        let mut s = store();
        run(
            &mut s,
            Mutation::Move {
                id: id("B"),
                project_id: Some("home".into()),
                section_id: None,
            },
        )
        .unwrap();
        for t in ["B", "C"] {
            let r = s.get(&id(t)).unwrap();
            assert_eq!(r.project_id.as_deref(), Some("home"));
            assert_eq!(r.section_id, None);
        }
        assert_eq!(s.get(&id("A")).unwrap().project_id.as_deref(), Some("work"));
        // Parent link is untouched by a move
        assert_eq!(s.get(&id("B")).unwrap().parent_task_id, Some(id("A")));
    }

    #[test]
    fn reparent_moves_subtree_under_new_parent() {
        let mut s = store();
        run(&mut s, Mutation::Reparent { id: id("B"), parent_id: Some(id("D")) }).unwrap();
        assert_eq!(s.get(&id("B")).unwrap().parent_task_id, Some(id("D")));
        assert_eq!(s.get(&id("C")).unwrap().project_id.as_deref(), Some("home"));

        let err = run(&mut s, Mutation::Reparent { id: id("D"), parent_id: Some(id("C")) }).unwrap_err();
        assert!(matches!(err, MutationError::Rejected(r) if r.kind() == RejectionKind::WouldCycle));

        run(&mut s, Mutation::Reparent { id: id("C"), parent_id: None }).unwrap();
        assert_eq!(s.level_of(&id("C")), Some(0));
    }

    #[test]
    fn reparent_under_earlier_due_parent_is_rejected() {
        let mut s = store();
        s.upsert(rec("X").with_due(day(20)));
        let before = s.to_vec();
        let err = run(&mut s, Mutation::Reparent { id: id("X"), parent_id: Some(id("A")) }).unwrap_err();
        assert!(matches!(err, MutationError::Rejected(r) if r.kind() == RejectionKind::ExceedsParent));
        assert_eq!(s.to_vec(), before);
        assert!(crate::ops::check::check_records(&before, today()).valid);
    }

    #[test]
    fn delete_removes_subtree() {
        let mut s = store();
        run(&mut s, Mutation::Delete { id: id("A") }).unwrap();
        assert_eq!(s.len(), 1);
        assert_eq!(
            run(&mut s, Mutation::Delete { id: id("A") }),
            Err(MutationError::NotFound(id("A")))
        );
    }

    #[test]
    fn pending_mutation_commits_on_success() {
        let mut s = store();
        let pending = PendingMutation::begin(
            &mut s,
            Mutation::SetCompleted { id: id("D"), completed: true },
            today(),
            later(),
        )
        .unwrap();
        // Local state already reflects the change
        assert!(s.get(&id("D")).unwrap().completed);
        pending.settle(&mut s, Ok::<(), String>(())).unwrap();
        assert!(s.get(&id("D")).unwrap().completed);
    }

    #[test]
    fn pending_mutation_rolls_back_on_failure() {
        let mut s = store();
        let before = s.to_vec();
        let pending = PendingMutation::begin(
            &mut s,
            Mutation::Delete { id: id("A") },
            today(),
            later(),
        )
        .unwrap();
        assert_eq!(s.len(), 1);
        let result = pending.settle(&mut s, Err("backend unavailable".to_string()));
        assert_eq!(result, Err("backend unavailable".to_string()));
        assert_eq!(s.to_vec(), before);
        assert_eq!(s.children_of(&id("A")).len(), 1);
    }

    #[test]
    fn rejected_begin_leaves_store_untouched() {
        let mut s = store();
        let before = s.to_vec();
        let err = PendingMutation::begin(
            &mut s,
            Mutation::Create { record: rec("X").with_parent("A").with_priority(Priority::High).with_due(day(20)) },
            today(),
            later(),
        )
        .unwrap_err();
        assert!(matches!(err, MutationError::Rejected(_)));
        assert_eq!(s.to_vec(), before);
    }

    #[test]
    fn mutation_serializes_with_op_tag() {
        let m = Mutation::SetCompleted { id: id("A"), completed: true };
        let json = serde_json::to_value(&m).unwrap();
        assert_eq!(json["op"], "set_completed");
        assert_eq!(json["id"], "A");
    }
}
