//! Pre-mutation checks for the domain rules on parent/child relationships.
//!
//! Every check is a pure function of its arguments. Callers consult these
//! before submitting a change, and show the rejection message instead of
//! mutating anything when a check fails.

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::model::task::{DueDate, TaskId, TaskRecord};
use crate::model::tree::MAX_DEPTH;
use crate::ops::store::TaskStore;

/// Category of a rejected change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectionKind {
    LevelLimit,
    ParentCompleted,
    PastDate,
    ExceedsParent,
    IncompleteChildren,
    WouldCycle,
}

/// A rejected change, with the user-facing reason as its `Display`
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("cannot add subtask under {parent_id}: maximum nesting depth ({}) reached", MAX_DEPTH)]
    LevelLimit { parent_id: TaskId, level: usize },
    #[error("cannot add subtask under {parent_id}: parent task is completed")]
    ParentCompleted { parent_id: TaskId },
    #[error("due date {candidate} is in the past (today is {today})")]
    PastDate { candidate: DueDate, today: NaiveDate },
    #[error("due date {candidate} is later than the parent's due date {limit}")]
    ExceedsParent { candidate: DueDate, limit: DueDate },
    #[error("cannot complete {task_id}: {pending} subtask(s) still open")]
    IncompleteChildren { task_id: TaskId, pending: usize },
    #[error("cannot move {task_id} under {parent_id}: it is the task itself or one of its subtasks")]
    WouldCycle { task_id: TaskId, parent_id: TaskId },
}

impl Rejection {
    pub fn kind(&self) -> RejectionKind {
        match self {
            Rejection::LevelLimit { .. } => RejectionKind::LevelLimit,
            Rejection::ParentCompleted { .. } => RejectionKind::ParentCompleted,
            Rejection::PastDate { .. } => RejectionKind::PastDate,
            Rejection::ExceedsParent { .. } => RejectionKind::ExceedsParent,
            Rejection::IncompleteChildren { .. } => RejectionKind::IncompleteChildren,
            Rejection::WouldCycle { .. } => RejectionKind::WouldCycle,
        }
    }
}

/// `Ok(())` means accepted
pub type Validation = Result<(), Rejection>;

/// A new subtask needs a parent above the depth limit that is still open
pub fn can_add_subtask(parent: &TaskRecord, parent_level: usize) -> Validation {
    if parent_level >= MAX_DEPTH {
        return Err(Rejection::LevelLimit {
            parent_id: parent.id.clone(),
            level: parent_level,
        });
    }
    if parent.completed {
        return Err(Rejection::ParentCompleted {
            parent_id: parent.id.clone(),
        });
    }
    Ok(())
}

/// A due date may not fall on a day before `today`, nor end later than the
/// parent's due date. Both sides use [`DueDate::effective`].
pub fn can_set_due_date(
    candidate: &DueDate,
    parent: Option<&TaskRecord>,
    today: NaiveDate,
) -> Validation {
    if candidate.date() < today {
        return Err(Rejection::PastDate {
            candidate: *candidate,
            today,
        });
    }
    if let Some(limit) = parent.and_then(|p| p.due_date)
        && candidate.effective() > limit.effective()
    {
        return Err(Rejection::ExceedsParent {
            candidate: *candidate,
            limit,
        });
    }
    Ok(())
}

/// Tightening a parent's due date must not leave a child ending later
pub fn check_children_due_dates(new_due: &DueDate, children: &[&TaskRecord]) -> Validation {
    let limit: NaiveDateTime = new_due.effective();
    let latest = children
        .iter()
        .filter_map(|c| c.due_date)
        .filter(|d| d.effective() > limit)
        .max_by_key(DueDate::effective);
    match latest {
        Some(child_due) => Err(Rejection::ExceedsParent {
            candidate: child_due,
            limit: *new_due,
        }),
        None => Ok(()),
    }
}

/// A task can be completed only once every direct child is completed
pub fn can_complete(task: &TaskRecord, children: &[TaskRecord]) -> Validation {
    let pending = children.iter().filter(|c| !c.completed).count();
    if pending > 0 {
        return Err(Rejection::IncompleteChildren {
            task_id: task.id.clone(),
            pending,
        });
    }
    Ok(())
}

/// Moving across projects/sections is always structurally sound; the subtree
/// travels with the task and the mutation layer rewrites descendants.
pub fn can_move(
    _task: &TaskRecord,
    _target_project: Option<&str>,
    _target_section: Option<&str>,
) -> Validation {
    Ok(())
}

/// Re-parent `task_id` under `new_parent` (`None` = make it a root).
///
/// The new parent may not be the task or one of its descendants, must be open,
/// and the moved subtree must still fit under `MAX_DEPTH`. The task's own due
/// date must not end later than the new parent's; its date is not being set,
/// so it is not checked against today.
pub fn can_reparent(store: &TaskStore, task_id: &TaskId, new_parent: Option<&TaskId>) -> Validation {
    let Some(parent_id) = new_parent else {
        return Ok(());
    };
    if parent_id == task_id || store.descendants(task_id).contains(parent_id) {
        return Err(Rejection::WouldCycle {
            task_id: task_id.clone(),
            parent_id: parent_id.clone(),
        });
    }
    let Some(parent) = store.get(parent_id) else {
        return Ok(());
    };
    let parent_level = store.level_of(parent_id).unwrap_or(0);
    let height = store.subtree_height(task_id);
    if parent_level + 1 + height > MAX_DEPTH {
        return Err(Rejection::LevelLimit {
            parent_id: parent_id.clone(),
            level: parent_level,
        });
    }
    if parent.completed {
        return Err(Rejection::ParentCompleted {
            parent_id: parent_id.clone(),
        });
    }
    if let Some(candidate) = store.get(task_id).and_then(|t| t.due_date)
        && let Some(limit) = parent.due_date
        && candidate.effective() > limit.effective()
    {
        return Err(Rejection::ExceedsParent { candidate, limit });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn all_day(y: i32, m: u32, d: u32) -> DueDate {
        DueDate::AllDay(date(y, m, d))
    }

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DueDate {
        DueDate::At(date(y, m, d).and_hms_opt(h, min, 0).unwrap())
    }

    fn rec(id: &str) -> TaskRecord {
        TaskRecord::new(id, format!("Task {id}"), ts())
    }

    #[test]
    fn add_subtask_rejects_at_level_limit() {
        let parent = rec("P");
        assert_eq!(can_add_subtask(&parent, 3), Ok(()));
        let err = can_add_subtask(&parent, MAX_DEPTH).unwrap_err();
        assert_eq!(err.kind(), RejectionKind::LevelLimit);
        assert!(err.to_string().contains("maximum nesting depth (4)"));
    }

    #[test]
    fn add_subtask_rejects_completed_parent() {
        let parent = rec("P").completed(true);
        let err = can_add_subtask(&parent, 0).unwrap_err();
        assert_eq!(err.kind(), RejectionKind::ParentCompleted);
    }

    #[test]
    fn level_limit_wins_over_completed() {
        let parent = rec("P").completed(true);
        assert_eq!(
            can_add_subtask(&parent, 4).unwrap_err().kind(),
            RejectionKind::LevelLimit
        );
    }

    #[test]
    fn due_date_today_at_any_time_is_accepted() {
        let today = date(2025, 1, 5);
        assert_eq!(can_set_due_date(&all_day(2025, 1, 5), None, today), Ok(()));
        assert_eq!(can_set_due_date(&at(2025, 1, 5, 0, 1), None, today), Ok(()));
    }

    #[test]
    fn due_date_before_today_is_past() {
        let today = date(2025, 1, 5);
        let err = can_set_due_date(&at(2025, 1, 4, 23, 59), None, today).unwrap_err();
        assert_eq!(err.kind(), RejectionKind::PastDate);
        assert!(err.to_string().contains("2025-01-05"));
    }

    #[test]
    fn due_date_after_parent_is_rejected_with_limit_in_message() {
        let today = date(2025, 1, 1);
        let parent = rec("A").with_due(all_day(2025, 1, 10));
        let err = can_set_due_date(&all_day(2025, 1, 12), Some(&parent), today).unwrap_err();
        assert_eq!(err.kind(), RejectionKind::ExceedsParent);
        assert!(err.to_string().contains("2025-01-10"));
        assert_eq!(can_set_due_date(&all_day(2025, 1, 9), Some(&parent), today), Ok(()));
    }

    #[test]
    fn all_day_parent_extends_to_end_of_day() {
        let today = date(2025, 1, 1);
        let parent = rec("A").with_due(all_day(2025, 1, 10));
        assert_eq!(
            can_set_due_date(&at(2025, 1, 10, 23, 30), Some(&parent), today),
            Ok(())
        );
        assert_eq!(can_set_due_date(&all_day(2025, 1, 10), Some(&parent), today), Ok(()));
    }

    #[test]
    fn all_day_child_against_timed_parent_same_day_is_rejected() {
        let today = date(2025, 1, 1);
        let parent = rec("A").with_due(at(2025, 1, 10, 17, 0));
        let err = can_set_due_date(&all_day(2025, 1, 10), Some(&parent), today).unwrap_err();
        assert_eq!(err.kind(), RejectionKind::ExceedsParent);
        assert_eq!(
            can_set_due_date(&at(2025, 1, 10, 16, 0), Some(&parent), today),
            Ok(())
        );
    }

    #[test]
    fn parent_without_due_date_imposes_no_bound() {
        let today = date(2025, 1, 1);
        let parent = rec("A");
        assert_eq!(can_set_due_date(&all_day(2030, 1, 1), Some(&parent), today), Ok(()));
    }

    #[test]
    fn tightening_parent_checks_children() {
        let child = rec("C").with_due(all_day(2025, 1, 12));
        let other = rec("D").with_due(all_day(2025, 1, 8));
        let err = check_children_due_dates(&all_day(2025, 1, 10), &[&child, &other]).unwrap_err();
        assert_eq!(
            err,
            Rejection::ExceedsParent {
                candidate: all_day(2025, 1, 12),
                limit: all_day(2025, 1, 10),
            }
        );
        assert_eq!(check_children_due_dates(&all_day(2025, 1, 12), &[&child, &other]), Ok(()));
    }

    #[test]
    fn complete_gated_on_children() {
        let parent = rec("P");
        let done = rec("C1").completed(true);
        let open = rec("C2");
        let err = can_complete(&parent, &[done.clone(), open.clone()]).unwrap_err();
        assert_eq!(
            err,
            Rejection::IncompleteChildren {
                task_id: TaskId::from("P"),
                pending: 1
            }
        );
        assert_eq!(can_complete(&parent, &[done.clone(), open.completed(true)]), Ok(()));
        assert_eq!(can_complete(&parent, &[]), Ok(()));
    }

    #[test]
    fn move_is_always_accepted() {
        assert_eq!(can_move(&rec("A"), Some("other"), None), Ok(()));
    }

    #[test]
    fn reparent_rules() {
        let store = TaskStore::from_records(vec![
            rec("A"),
            rec("B").with_parent("A"),
            rec("C").with_parent("B"),
            rec("D"),
            rec("E").with_parent("D"),
            rec("F").with_parent("E"),
            rec("G").with_parent("F"),
            rec("Z").completed(true),
        ]);
        let id = |s: &str| TaskId::from(s);

        assert_eq!(
            can_reparent(&store, &id("A"), Some(&id("C"))).unwrap_err().kind(),
            RejectionKind::WouldCycle
        );
        assert_eq!(
            can_reparent(&store, &id("A"), Some(&id("A"))).unwrap_err().kind(),
            RejectionKind::WouldCycle
        );
        // A's subtree has height 2; G is at level 3 -> A would land at 4, C at 6
        assert_eq!(
            can_reparent(&store, &id("A"), Some(&id("G"))).unwrap_err().kind(),
            RejectionKind::LevelLimit
        );
        // B (height 1) under F (level 2): B at 3, C at 4 -> fits
        assert_eq!(can_reparent(&store, &id("B"), Some(&id("F"))), Ok(()));
        assert_eq!(
            can_reparent(&store, &id("B"), Some(&id("Z"))).unwrap_err().kind(),
            RejectionKind::ParentCompleted
        );
        assert_eq!(can_reparent(&store, &id("C"), None), Ok(()));
    }

    #[test]
    fn reparent_keeps_due_date_under_new_parent() {
        let store = TaskStore::from_records(vec![
            rec("P").with_due(all_day(2025, 1, 10)),
            rec("X").with_due(all_day(2025, 1, 20)),
            rec("Y").with_due(at(2025, 1, 10, 17, 0)),
            rec("Q"),
        ]);
        let id = |s: &str| TaskId::from(s);

        let err = can_reparent(&store, &id("X"), Some(&id("P"))).unwrap_err();
        assert_eq!(err.kind(), RejectionKind::ExceedsParent);
        assert!(err.to_string().contains("2025-01-10"));
        // Timed on the parent's all-day date fits inside its end of day
        assert_eq!(can_reparent(&store, &id("Y"), Some(&id("P"))), Ok(()));
        // No due date on either side imposes no bound
        assert_eq!(can_reparent(&store, &id("X"), Some(&id("Q"))), Ok(()));
        assert_eq!(can_reparent(&store, &id("Q"), Some(&id("P"))), Ok(()));
    }

    #[test]
    fn rejection_kind_serializes_screaming_snake() {
        let json = serde_json::to_string(&RejectionKind::IncompleteChildren).unwrap();
        assert_eq!(json, "\"INCOMPLETE_CHILDREN\"");
    }
}
