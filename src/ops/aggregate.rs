use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::Serialize;

use crate::model::tree::TreeNode;

/// Completion counts over every node of a forest or subtree, collapsed or not
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Aggregates {
    pub completed: usize,
    pub pending: usize,
    /// Pending with an effective due before the start of today
    pub overdue: usize,
    /// Pending and due on today's date
    pub due_today: usize,
}

impl Aggregates {
    pub fn total(&self) -> usize {
        self.completed + self.pending
    }

    /// Completed share in `[0, 1]`; 0 for an empty set
    pub fn progress_ratio(&self) -> f64 {
        match self.total() {
            0 => 0.0,
            total => self.completed as f64 / total as f64,
        }
    }

    fn add(&mut self, other: &Aggregates) {
        self.completed += other.completed;
        self.pending += other.pending;
        self.overdue += other.overdue;
        self.due_today += other.due_today;
    }

    fn count(&mut self, node: &TreeNode, today: NaiveDate) {
        let record = &node.record;
        if record.completed {
            self.completed += 1;
            return;
        }
        self.pending += 1;
        if record.is_overdue(today) {
            self.overdue += 1;
        } else if record.due_date.is_some_and(|d| d.date() == today) {
            self.due_today += 1;
        }
    }
}

/// Aggregate every node in a forest
pub fn aggregate(roots: &[TreeNode], today: NaiveDate) -> Aggregates {
    let mut agg = Aggregates::default();
    for node in roots {
        agg.add(&aggregate_node(node, today));
    }
    agg
}

/// Aggregate a node and all of its descendants
pub fn aggregate_node(node: &TreeNode, today: NaiveDate) -> Aggregates {
    let mut agg = Aggregates::default();
    agg.count(node, today);
    for child in &node.children {
        agg.add(&aggregate_node(child, today));
    }
    agg
}

/// Aggregate only what is below a node (for a parent's progress bar)
pub fn aggregate_descendants(node: &TreeNode, today: NaiveDate) -> Aggregates {
    aggregate(&node.children, today)
}

/// Per-project aggregates, keyed by project id in first-seen order. Roots
/// without a project are grouped under `""`.
pub fn aggregate_by_project(roots: &[TreeNode], today: NaiveDate) -> IndexMap<String, Aggregates> {
    let mut out: IndexMap<String, Aggregates> = IndexMap::new();
    for node in roots {
        let key = node.record.project_id.clone().unwrap_or_default();
        out.entry(key)
            .or_default()
            .add(&aggregate_node(node, today));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::task::{DueDate, TaskRecord};
    use crate::ops::tree_build::build_hierarchy;
    use chrono::{DateTime, TimeZone, Utc};

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap()
    }

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, d).unwrap()
    }

    fn rec(id: &str) -> TaskRecord {
        TaskRecord::new(id, format!("Task {id}"), ts())
    }

    #[test]
    fn empty_forest_has_zero_ratio() {
        let agg = aggregate(&[], date(10));
        assert_eq!(agg, Aggregates::default());
        assert_eq!(agg.progress_ratio(), 0.0);
        assert!(!agg.progress_ratio().is_nan());
    }

    #[test]
    fn counts_cover_whole_subtree() {
        let records = vec![
            rec("A"),
            rec("B").with_parent("A").completed(true),
            rec("C").with_parent("B").completed(true),
            rec("D").with_parent("A"),
            rec("E").completed(true),
        ];
        let roots = build_hierarchy(&records);
        let agg = aggregate(&roots, date(10));
        assert_eq!(agg.completed, 3);
        assert_eq!(agg.pending, 2);
        assert_eq!(agg.progress_ratio(), 0.6);

        let a = aggregate_descendants(&roots[0], date(10));
        assert_eq!((a.completed, a.pending), (2, 1));
    }

    #[test]
    fn overdue_and_due_today() {
        let today = date(10);
        let records = vec![
            rec("late").with_due(DueDate::AllDay(date(9))),
            rec("late-done").with_due(DueDate::AllDay(date(9))).completed(true),
            rec("today").with_due(DueDate::At(today.and_hms_opt(7, 0, 0).unwrap())),
            rec("later").with_due(DueDate::AllDay(date(11))),
        ];
        let agg = aggregate(&build_hierarchy(&records), today);
        assert_eq!(agg.overdue, 1);
        assert_eq!(agg.due_today, 1);
        assert_eq!(agg.pending, 3);
    }

    #[test]
    fn by_project_groups_roots() {
        let records = vec![
            rec("A").with_project("work"),
            rec("A1").with_parent("A"),
            rec("B").with_project("home").completed(true),
            rec("C"),
        ];
        let by = aggregate_by_project(&build_hierarchy(&records), date(10));
        let keys: Vec<&str> = by.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["work", "home", ""]);
        assert_eq!(by["work"].pending, 2);
        assert_eq!(by["home"].completed, 1);
    }
}
