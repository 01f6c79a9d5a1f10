use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::model::task::TaskRecord;

/// Ordering applied to records before the tree is built. The builder keeps
/// whatever order it is given, so this decides sibling order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    /// Keep the stored order
    #[default]
    Manual,
    /// Oldest first
    Created,
    /// Critical first
    Priority,
    /// Soonest first, undated last
    Due,
    /// Case-insensitive alphabetical
    Title,
}

impl SortKey {
    pub fn parse(s: &str) -> Option<SortKey> {
        match s.to_ascii_lowercase().as_str() {
            "manual" => Some(SortKey::Manual),
            "created" => Some(SortKey::Created),
            "priority" => Some(SortKey::Priority),
            "due" => Some(SortKey::Due),
            "title" => Some(SortKey::Title),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SortKey::Manual => "manual",
            SortKey::Created => "created",
            SortKey::Priority => "priority",
            SortKey::Due => "due",
            SortKey::Title => "title",
        }
    }
}

/// Stable sort; ties keep their previous relative order
pub fn sort_records(records: &mut [TaskRecord], key: SortKey) {
    match key {
        SortKey::Manual => {}
        SortKey::Created => records.sort_by_key(|r| r.created_at),
        SortKey::Priority => records.sort_by(|a, b| b.priority.cmp(&a.priority)),
        SortKey::Due => records.sort_by(compare_due),
        SortKey::Title => records.sort_by_cached_key(|r| r.title.to_lowercase()),
    }
}

fn compare_due(a: &TaskRecord, b: &TaskRecord) -> Ordering {
    match (a.effective_due(), b.effective_due()) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
