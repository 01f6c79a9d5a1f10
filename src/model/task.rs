use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Opaque task identifier as issued by the backing store
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        TaskId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        TaskId(s.to_string())
    }
}

impl From<String> for TaskId {
    fn from(s: String) -> Self {
        TaskId(s)
    }
}

/// Task priority. Variant order is significant: `None < Low < ... < Critical`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    #[default]
    None,
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    /// Short marker used in text output
    pub fn marker(self) -> &'static str {
        match self {
            Priority::Critical => "!!!",
            Priority::High => "!!",
            Priority::Medium => "!",
            Priority::Low => "-",
            Priority::None => "",
        }
    }

    /// Parse a priority name (case-insensitive)
    pub fn parse(s: &str) -> Option<Priority> {
        match s.to_ascii_lowercase().as_str() {
            "critical" => Some(Priority::Critical),
            "high" => Some(Priority::High),
            "medium" => Some(Priority::Medium),
            "low" => Some(Priority::Low),
            "none" => Some(Priority::None),
            _ => None,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Priority::Critical => "critical",
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
            Priority::None => "none",
        };
        f.write_str(name)
    }
}

/// A due date: either a whole calendar day or a precise local date-time.
///
/// On the wire an all-day date is a date-only string (`2025-01-10`) or a
/// date-time pinned to the midnight sentinel (`2025-01-10T00:00:00`). Any other
/// date-time is a timed deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DueDate {
    AllDay(NaiveDate),
    At(NaiveDateTime),
}

impl DueDate {
    /// Calendar day of the due date
    pub fn date(&self) -> NaiveDate {
        match self {
            DueDate::AllDay(d) => *d,
            DueDate::At(dt) => dt.date(),
        }
    }

    pub fn is_all_day(&self) -> bool {
        matches!(self, DueDate::AllDay(_))
    }

    /// The instant used for every due-date comparison. All-day dates extend to
    /// 23:59:59 of their day, for parents and children alike.
    pub fn effective(&self) -> NaiveDateTime {
        match self {
            DueDate::AllDay(d) => d.and_time(end_of_day()),
            DueDate::At(dt) => *dt,
        }
    }

    /// Parse the wire/CLI form. Accepts `YYYY-MM-DD`, `YYYY-MM-DDTHH:MM[:SS]`
    /// and `YYYY-MM-DD HH:MM[:SS]`.
    pub fn parse(s: &str) -> Option<DueDate> {
        let s = s.trim();
        if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            return Some(DueDate::AllDay(d));
        }
        const FORMATS: [&str; 4] = [
            "%Y-%m-%dT%H:%M:%S",
            "%Y-%m-%dT%H:%M",
            "%Y-%m-%d %H:%M:%S",
            "%Y-%m-%d %H:%M",
        ];
        let dt = FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())?;
        if dt.time() == NaiveTime::MIN {
            Some(DueDate::AllDay(dt.date()))
        } else {
            Some(DueDate::At(dt))
        }
    }
}

impl fmt::Display for DueDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DueDate::AllDay(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            DueDate::At(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M")),
        }
    }
}

impl Serialize for DueDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            DueDate::AllDay(d) => serializer.collect_str(&d.format("%Y-%m-%d")),
            DueDate::At(dt) => serializer.collect_str(&dt.format("%Y-%m-%dT%H:%M:%S")),
        }
    }
}

impl<'de> Deserialize<'de> for DueDate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DueDate::parse(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid due date: {raw}")))
    }
}

/// 23:59:59, the end of an all-day due date
pub fn end_of_day() -> NaiveTime {
    NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN)
}

/// A reminder attached to a task. Carried through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reminder {
    pub remind_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
}

/// A flat task record as delivered by the backing store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecord {
    pub id: TaskId,
    /// Parent task; absent means root-level
    #[serde(default)]
    pub parent_task_id: Option<TaskId>,
    #[serde(default)]
    pub project_id: Option<String>,
    /// Subtasks may omit this and inherit the parent's section
    #[serde(default)]
    pub section_id: Option<String>,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub due_date: Option<DueDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub reminders: Vec<Reminder>,
}

impl TaskRecord {
    /// Create a pending, root-level record stamped with `now`
    pub fn new(id: impl Into<TaskId>, title: impl Into<String>, now: DateTime<Utc>) -> Self {
        TaskRecord {
            id: id.into(),
            parent_task_id: None,
            project_id: None,
            section_id: None,
            title: title.into(),
            description: None,
            completed: false,
            priority: Priority::None,
            due_date: None,
            created_at: now,
            updated_at: now,
            tags: Vec::new(),
            reminders: Vec::new(),
        }
    }

    pub fn with_parent(mut self, parent: impl Into<TaskId>) -> Self {
        self.parent_task_id = Some(parent.into());
        self
    }

    pub fn with_due(mut self, due: DueDate) -> Self {
        self.due_date = Some(due);
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project_id = Some(project.into());
        self
    }

    pub fn with_section(mut self, section: impl Into<String>) -> Self {
        self.section_id = Some(section.into());
        self
    }

    pub fn completed(mut self, completed: bool) -> Self {
        self.completed = completed;
        self
    }

    /// Effective due instant, if the task has a due date
    pub fn effective_due(&self) -> Option<NaiveDateTime> {
        self.due_date.as_ref().map(DueDate::effective)
    }

    /// Pending with an effective due before the start of `today`
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        !self.completed
            && self
                .effective_due()
                .is_some_and(|due| due < today.and_time(NaiveTime::MIN))
    }
}
