use chrono::NaiveDate;
use serde::Serialize;

use crate::model::task::{DueDate, Priority, TaskId, TaskRecord};
use crate::ops::aggregate::{Aggregates, aggregate_descendants};
use crate::ops::check::{CheckError, CheckResult, CheckWarning};
use crate::ops::flatten::FlatRow;
use crate::ops::validate::RejectionKind;
use crate::util::unicode::truncate_to_width;

// ---------------------------------------------------------------------------
// JSON output structs
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct TreeRowJson {
    pub id: TaskId,
    pub title: String,
    pub level: usize,
    pub is_last: bool,
    pub has_children: bool,
    pub expanded: bool,
    pub completed: bool,
    pub priority: Priority,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DueDate>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Counts over everything below this row, visible or not
    pub descendants: Aggregates,
}

#[derive(Serialize)]
pub struct TaskDetailJson<'a> {
    #[serde(flatten)]
    pub record: &'a TaskRecord,
    pub level: usize,
    /// Root first
    pub ancestors: Vec<TaskId>,
    pub children: Vec<TaskId>,
    pub descendants: Aggregates,
}

#[derive(Serialize)]
pub struct StatsJson {
    pub totals: AggregatesJson,
    pub projects: Vec<ProjectStatsJson>,
}

#[derive(Serialize)]
pub struct ProjectStatsJson {
    pub project: String,
    #[serde(flatten)]
    pub stats: AggregatesJson,
}

#[derive(Serialize)]
pub struct AggregatesJson {
    #[serde(flatten)]
    pub counts: Aggregates,
    pub total: usize,
    pub progress: f64,
}

impl From<Aggregates> for AggregatesJson {
    fn from(counts: Aggregates) -> Self {
        AggregatesJson {
            counts,
            total: counts.total(),
            progress: counts.progress_ratio(),
        }
    }
}

#[derive(Serialize)]
pub struct SearchHitJson {
    pub task_id: TaskId,
    pub title: String,
    pub field: &'static str,
}

#[derive(Serialize)]
pub struct RejectionJson {
    pub rejected: RejectionKind,
    pub reason: String,
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

pub fn row_to_json(row: &FlatRow, today: NaiveDate) -> TreeRowJson {
    let node = row.node;
    TreeRowJson {
        id: node.record.id.clone(),
        title: node.record.title.clone(),
        level: node.level,
        is_last: node.is_last,
        has_children: node.has_children,
        expanded: row.is_expanded,
        completed: node.record.completed,
        priority: node.record.priority,
        due_date: node.record.due_date,
        tags: node.record.tags.clone(),
        descendants: aggregate_descendants(node, today),
    }
}

// ---------------------------------------------------------------------------
// Human-readable formatting
// ---------------------------------------------------------------------------

fn checkbox(completed: bool) -> &'static str {
    if completed { "[x]" } else { "[ ]" }
}

fn format_tags(tags: &[String]) -> String {
    tags.iter()
        .map(|t| format!("#{}", t))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Connector prefix for a row: one column per ancestor below the root, then
/// the row's own branch. Roots have no prefix.
fn connectors(row: &FlatRow) -> String {
    if row.node.level == 0 {
        return String::new();
    }
    let mut out = String::new();
    for &last in row.ancestor_last.iter().skip(1) {
        out.push_str(if last { "   " } else { "│  " });
    }
    out.push_str(if row.node.is_last { "└─ " } else { "├─ " });
    out
}

/// One line of `tt tree` output
pub fn format_row(row: &FlatRow, today: NaiveDate, title_width: usize) -> String {
    let node = row.node;
    let record = &node.record;
    let expander = match (node.has_children, row.is_expanded) {
        (false, _) => "  ",
        (true, true) => "▾ ",
        (true, false) => "▸ ",
    };
    let mut line = format!(
        "{}{}{} {} {}",
        connectors(row),
        expander,
        checkbox(record.completed),
        record.id,
        truncate_to_width(&record.title, title_width)
    );
    let marker = record.priority.marker();
    if !marker.is_empty() {
        line.push_str(&format!(" ({})", marker));
    }
    if let Some(due) = &record.due_date {
        let overdue = if record.is_overdue(today) { "!" } else { "" };
        line.push_str(&format!(" due:{}{}", due, overdue));
    }
    if !record.tags.is_empty() {
        line.push(' ');
        line.push_str(&format_tags(&record.tags));
    }
    if node.has_children {
        let agg = aggregate_descendants(node, today);
        line.push_str(&format!(" [{}/{}]", agg.completed, agg.total()));
    }
    line
}

pub fn format_rows(rows: &[FlatRow], today: NaiveDate, title_width: usize) -> Vec<String> {
    rows.iter().map(|r| format_row(r, today, title_width)).collect()
}

/// Detailed single-task view
pub fn format_task_detail(
    record: &TaskRecord,
    ancestors: &[&TaskRecord],
    children: &[&TaskRecord],
) -> Vec<String> {
    let mut lines = Vec::new();
    for (depth, a) in ancestors.iter().enumerate() {
        lines.push(format!("{}{} {} {}", "  ".repeat(depth), checkbox(a.completed), a.id, a.title));
    }
    let indent = "  ".repeat(ancestors.len());
    lines.push(format!("{}{} {} {}", indent, checkbox(record.completed), record.id, record.title));

    if record.priority != Priority::None {
        lines.push(format!("priority: {}", record.priority));
    }
    if let Some(due) = &record.due_date {
        lines.push(format!("due: {}", due));
    }
    if let Some(project) = &record.project_id {
        lines.push(format!("project: {}", project));
    }
    if let Some(section) = &record.section_id {
        lines.push(format!("section: {}", section));
    }
    if !record.tags.is_empty() {
        lines.push(format!("tags: {}", format_tags(&record.tags)));
    }
    for reminder in &record.reminders {
        match &reminder.channel {
            Some(channel) => lines.push(format!("reminder: {} ({})", reminder.remind_at.to_rfc3339(), channel)),
            None => lines.push(format!("reminder: {}", reminder.remind_at.to_rfc3339())),
        }
    }
    lines.push(format!("created: {}", record.created_at.format("%Y-%m-%d %H:%M")));
    if let Some(desc) = &record.description {
        lines.push("description:".to_string());
        for line in desc.lines() {
            lines.push(format!("  {}", line));
        }
    }
    if !children.is_empty() {
        lines.push(String::new());
        lines.push("subtasks:".to_string());
        for c in children {
            lines.push(format!("  {} {} {}", checkbox(c.completed), c.id, c.title));
        }
    }
    lines
}

pub fn format_aggregates(label: &str, agg: &Aggregates) -> String {
    format!(
        "{}: {}/{} done ({:.0}%), {} overdue, {} due today",
        label,
        agg.completed,
        agg.total(),
        agg.progress_ratio() * 100.0,
        agg.overdue,
        agg.due_today
    )
}

pub fn format_check(result: &CheckResult) -> Vec<String> {
    let mut lines = Vec::new();
    if !result.errors.is_empty() {
        lines.push("Errors:".to_string());
        for err in &result.errors {
            lines.push(format!("  {}", describe_error(err)));
        }
    }
    if !result.warnings.is_empty() {
        if !result.errors.is_empty() {
            lines.push(String::new());
        }
        lines.push("Warnings:".to_string());
        for warn in &result.warnings {
            lines.push(format!("  {}", describe_warning(warn)));
        }
    }
    if result.valid && result.warnings.is_empty() {
        lines.push("ok".to_string());
    }
    lines
}

fn describe_error(err: &CheckError) -> String {
    match err {
        CheckError::Cycle { task_ids } => {
            let ids: Vec<&str> = task_ids.iter().map(|t| t.as_str()).collect();
            format!("parent cycle: {}", ids.join(" -> "))
        }
        CheckError::DuplicateId { task_id, count } => {
            format!("{} appears {} times", task_id, count)
        }
        CheckError::DepthExceeded { task_id, depth } => {
            format!("{} is nested at level {} (hidden)", task_id, depth)
        }
        CheckError::DueAfterParent { task_id, parent_id } => {
            format!("{} is due after its parent {}", task_id, parent_id)
        }
    }
}

fn describe_warning(warn: &CheckWarning) -> String {
    match warn {
        CheckWarning::Orphan { task_id, parent_id } => {
            format!("{} has missing parent {} (shown as root)", task_id, parent_id)
        }
        CheckWarning::Overdue { task_id } => format!("{} is overdue", task_id),
        CheckWarning::CompletedWithPendingChildren { task_id, pending } => {
            format!("{} is completed with {} open subtask(s)", task_id, pending)
        }
    }
}
