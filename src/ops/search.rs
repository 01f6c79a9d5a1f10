use std::ops::Range;

use regex::Regex;

use crate::model::task::{TaskId, TaskRecord};

/// Which field of a task matched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchField {
    Id,
    Title,
    Description,
    Tag,
}

impl MatchField {
    pub fn as_str(self) -> &'static str {
        match self {
            MatchField::Id => "id",
            MatchField::Title => "title",
            MatchField::Description => "description",
            MatchField::Tag => "tag",
        }
    }
}

/// A search hit for a task field
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub task_id: TaskId,
    pub field: MatchField,
    pub spans: Vec<Range<usize>>,
}

/// Compile a user pattern case-insensitively, falling back to a literal match
/// when it is not a valid regex.
pub fn compile_pattern(pattern: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!("(?i){}", pattern))
        .or_else(|_| Regex::new(&format!("(?i){}", regex::escape(pattern))))
}

/// Collect all non-overlapping match byte-ranges for a regex in the given text.
fn find_matches(re: &Regex, text: &str) -> Vec<Range<usize>> {
    re.find_iter(text).map(|m| m.start()..m.end()).collect()
}

/// Search records in order. A record yields at most one hit per field.
pub fn search_records(records: &[TaskRecord], re: &Regex) -> Vec<SearchHit> {
    let mut hits = Vec::new();
    for record in records {
        let mut push = |field: MatchField, text: &str| {
            let spans = find_matches(re, text);
            if !spans.is_empty() {
                hits.push(SearchHit {
                    task_id: record.id.clone(),
                    field,
                    spans,
                });
            }
        };
        push(MatchField::Id, record.id.as_str());
        push(MatchField::Title, &record.title);
        if let Some(desc) = &record.description {
            push(MatchField::Description, desc);
        }
        for tag in &record.tags {
            push(MatchField::Tag, tag);
        }
    }
    hits
}
