use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::model::task::TaskId;

/// Persisted view state (written to .state.json)
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct UiState {
    /// Task ids whose children are visible
    #[serde(default)]
    pub expanded: HashSet<TaskId>,
    /// Last search pattern
    #[serde(default)]
    pub last_search: Option<String>,
}

/// Read .state.json from the tasks directory. A missing or unreadable file
/// means nothing is expanded.
pub fn read_ui_state(tasks_dir: &Path) -> UiState {
    let path = tasks_dir.join(".state.json");
    fs::read_to_string(&path)
        .ok()
        .and_then(|content| serde_json::from_str(&content).ok())
        .unwrap_or_default()
}

/// Write .state.json to the tasks directory
pub fn write_ui_state(tasks_dir: &Path, state: &UiState) -> Result<(), std::io::Error> {
    let path = tasks_dir.join(".state.json");
    let content = serde_json::to_string_pretty(state)?;
    fs::write(&path, content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn write_and_read_round_trip() {
        let dir = TempDir::new().unwrap();
        let mut state = UiState {
            last_search: Some("report".into()),
            ..Default::default()
        };
        state.expanded.insert(TaskId::from("t1"));
        state.expanded.insert(TaskId::from("t2"));

        write_ui_state(dir.path(), &state).unwrap();
        assert_eq!(read_ui_state(dir.path()), state);
    }

    #[test]
    fn missing_or_malformed_file_is_empty_state() {
        let dir = TempDir::new().unwrap();
        assert!(read_ui_state(dir.path()).expanded.is_empty());
        fs::write(dir.path().join(".state.json"), "not json {{{").unwrap();
        assert_eq!(read_ui_state(dir.path()), UiState::default());
    }

    #[test]
    fn empty_object_takes_defaults() {
        let state: UiState = serde_json::from_str("{}").unwrap();
        assert!(state.expanded.is_empty());
        assert!(state.last_search.is_none());
    }
}
