use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{Local, Utc};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::io::api::{ApiError, Scope, TaskApi};
use crate::io::lock::{LockError, WriteLock};
use crate::model::config::ProjectConfig;
use crate::model::project::Project;
use crate::model::task::TaskRecord;
use crate::ops::mutation::{Mutation, MutationError, apply_mutation, validate_mutation};
use crate::ops::store::TaskStore;

/// Name of the workspace directory under the project root
pub const TASKS_DIR: &str = "tasks";

const RECORDS_FILE: &str = "records.json";

const CONFIG_TEMPLATE: &str = r#"[project]
name = "{name}"

[view]
# manual | created | priority | due | title
sort = "manual"
show_completed = true
title_width = 60
"#;

/// Error type for workspace I/O
#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error("not a tasktree workspace: no tasks/ directory found")]
    NotAProject,
    #[error("workspace already exists at {0}")]
    AlreadyExists(PathBuf),
    #[error("could not read {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not parse config.toml: {0}")]
    ConfigParseError(#[from] toml::de::Error),
    #[error("could not edit config.toml: {0}")]
    ConfigEditError(#[from] toml_edit::TomlError),
    #[error("could not parse records.json: {0}")]
    RecordsError(#[from] serde_json::Error),
    #[error(transparent)]
    Lock(#[from] LockError),
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<ProjectError> for ApiError {
    fn from(e: ProjectError) -> Self {
        match e {
            ProjectError::Lock(e) => ApiError::Unavailable(e.to_string()),
            other => ApiError::Backend(other.to_string()),
        }
    }
}

/// Discover the workspace by walking up from the given directory, looking
/// for `tasks/config.toml`.
pub fn discover_project(start: &Path) -> Result<PathBuf, ProjectError> {
    let mut current = start.to_path_buf();
    loop {
        let tasks_dir = current.join(TASKS_DIR);
        if tasks_dir.is_dir() && tasks_dir.join("config.toml").exists() {
            return Ok(current);
        }
        if !current.pop() {
            return Err(ProjectError::NotAProject);
        }
    }
}

/// Load config and records from the given root directory.
pub fn load_project(root: &Path) -> Result<Project, ProjectError> {
    let tasks_dir = root.join(TASKS_DIR);
    if !tasks_dir.is_dir() {
        return Err(ProjectError::NotAProject);
    }

    let config_path = tasks_dir.join("config.toml");
    let config_text = fs::read_to_string(&config_path).map_err(|e| ProjectError::ReadError {
        path: config_path.clone(),
        source: e,
    })?;
    let config: ProjectConfig = toml::from_str(&config_text)?;
    let records = load_records(&tasks_dir)?;
    debug!(count = records.len(), "loaded records");

    Ok(Project {
        root: root.to_path_buf(),
        tasks_dir,
        config,
        records,
    })
}

/// Read records.json. A missing file is an empty workspace.
pub fn load_records(tasks_dir: &Path) -> Result<Vec<TaskRecord>, ProjectError> {
    let path = tasks_dir.join(RECORDS_FILE);
    if !path.exists() {
        return Ok(Vec::new());
    }
    let text = fs::read_to_string(&path).map_err(|e| ProjectError::ReadError {
        path: path.clone(),
        source: e,
    })?;
    Ok(serde_json::from_str(&text)?)
}

/// Write records.json atomically
pub fn save_records(tasks_dir: &Path, records: &[TaskRecord]) -> Result<(), ProjectError> {
    let path = tasks_dir.join(RECORDS_FILE);
    let mut content = serde_json::to_string_pretty(records)?;
    content.push('\n');
    atomic_write(&path, content.as_bytes())?;
    info!(count = records.len(), "saved records");
    Ok(())
}

/// Write via a temp file in the same directory, then rename over the target.
pub fn atomic_write(path: &Path, content: &[u8]) -> io::Result<()> {
    let dir = path.parent().unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Create `tasks/` with a default config and an empty record set.
/// Returns the new tasks directory.
pub fn init_project(root: &Path, name: &str) -> Result<PathBuf, ProjectError> {
    let tasks_dir = root.join(TASKS_DIR);
    if tasks_dir.is_dir() {
        return Err(ProjectError::AlreadyExists(tasks_dir));
    }
    fs::create_dir_all(&tasks_dir)?;
    fs::write(tasks_dir.join("config.toml"), CONFIG_TEMPLATE.replace("{name}", name))?;
    fs::write(tasks_dir.join(RECORDS_FILE), "[]\n")?;
    info!(path = %tasks_dir.display(), "initialized workspace");
    Ok(tasks_dir)
}

/// Infer a workspace name from a directory name: hyphens become spaces, words
/// are title-cased.
pub fn infer_name(dir_name: &str) -> String {
    dir_name
        .split(['-', '_'])
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                None => String::new(),
                Some(c) => c.to_uppercase().collect::<String>() + chars.as_str(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// `TaskApi` over `tasks/records.json`.
///
/// Each submit re-reads the file under the write lock, applies the mutation
/// and writes the whole set back.
#[derive(Debug, Clone)]
pub struct JsonFileApi {
    tasks_dir: PathBuf,
}

impl JsonFileApi {
    pub fn new(tasks_dir: impl Into<PathBuf>) -> Self {
        JsonFileApi {
            tasks_dir: tasks_dir.into(),
        }
    }

    pub fn tasks_dir(&self) -> &Path {
        &self.tasks_dir
    }
}

impl TaskApi for JsonFileApi {
    fn fetch(&self, scope: &Scope) -> Result<Vec<TaskRecord>, ApiError> {
        Ok(scope.filter(load_records(&self.tasks_dir)?))
    }

    fn submit(&mut self, mutation: &Mutation) -> Result<(), ApiError> {
        let _lock = WriteLock::acquire_for_write(&self.tasks_dir).map_err(ProjectError::from)?;
        let mut store = TaskStore::from_records(load_records(&self.tasks_dir)?);
        let today = Local::now().date_naive();
        validate_mutation(&store, mutation, today)
            .and_then(|()| apply_mutation(&mut store, mutation, Utc::now()))
            .map_err(|e: MutationError| ApiError::Rejected(e.to_string()))?;
        save_records(&self.tasks_dir, &store.to_vec())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::task::TaskId;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn ts() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap()
    }

    #[test]
    fn init_then_discover_and_load() {
        let tmp = TempDir::new().unwrap();
        let tasks_dir = init_project(tmp.path(), "Demo").unwrap();
        assert!(tasks_dir.join("config.toml").exists());

        let nested = tmp.path().join("src/deep");
        fs::create_dir_all(&nested).unwrap();
        assert_eq!(discover_project(&nested).unwrap(), tmp.path());

        let project = load_project(tmp.path()).unwrap();
        assert_eq!(project.config.project.name, "Demo");
        assert!(project.records.is_empty());
    }

    #[test]
    fn init_twice_fails() {
        let tmp = TempDir::new().unwrap();
        init_project(tmp.path(), "Demo").unwrap();
        assert!(matches!(
            init_project(tmp.path(), "Demo"),
            Err(ProjectError::AlreadyExists(_))
        ));
    }

    #[test]
    fn discover_without_workspace_fails() {
        let tmp = TempDir::new().unwrap();
        assert!(matches!(discover_project(tmp.path()), Err(ProjectError::NotAProject)));
    }

    #[test]
    fn save_and_load_records() {
        let tmp = TempDir::new().unwrap();
        let records = vec![
            TaskRecord::new("a", "A", ts()),
            TaskRecord::new("b", "B", ts()).with_parent("a"),
        ];
        save_records(tmp.path(), &records).unwrap();
        assert_eq!(load_records(tmp.path()).unwrap(), records);
    }

    #[test]
    fn malformed_records_are_an_error() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(RECORDS_FILE), "{ nope").unwrap();
        assert!(matches!(load_records(tmp.path()), Err(ProjectError::RecordsError(_))));
    }

    #[test]
    fn json_api_applies_and_persists() {
        let tmp = TempDir::new().unwrap();
        let tasks_dir = init_project(tmp.path(), "Demo").unwrap();
        let mut api = JsonFileApi::new(&tasks_dir);
        api.submit(&Mutation::Create {
            record: TaskRecord::new("a", "A", ts()).with_project("work"),
        })
        .unwrap();
        api.submit(&Mutation::Create {
            record: TaskRecord::new("b", "B", ts()).with_parent("a"),
        })
        .unwrap();

        let all = api.fetch(&Scope::all()).unwrap();
        assert_eq!(all.len(), 2);
        // Subtask inherited the parent's project
        assert_eq!(api.fetch(&Scope::project("work")).unwrap().len(), 2);

        let err = api
            .submit(&Mutation::Delete { id: TaskId::from("ghost") })
            .unwrap_err();
        assert!(matches!(err, ApiError::Rejected(_)));
        assert!(!tasks_dir.join(".lock").exists());
    }

    #[test]
    fn json_api_section_scope_includes_inheriting_subtasks() {
        let tmp = TempDir::new().unwrap();
        let tasks_dir = init_project(tmp.path(), "Demo").unwrap();
        save_records(
            &tasks_dir,
            &[
                TaskRecord::new("P", "Parent", ts()).with_project("work").with_section("todo"),
                TaskRecord::new("C", "Child", ts()).with_parent("P"),
                TaskRecord::new("O", "Other", ts()).with_project("work"),
            ],
        )
        .unwrap();
        let api = JsonFileApi::new(&tasks_dir);
        let scoped = api.fetch(&Scope::project("work").with_section("todo")).unwrap();
        let ids: Vec<&str> = scoped.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["P", "C"]);
    }

    #[test]
    fn infer_name_title_cases() {
        assert_eq!(infer_name("my-cool-project"), "My Cool Project");
        assert_eq!(infer_name("notes_app"), "Notes App");
        assert_eq!(infer_name("tasks"), "Tasks");
    }
}
