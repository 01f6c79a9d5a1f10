use std::path::PathBuf;

use super::config::ProjectConfig;
use super::task::TaskRecord;

/// A loaded tasktree workspace
#[derive(Debug)]
pub struct Project {
    /// Root directory of the workspace (parent of `tasks/`)
    pub root: PathBuf,
    /// Path to the `tasks/` directory
    pub tasks_dir: PathBuf,
    /// Parsed config.toml
    pub config: ProjectConfig,
    /// All records, in file order
    pub records: Vec<TaskRecord>,
}
