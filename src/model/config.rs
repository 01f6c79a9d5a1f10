use serde::{Deserialize, Serialize};

use crate::ops::sort::SortKey;

/// Configuration from tasks/config.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub project: ProjectInfo,
    #[serde(default)]
    pub view: ViewConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectInfo {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewConfig {
    /// Ordering applied to records before the tree is built
    #[serde(default)]
    pub sort: SortKey,
    #[serde(default = "default_true")]
    pub show_completed: bool,
    /// Titles wider than this many terminal cells are truncated in `tt tree`
    #[serde(default = "default_title_width")]
    pub title_width: usize,
}

impl Default for ViewConfig {
    fn default() -> Self {
        ViewConfig {
            sort: SortKey::default(),
            show_completed: true,
            title_width: default_title_width(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_title_width() -> usize {
    60
}
