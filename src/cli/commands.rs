use clap::{Args, Parser, Subcommand};

use crate::ops::sort::SortKey;

#[derive(Parser)]
#[command(name = "tt", about = concat!("tasktree v", env!("CARGO_PKG_VERSION"), " - nested tasks from the command line"), version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Run against a different workspace directory
    #[arg(short = 'C', long = "project-dir", global = true)]
    pub project_dir: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a workspace in the current directory
    Init(InitArgs),
    /// Show the task tree
    Tree(TreeArgs),
    /// Show a task's children in `tt tree`
    Expand(IdArg),
    /// Hide a task's children in `tt tree`
    Collapse(IdArg),
    /// Expand every ancestor of a task so it is visible
    Reveal(IdArg),
    /// Show completion and due-date counts
    Stats(StatsArgs),
    /// Validate workspace integrity
    Check,
    /// Search tasks by regex
    Search(SearchArgs),
    /// Show task details
    Show(IdArg),
    /// Add a task or subtask
    Add(AddArgs),
    /// Set or clear a due date
    Due(DueArgs),
    /// Mark a task completed
    Done(IdArg),
    /// Mark a task not completed
    Undone(IdArg),
    /// Move a task and its subtasks to another project/section
    Mv(MvArgs),
    /// Attach a task under another task, or make it a root
    Reparent(ReparentArgs),
    /// Delete a task and its subtasks
    Rm(IdArg),
    /// Change workspace settings
    Config(ConfigCmd),
}

#[derive(Args)]
pub struct InitArgs {
    /// Workspace name (default: inferred from directory name)
    #[arg(long)]
    pub name: Option<String>,
}

#[derive(Args)]
pub struct IdArg {
    /// Task ID
    pub id: String,
}

#[derive(Args)]
pub struct TreeArgs {
    /// Only tasks in this project
    #[arg(long)]
    pub project: Option<String>,
    /// Only tasks in this section
    #[arg(long)]
    pub section: Option<String>,
    /// Sibling order (default: from config)
    #[arg(long, value_enum)]
    pub sort: Option<SortKey>,
    /// Expand everything, ignoring saved state
    #[arg(long)]
    pub all: bool,
    /// Expand the ancestors of this task before showing
    #[arg(long, value_name = "ID")]
    pub reveal: Option<String>,
}

#[derive(Args)]
pub struct StatsArgs {
    /// Only tasks in this project
    #[arg(long)]
    pub project: Option<String>,
}

#[derive(Args)]
pub struct SearchArgs {
    /// Regex pattern (case-insensitive; invalid regex is matched literally)
    pub pattern: String,
}

#[derive(Args)]
pub struct AddArgs {
    /// Task title
    pub title: String,
    /// Parent task ID (makes this a subtask)
    #[arg(long)]
    pub parent: Option<String>,
    /// Explicit task ID (default: next T-NNN)
    #[arg(long)]
    pub id: Option<String>,
    #[arg(long)]
    pub project: Option<String>,
    #[arg(long)]
    pub section: Option<String>,
    /// none, low, medium, high, critical
    #[arg(long)]
    pub priority: Option<String>,
    /// YYYY-MM-DD or YYYY-MM-DDTHH:MM[:SS]
    #[arg(long)]
    pub due: Option<String>,
    /// Tag (repeatable)
    #[arg(long = "tag")]
    pub tags: Vec<String>,
    /// Description
    #[arg(long)]
    pub description: Option<String>,
}

#[derive(Args)]
pub struct DueArgs {
    /// Task ID
    pub id: String,
    /// YYYY-MM-DD, YYYY-MM-DDTHH:MM[:SS], or "none" to clear
    pub date: String,
}

#[derive(Args)]
pub struct MvArgs {
    /// Task ID
    pub id: String,
    /// Target project (omit to clear)
    #[arg(long)]
    pub project: Option<String>,
    /// Target section (omit to clear)
    #[arg(long)]
    pub section: Option<String>,
}

#[derive(Args)]
pub struct ReparentArgs {
    /// Task ID
    pub id: String,
    /// New parent ID (omit to make the task a root)
    #[arg(long)]
    pub parent: Option<String>,
}

#[derive(Args)]
pub struct ConfigCmd {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Set the default sibling order for `tt tree`
    Sort {
        #[arg(value_enum)]
        key: SortKey,
    },
}
