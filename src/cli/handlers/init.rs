use std::path::Path;

use crate::cli::commands::InitArgs;
use crate::io::project_io;

pub fn cmd_init(args: InitArgs, cwd: &Path) -> Result<(), Box<dyn std::error::Error>> {
    // Note a workspace further up, since discovery from here would have found it
    if let Some(parent) = cwd.parent()
        && let Ok(parent_root) = project_io::discover_project(parent)
    {
        eprintln!(
            "Note: parent workspace found at {}/",
            parent_root.join(project_io::TASKS_DIR).display()
        );
        eprintln!("Creating new workspace in ./{}/", project_io::TASKS_DIR);
    }

    let name = args.name.unwrap_or_else(|| {
        cwd.file_name()
            .and_then(|n| n.to_str())
            .map(project_io::infer_name)
            .unwrap_or_else(|| "Untitled".to_string())
    });

    project_io::init_project(cwd, &name)?;
    println!("Initialized tasktree workspace: {}", name);
    Ok(())
}
