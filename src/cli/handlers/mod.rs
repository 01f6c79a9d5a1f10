mod init;
pub use init::cmd_init;

use std::collections::HashSet;
use std::error::Error;
use std::path::PathBuf;

use chrono::{Local, NaiveDate, Utc};

use crate::cli::commands::*;
use crate::cli::output::*;
use crate::io::api::{Scope, SubmitError, TaskApi, submit_optimistic};
use crate::io::config_io;
use crate::io::project_io::{self, JsonFileApi, ProjectError};
use crate::io::state::{read_ui_state, write_ui_state};
use crate::model::project::Project;
use crate::model::task::{DueDate, Priority, TaskId, TaskRecord};
use crate::ops::aggregate::{aggregate, aggregate_by_project, aggregate_descendants};
use crate::ops::check::check_records;
use crate::ops::flatten::{expand_ancestors, expand_all, flatten_rows};
use crate::ops::mutation::{Mutation, MutationError};
use crate::ops::search::{compile_pattern, search_records};
use crate::ops::sort::sort_records;
use crate::ops::store::TaskStore;
use crate::ops::tree_build::build_hierarchy;

type CmdResult = Result<(), Box<dyn Error>>;

/// Prefix for generated task ids
const ID_PREFIX: &str = "T";

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub fn dispatch(cli: Cli) -> CmdResult {
    let json = cli.json;
    let start = start_dir(cli.project_dir.as_deref())?;

    // Init runs before there is a workspace to discover
    let project = || load_project_at(&start);

    match cli.command {
        Commands::Init(args) => cmd_init(args, &start),

        // Read commands
        Commands::Tree(args) => cmd_tree(&project()?, args, json),
        Commands::Stats(args) => cmd_stats(&project()?, args, json),
        Commands::Check => cmd_check(&project()?, json),
        Commands::Search(args) => cmd_search(&project()?, args, json),
        Commands::Show(args) => cmd_show(&project()?, args, json),

        // View state
        Commands::Expand(args) => cmd_expand(&project()?, args, true),
        Commands::Collapse(args) => cmd_expand(&project()?, args, false),
        Commands::Reveal(args) => cmd_reveal(&project()?, args),

        // Write commands
        Commands::Add(args) => cmd_add(&project()?, args, json),
        Commands::Due(args) => cmd_due(&project()?, args, json),
        Commands::Done(args) => cmd_set_completed(&project()?, args, true, json),
        Commands::Undone(args) => cmd_set_completed(&project()?, args, false, json),
        Commands::Mv(args) => cmd_mv(&project()?, args, json),
        Commands::Reparent(args) => cmd_reparent(&project()?, args, json),
        Commands::Rm(args) => cmd_rm(&project()?, args, json),
        Commands::Config(args) => cmd_config(&project()?, args),
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn start_dir(project_dir: Option<&str>) -> Result<PathBuf, Box<dyn Error>> {
    match project_dir {
        Some(dir) => Ok(std::fs::canonicalize(dir)
            .map_err(|e| format!("cannot resolve -C path '{}': {}", dir, e))?),
        None => Ok(std::env::current_dir()?),
    }
}

fn load_project_at(start: &std::path::Path) -> Result<Project, ProjectError> {
    let root = project_io::discover_project(start)?;
    project_io::load_project(&root)
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn store_of(project: &Project) -> TaskStore {
    TaskStore::from_records(project.records.iter().cloned())
}

fn require<'a>(store: &'a TaskStore, id: &TaskId) -> Result<&'a TaskRecord, Box<dyn Error>> {
    store
        .get(id)
        .ok_or_else(|| format!("task not found: {}", id).into())
}

fn parse_due(s: &str) -> Result<DueDate, Box<dyn Error>> {
    DueDate::parse(s).ok_or_else(|| {
        format!(
            "invalid date '{}' (expected YYYY-MM-DD or YYYY-MM-DDTHH:MM[:SS])",
            s
        )
        .into()
    })
}

/// Drop completed records with no open descendant, so hidden work never
/// orphans visible work.
fn hide_completed(records: Vec<TaskRecord>) -> Vec<TaskRecord> {
    let store = TaskStore::from_records(records.iter().cloned());
    records
        .into_iter()
        .filter(|r| {
            !r.completed
                || store
                    .descendants(&r.id)
                    .iter()
                    .filter_map(|d| store.get(d))
                    .any(|d| !d.completed)
        })
        .collect()
}

/// Validate, apply locally, then submit through the file-backed collaborator.
/// A rejection is reported with its reason and nothing is written.
fn submit(project: &Project, mutation: Mutation, json: bool) -> Result<TaskStore, Box<dyn Error>> {
    let mut api = JsonFileApi::new(&project.tasks_dir);
    let mut store = store_of(project);
    match submit_optimistic(&mut api, &mut store, mutation, today(), Utc::now()) {
        Ok(()) => Ok(store),
        Err(SubmitError::Mutation(MutationError::Rejected(rejection))) => {
            if json {
                let out = RejectionJson {
                    rejected: rejection.kind(),
                    reason: rejection.to_string(),
                };
                println!("{}", serde_json::to_string_pretty(&out)?);
            }
            Err(format!("rejected: {}", rejection).into())
        }
        Err(e) => Err(e.into()),
    }
}

fn print_record(store: &TaskStore, id: &TaskId, verb: &str, json: bool) -> CmdResult {
    let record = require(store, id)?;
    if json {
        println!("{}", serde_json::to_string_pretty(record)?);
    } else {
        println!("{} {} {}", verb, record.id, record.title);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Read command handlers
// ---------------------------------------------------------------------------

fn cmd_tree(project: &Project, args: TreeArgs, json: bool) -> CmdResult {
    let api = JsonFileApi::new(&project.tasks_dir);
    let scope = Scope {
        project: args.project,
        section: args.section,
    };
    let mut records = api.fetch(&scope)?;
    sort_records(&mut records, args.sort.unwrap_or(project.config.view.sort));
    if !project.config.view.show_completed && !args.all {
        records = hide_completed(records);
    }
    let roots = build_hierarchy(&records);

    let mut expanded = if args.all {
        expand_all(&roots)
    } else {
        read_ui_state(&project.tasks_dir).expanded
    };
    if let Some(target) = args.reveal {
        let store = TaskStore::from_records(records.iter().cloned());
        let target = TaskId::new(target);
        require(&store, &target)?;
        expanded = expand_ancestors(&store, &target, &expanded);
    }

    let today = today();
    let rows = flatten_rows(&roots, &expanded);
    if json {
        let out: Vec<TreeRowJson> = rows.iter().map(|r| row_to_json(r, today)).collect();
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        for line in format_rows(&rows, today, project.config.view.title_width) {
            println!("{}", line);
        }
    }
    Ok(())
}

fn cmd_stats(project: &Project, args: StatsArgs, json: bool) -> CmdResult {
    let api = JsonFileApi::new(&project.tasks_dir);
    let scope = match args.project {
        Some(p) => Scope::project(p),
        None => Scope::all(),
    };
    let records = api.fetch(&scope)?;
    let roots = build_hierarchy(&records);
    let today = today();
    let totals = aggregate(&roots, today);
    let by_project = aggregate_by_project(&roots, today);

    if json {
        let out = StatsJson {
            totals: totals.into(),
            projects: by_project
                .into_iter()
                .map(|(project, agg)| ProjectStatsJson {
                    project,
                    stats: agg.into(),
                })
                .collect(),
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!("{}", format_aggregates("all", &totals));
        for (name, agg) in &by_project {
            println!("  {}", format_aggregates(name, agg));
        }
    }
    Ok(())
}

fn cmd_check(project: &Project, json: bool) -> CmdResult {
    let result = check_records(&project.records, today());
    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        for line in format_check(&result) {
            println!("{}", line);
        }
    }
    Ok(())
}

fn cmd_search(project: &Project, args: SearchArgs, json: bool) -> CmdResult {
    let re = compile_pattern(&args.pattern)?;
    let store = store_of(project);
    let hits = search_records(&project.records, &re);

    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for hit in &hits {
        if !seen.insert(&hit.task_id) {
            continue;
        }
        let Some(record) = store.get(&hit.task_id) else {
            continue;
        };
        if json {
            out.push(SearchHitJson {
                task_id: record.id.clone(),
                title: record.title.clone(),
                field: hit.field.as_str(),
            });
        } else {
            println!("{} {} (in {})", record.id, record.title, hit.field.as_str());
        }
    }
    if json {
        println!("{}", serde_json::to_string_pretty(&out)?);
    }

    let mut state = read_ui_state(&project.tasks_dir);
    state.last_search = Some(args.pattern);
    write_ui_state(&project.tasks_dir, &state)?;
    Ok(())
}

fn cmd_show(project: &Project, args: IdArg, json: bool) -> CmdResult {
    let store = store_of(project);
    let id = TaskId::new(args.id);
    let record = require(&store, &id)?;

    let mut ancestor_ids = store.ancestors(&id).unwrap_or_default();
    ancestor_ids.reverse();
    let ancestors: Vec<&TaskRecord> = ancestor_ids.iter().filter_map(|a| store.get(a)).collect();
    let children = store.children_of(&id);

    if json {
        let roots = build_hierarchy(&project.records);
        let descendants = crate::ops::tree_build::find_node(&roots, &id)
            .map(|n| aggregate_descendants(n, today()))
            .unwrap_or_default();
        let out = TaskDetailJson {
            record,
            level: ancestor_ids.len(),
            children: children.iter().map(|c| c.id.clone()).collect(),
            ancestors: ancestor_ids,
            descendants,
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        for line in format_task_detail(record, &ancestors, &children) {
            println!("{}", line);
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// View state handlers
// ---------------------------------------------------------------------------

fn cmd_expand(project: &Project, args: IdArg, expand: bool) -> CmdResult {
    let store = store_of(project);
    let id = TaskId::new(args.id);
    require(&store, &id)?;
    let mut state = read_ui_state(&project.tasks_dir);
    if expand {
        state.expanded.insert(id);
    } else {
        state.expanded.remove(&id);
    }
    write_ui_state(&project.tasks_dir, &state)?;
    Ok(())
}

fn cmd_reveal(project: &Project, args: IdArg) -> CmdResult {
    let store = store_of(project);
    let id = TaskId::new(args.id);
    require(&store, &id)?;
    let mut state = read_ui_state(&project.tasks_dir);
    state.expanded = expand_ancestors(&store, &id, &state.expanded);
    write_ui_state(&project.tasks_dir, &state)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Write command handlers
// ---------------------------------------------------------------------------

fn cmd_add(project: &Project, args: AddArgs, json: bool) -> CmdResult {
    let store = store_of(project);
    let id = match args.id {
        Some(id) => TaskId::new(id),
        None => store.next_id(ID_PREFIX),
    };

    let mut record = TaskRecord::new(id.clone(), args.title, Utc::now());
    if let Some(parent) = args.parent {
        record = record.with_parent(parent);
    }
    if let Some(p) = args.priority {
        let priority = Priority::parse(&p).ok_or_else(|| {
            format!("unknown priority '{}' (expected: none, low, medium, high, critical)", p)
        })?;
        record = record.with_priority(priority);
    }
    if let Some(due) = args.due {
        record = record.with_due(parse_due(&due)?);
    }
    record.project_id = args.project;
    record.section_id = args.section;
    record.tags = args.tags;
    record.description = args.description;

    let store = submit(project, Mutation::Create { record }, json)?;
    print_record(&store, &id, "added", json)
}

fn cmd_due(project: &Project, args: DueArgs, json: bool) -> CmdResult {
    let id = TaskId::new(args.id);
    let due = match args.date.as_str() {
        "none" | "" => None,
        date => Some(parse_due(date)?),
    };
    let store = submit(project, Mutation::SetDueDate { id: id.clone(), due }, json)?;
    print_record(&store, &id, "updated", json)
}

fn cmd_set_completed(project: &Project, args: IdArg, completed: bool, json: bool) -> CmdResult {
    let id = TaskId::new(args.id);
    let store = submit(
        project,
        Mutation::SetCompleted {
            id: id.clone(),
            completed,
        },
        json,
    )?;
    print_record(&store, &id, if completed { "completed" } else { "reopened" }, json)
}

fn cmd_mv(project: &Project, args: MvArgs, json: bool) -> CmdResult {
    let id = TaskId::new(args.id);
    let store = submit(
        project,
        Mutation::Move {
            id: id.clone(),
            project_id: args.project,
            section_id: args.section,
        },
        json,
    )?;
    print_record(&store, &id, "moved", json)
}

fn cmd_reparent(project: &Project, args: ReparentArgs, json: bool) -> CmdResult {
    let id = TaskId::new(args.id);
    let store = submit(
        project,
        Mutation::Reparent {
            id: id.clone(),
            parent_id: args.parent.map(TaskId::new),
        },
        json,
    )?;
    print_record(&store, &id, "reparented", json)
}

fn cmd_rm(project: &Project, args: IdArg, json: bool) -> CmdResult {
    let before = store_of(project);
    let id = TaskId::new(args.id);
    let removed = before.descendants(&id).len() + 1;
    submit(project, Mutation::Delete { id: id.clone() }, json)?;

    // Drop deleted ids from the saved view state
    let after = project_io::load_records(&project.tasks_dir)?;
    let live: HashSet<&TaskId> = after.iter().map(|r| &r.id).collect();
    let mut state = read_ui_state(&project.tasks_dir);
    state.expanded.retain(|e| live.contains(e));
    write_ui_state(&project.tasks_dir, &state)?;

    if json {
        println!("{}", serde_json::json!({ "deleted": id, "count": removed }));
    } else {
        println!("deleted {} ({} task(s))", id, removed);
    }
    Ok(())
}

fn cmd_config(project: &Project, args: ConfigCmd) -> CmdResult {
    let (_, mut doc) = config_io::read_config(&project.tasks_dir)?;
    match args.action {
        ConfigAction::Sort { key } => {
            config_io::set_sort(&mut doc, key);
            config_io::write_config(&project.tasks_dir, &doc)?;
            println!("sort = {}", key.as_str());
        }
    }
    Ok(())
}
