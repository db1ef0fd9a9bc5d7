use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::model::project::ProjectStatus;
use crate::model::task::TaskStatus;

#[derive(Parser)]
#[command(name = "td", about = concat!("taskdeck v", env!("CARGO_PKG_VERSION"), " - projects and tasks, cached locally"), version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Config file (default: ./taskdeck.toml if present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Backend base URL (overrides the config file)
    #[arg(long, env = "TASKDECK_API_URL", global = true)]
    pub api_url: Option<String>,

    /// Directory for the local snapshot (overrides the config file)
    #[arg(long, env = "TASKDECK_STATE_DIR", global = true)]
    pub state_dir: Option<PathBuf>,

    /// Work from the local snapshot without contacting a server
    #[arg(long, global = true)]
    pub offline: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List projects
    Projects(ProjectsArgs),
    /// Create, edit or delete a project
    #[command(subcommand)]
    Project(ProjectCmd),
    /// List a project's tasks
    Tasks(TasksArgs),
    /// Create, edit, move or delete tasks
    #[command(subcommand)]
    Task(TaskCmd),
    /// List everyone assigned to a task in a project
    Assignees(AssigneesArgs),
}

// ---------------------------------------------------------------------------
// Project commands
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct ProjectsArgs {
    /// Only projects whose name contains this text (case-insensitive)
    #[arg(long)]
    pub name: Option<String>,
    /// Only projects in this status
    #[arg(long)]
    pub status: Option<ProjectStatus>,
    /// Sort by field (name, status, taskCount, createdAt, ...)
    #[arg(long)]
    pub sort: Option<String>,
    /// Sort descending
    #[arg(long, requires = "sort")]
    pub desc: bool,
}

#[derive(Subcommand)]
pub enum ProjectCmd {
    /// Create a project
    Add(ProjectAddArgs),
    /// Edit a project
    Set(ProjectSetArgs),
    /// Delete a project
    Rm(IdArg),
}

#[derive(Args)]
pub struct ProjectAddArgs {
    pub name: String,
    #[arg(long, default_value = "")]
    pub description: String,
}

#[derive(Args)]
pub struct ProjectSetArgs {
    pub id: String,
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub description: Option<String>,
    #[arg(long)]
    pub status: Option<ProjectStatus>,
}

#[derive(Args)]
pub struct IdArg {
    pub id: String,
}

// ---------------------------------------------------------------------------
// Task commands
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct TasksArgs {
    /// Project ID
    pub project: String,
    /// Group tasks into status columns
    #[arg(long)]
    pub by_status: bool,
}

#[derive(Subcommand)]
pub enum TaskCmd {
    /// Create a task at the end of a project
    Add(TaskAddArgs),
    /// Edit a task
    Set(TaskSetArgs),
    /// Move a task to the end of another status column
    Mv(TaskMvArgs),
    /// Rewrite the order of a project's tasks
    Reorder(TaskReorderArgs),
    /// Delete a task
    Rm(IdArg),
}

#[derive(Args)]
pub struct TaskAddArgs {
    /// Project ID
    pub project: String,
    pub title: String,
    #[arg(long, default_value = "")]
    pub description: String,
    #[arg(long, default_value = "")]
    pub assignee: String,
    #[arg(long, default_value = "to_do")]
    pub status: TaskStatus,
    /// Due date (free text, typically YYYY-MM-DD)
    #[arg(long, default_value = "")]
    pub due: String,
}

#[derive(Args)]
pub struct TaskSetArgs {
    pub id: String,
    #[arg(long)]
    pub title: Option<String>,
    #[arg(long)]
    pub description: Option<String>,
    #[arg(long)]
    pub assignee: Option<String>,
    /// Set status without moving the task
    #[arg(long)]
    pub status: Option<TaskStatus>,
    #[arg(long)]
    pub due: Option<String>,
}

#[derive(Args)]
pub struct TaskMvArgs {
    pub id: String,
    pub status: TaskStatus,
}

#[derive(Args)]
pub struct TaskReorderArgs {
    /// Project ID
    pub project: String,
    /// Task IDs in their new order
    #[arg(required = true)]
    pub ids: Vec<String>,
}

#[derive(Args)]
pub struct AssigneesArgs {
    /// Project ID
    pub project: String,
}
