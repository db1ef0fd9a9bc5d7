use std::path::Path;

use crate::cli::commands::*;
use crate::cli::output::*;
use crate::context::AppContext;
use crate::io::config_io;
use crate::model::config::ClientConfig;
use crate::model::project::{NewProject, ProjectPatch};
use crate::model::task::{NewTask, TaskPatch};
use crate::model::view::{FilterConfig, SortConfig, SortDirection};

type CmdResult = Result<(), Box<dyn std::error::Error>>;

// ---------------------------------------------------------------------------
// Setup
// ---------------------------------------------------------------------------

/// Config file, then env/flag overrides
pub fn resolve_config(cli: &Cli, cwd: &Path) -> Result<ClientConfig, config_io::ConfigError> {
    let mut config = config_io::read_config(cli.config.as_deref(), cwd)?;
    if let Some(url) = &cli.api_url {
        config.api_url = url.clone();
    }
    if let Some(dir) = &cli.state_dir {
        config.state_dir = dir.clone();
    }
    Ok(config)
}

pub async fn dispatch(cli: Cli) -> CmdResult {
    let cwd = std::env::current_dir()?;
    let config = resolve_config(&cli, &cwd)?;
    let mut ctx = if cli.offline {
        AppContext::offline(&config)
    } else {
        AppContext::connect(&config)?
    };
    let json = cli.json;

    match cli.command {
        Commands::Projects(args) => cmd_projects(&mut ctx, args, json).await,
        Commands::Project(cmd) => match cmd {
            ProjectCmd::Add(args) => cmd_project_add(&mut ctx, args, json).await,
            ProjectCmd::Set(args) => cmd_project_set(&mut ctx, args, json).await,
            ProjectCmd::Rm(args) => cmd_project_rm(&mut ctx, args).await,
        },
        Commands::Tasks(args) => cmd_tasks(&mut ctx, args, json).await,
        Commands::Task(cmd) => match cmd {
            TaskCmd::Add(args) => cmd_task_add(&mut ctx, args, json).await,
            TaskCmd::Set(args) => cmd_task_set(&mut ctx, args, json).await,
            TaskCmd::Mv(args) => cmd_task_mv(&mut ctx, args, json).await,
            TaskCmd::Reorder(args) => cmd_task_reorder(&mut ctx, args, json).await,
            TaskCmd::Rm(args) => cmd_task_rm(&mut ctx, args).await,
        },
        Commands::Assignees(args) => cmd_assignees(&mut ctx, args, json).await,
    }
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> CmdResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Load a project's tasks, turning a recorded load error into a command error
async fn load_tasks(ctx: &mut AppContext, project: &str) -> CmdResult {
    ctx.tasks.load_for_project(project).await;
    match ctx.tasks.error() {
        Some(message) => Err(message.into()),
        None => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Projects
// ---------------------------------------------------------------------------

async fn cmd_projects(ctx: &mut AppContext, args: ProjectsArgs, json: bool) -> CmdResult {
    ctx.projects.refresh().await;
    if let Some(message) = ctx.projects.error() {
        return Err(message.into());
    }

    ctx.projects.set_filter_config(FilterConfig {
        name: args.name,
        status: args.status,
    });
    let direction = if args.desc {
        SortDirection::Desc
    } else {
        SortDirection::Asc
    };
    ctx.projects
        .set_sort_config(args.sort.map(|key| SortConfig::new(key, direction)));

    let visible = ctx.projects.visible_projects();
    if json {
        print_json(&*visible)
    } else {
        print!("{}", format_project_list(&visible));
        Ok(())
    }
}

async fn cmd_project_add(ctx: &mut AppContext, args: ProjectAddArgs, json: bool) -> CmdResult {
    let project = ctx
        .projects
        .create(NewProject {
            name: args.name,
            description: args.description,
        })
        .await?;
    if json {
        print_json(&project)
    } else {
        println!("{}", project.id);
        Ok(())
    }
}

async fn cmd_project_set(ctx: &mut AppContext, args: ProjectSetArgs, json: bool) -> CmdResult {
    let patch = ProjectPatch {
        name: args.name,
        description: args.description,
        status: args.status,
        ..Default::default()
    };
    if patch.is_empty() {
        return Err("nothing to change (use --name, --description or --status)".into());
    }
    // Populate the cache so the backend copy replaces the cached one
    ctx.projects.refresh().await;
    let project = ctx.projects.update(&args.id, patch).await?;
    if json {
        print_json(&project)
    } else {
        println!("{}", format_project_line(&project));
        Ok(())
    }
}

async fn cmd_project_rm(ctx: &mut AppContext, args: IdArg) -> CmdResult {
    ctx.projects.delete(&args.id).await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

async fn cmd_tasks(ctx: &mut AppContext, args: TasksArgs, json: bool) -> CmdResult {
    load_tasks(ctx, &args.project).await?;

    if args.by_status {
        let buckets = ctx.tasks.tasks_grouped_by_status();
        if json {
            print_json(&board_json(&args.project, &buckets))
        } else {
            print!("{}", format_board(&buckets));
            Ok(())
        }
    } else {
        let tasks = ctx.tasks.tasks_for_current_project();
        if json {
            print_json(&*tasks)
        } else {
            print!("{}", format_task_list(&tasks));
            Ok(())
        }
    }
}

async fn cmd_task_add(ctx: &mut AppContext, args: TaskAddArgs, json: bool) -> CmdResult {
    let task = ctx
        .tasks
        .create(NewTask {
            project_id: args.project,
            title: args.title,
            description: args.description,
            assignee: args.assignee,
            status: args.status,
            due_date: args.due,
        })
        .await?;
    if json {
        print_json(&task)
    } else {
        println!("{}", task.id);
        Ok(())
    }
}

async fn cmd_task_set(ctx: &mut AppContext, args: TaskSetArgs, json: bool) -> CmdResult {
    let patch = TaskPatch {
        title: args.title,
        description: args.description,
        assignee: args.assignee,
        status: args.status,
        due_date: args.due,
        ..Default::default()
    };
    if patch.is_empty() {
        return Err(
            "nothing to change (use --title, --description, --assignee, --status or --due)".into(),
        );
    }
    let task = ctx.tasks.update(&args.id, patch).await?;
    if json {
        print_json(&task)
    } else {
        println!("{}", format_task_line(&task));
        Ok(())
    }
}

async fn cmd_task_mv(ctx: &mut AppContext, args: TaskMvArgs, json: bool) -> CmdResult {
    // The target column is computed from the task's own project
    let current = ctx.tasks.fetch(&args.id).await?;
    load_tasks(ctx, &current.project_id).await?;

    let moved = ctx
        .tasks
        .change_status(&args.id, args.status)
        .await?
        .ok_or_else(|| format!("task not found: {}", args.id))?;
    if json {
        print_json(&moved)
    } else {
        println!("{}", format_task_line(&moved));
        Ok(())
    }
}

async fn cmd_task_reorder(ctx: &mut AppContext, args: TaskReorderArgs, json: bool) -> CmdResult {
    load_tasks(ctx, &args.project).await?;
    for id in &args.ids {
        match ctx.tasks.find(id) {
            Some(task) if task.project_id == args.project => {}
            Some(_) => return Err(format!("task {} is not in project {}", id, args.project).into()),
            None => return Err(format!("task not found: {}", id).into()),
        }
    }

    ctx.tasks.reorder(&args.ids).await?;

    let tasks = ctx.tasks.tasks_for_current_project();
    if json {
        print_json(&*tasks)
    } else {
        print!("{}", format_task_list(&tasks));
        Ok(())
    }
}

async fn cmd_task_rm(ctx: &mut AppContext, args: IdArg) -> CmdResult {
    ctx.tasks.delete(&args.id).await?;
    Ok(())
}

async fn cmd_assignees(ctx: &mut AppContext, args: AssigneesArgs, json: bool) -> CmdResult {
    load_tasks(ctx, &args.project).await?;
    let assignees = ctx.tasks.distinct_assignees();
    if json {
        print_json(&assignees)
    } else {
        for name in assignees.iter().filter(|n| !n.is_empty()) {
            println!("{}", name);
        }
        Ok(())
    }
}
