use serde::Serialize;

use crate::model::project::Project;
use crate::model::task::{Task, TaskStatus};
use crate::ops::views::StatusBuckets;

// ---------------------------------------------------------------------------
// JSON output structs
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct BoardColumnJson<'a> {
    pub status: TaskStatus,
    pub tasks: &'a [Task],
}

#[derive(Serialize)]
pub struct BoardJson<'a> {
    pub project: &'a str,
    pub columns: Vec<BoardColumnJson<'a>>,
}

pub fn board_json<'a>(project: &'a str, buckets: &'a StatusBuckets) -> BoardJson<'a> {
    BoardJson {
        project,
        columns: buckets
            .iter()
            .map(|(status, tasks)| BoardColumnJson { status, tasks })
            .collect(),
    }
}

// ---------------------------------------------------------------------------
// Text formatting
// ---------------------------------------------------------------------------

/// `  3  active     Website relaunch  (2/5 done)`
pub fn format_project_line(project: &Project) -> String {
    format!(
        "{:>3}  {:<9}  {}  ({}/{} done)",
        project.id,
        project.status.as_str(),
        project.name,
        project.completed_task_count,
        project.task_count
    )
}

pub fn format_project_list(projects: &[Project]) -> String {
    if projects.is_empty() {
        return "No projects\n".to_string();
    }
    let mut out = String::new();
    for project in projects {
        out.push_str(&format_project_line(project));
        out.push('\n');
    }
    out
}

/// `  7  [in_progress]  Write docs  @Dana  due 2024-05-01`
pub fn format_task_line(task: &Task) -> String {
    let mut line = format!(
        "{:>3}  [{}]  {}",
        task.id,
        task.status.as_str(),
        task.title
    );
    if !task.assignee.is_empty() {
        line.push_str(&format!("  @{}", task.assignee));
    }
    if !task.due_date.is_empty() {
        line.push_str(&format!("  due {}", task.due_date));
    }
    line
}

pub fn format_task_list(tasks: &[Task]) -> String {
    if tasks.is_empty() {
        return "No tasks\n".to_string();
    }
    let mut out = String::new();
    for task in tasks {
        out.push_str(&format_task_line(task));
        out.push('\n');
    }
    out
}

pub fn format_board(buckets: &StatusBuckets) -> String {
    let mut out = String::new();
    for (i, (status, tasks)) in buckets.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        out.push_str(&format!("{} ({})\n", status.as_str(), tasks.len()));
        for task in tasks {
            out.push_str(&format_task_line(task));
            out.push('\n');
        }
    }
    out
}
