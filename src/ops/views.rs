//! Derived views over cached collections.
//!
//! Everything here is a pure function of a snapshot: callers decide when to
//! recompute (the caches memoize against collection versions).

use std::cmp::Ordering;
use std::collections::BTreeSet;

use icu_collator::{Collator, CollatorOptions};
use icu_locid::locale;

use crate::model::project::Project;
use crate::model::task::{OrderUpdate, Task, TaskStatus};
use crate::model::view::{FilterConfig, SortConfig, SortDirection, SortValue};

// ---------------------------------------------------------------------------
// Projects
// ---------------------------------------------------------------------------

thread_local! {
    // Ukrainian tailoring of the CLDR root order: Latin follows root, and the
    // Cyrillic letters ґ, є, і, ї sort as letters of their own
    static COLLATOR: Option<Collator> = {
        let locale = locale!("uk").into();
        Collator::try_new(&locale, CollatorOptions::new())
            .map_err(|e| tracing::warn!(error = %e, "collation data unavailable, sorting by code point"))
            .ok()
    };
}

/// Human-friendly string ordering by Unicode collation: accents and case only
/// break ties between otherwise equal letters, lowercase first.
pub fn locale_compare(a: &str, b: &str) -> Ordering {
    COLLATOR.with(|collator| match collator {
        Some(collator) => collator.compare(a, b),
        None => a.cmp(b),
    })
}

/// Compare two projects by a wire field name. Mixed or unknown fields compare
/// equal, which leaves the pair in its current relative order.
pub fn compare_projects(a: &Project, b: &Project, key: &str) -> Ordering {
    match (a.sort_value(key), b.sort_value(key)) {
        (Some(SortValue::Text(x)), Some(SortValue::Text(y))) => locale_compare(x, y),
        (Some(SortValue::Number(x)), Some(SortValue::Number(y))) => x.cmp(&y),
        _ => Ordering::Equal,
    }
}

pub fn matches_filter(project: &Project, filter: &FilterConfig) -> bool {
    if let Some(needle) = filter.name.as_deref().filter(|n| !n.is_empty()) {
        if !project
            .name
            .to_lowercase()
            .contains(&needle.to_lowercase())
        {
            return false;
        }
    }
    if let Some(status) = filter.status {
        if project.status != status {
            return false;
        }
    }
    true
}

/// Filter by name then status, then apply the sort (stable) if one is set
pub fn visible_projects(
    projects: &[Project],
    filter: &FilterConfig,
    sort: Option<&SortConfig>,
) -> Vec<Project> {
    let mut result: Vec<Project> = projects
        .iter()
        .filter(|p| matches_filter(p, filter))
        .cloned()
        .collect();

    if let Some(sort) = sort {
        result.sort_by(|a, b| {
            let ord = compare_projects(a, b, &sort.key);
            match sort.direction {
                SortDirection::Asc => ord,
                SortDirection::Desc => ord.reverse(),
            }
        });
    }
    result
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

/// Tasks of one project ascending by `order`. Empty when no project is given.
pub fn tasks_for_project(tasks: &[Task], project_id: Option<&str>) -> Vec<Task> {
    let Some(project_id) = project_id else {
        return Vec::new();
    };
    let mut result: Vec<Task> = tasks
        .iter()
        .filter(|t| t.project_id == project_id)
        .cloned()
        .collect();
    result.sort_by_key(|t| t.order);
    result
}

/// The three status columns of a board, each keeping its input order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusBuckets {
    pub to_do: Vec<Task>,
    pub in_progress: Vec<Task>,
    pub done: Vec<Task>,
}

impl StatusBuckets {
    pub fn get(&self, status: TaskStatus) -> &[Task] {
        match status {
            TaskStatus::ToDo => &self.to_do,
            TaskStatus::InProgress => &self.in_progress,
            TaskStatus::Done => &self.done,
        }
    }

    fn bucket_mut(&mut self, status: TaskStatus) -> &mut Vec<Task> {
        match status {
            TaskStatus::ToDo => &mut self.to_do,
            TaskStatus::InProgress => &mut self.in_progress,
            TaskStatus::Done => &mut self.done,
        }
    }

    /// Buckets in board order
    pub fn iter(&self) -> impl Iterator<Item = (TaskStatus, &[Task])> {
        TaskStatus::ALL.into_iter().map(|s| (s, self.get(s)))
    }
}

pub fn group_by_status(tasks: &[Task]) -> StatusBuckets {
    let mut buckets = StatusBuckets::default();
    for task in tasks {
        buckets.bucket_mut(task.status).push(task.clone());
    }
    buckets
}

/// Sorted, de-duplicated assignee names
pub fn distinct_assignees(tasks: &[Task]) -> Vec<String> {
    tasks
        .iter()
        .map(|t| t.assignee.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Order value that puts a task after everything in `status` (1 when empty)
pub fn next_order_in_status(tasks: &[Task], status: TaskStatus) -> i64 {
    tasks
        .iter()
        .filter(|t| t.status == status)
        .map(|t| t.order)
        .max()
        .unwrap_or(0)
        + 1
}

/// 1-based positions for a drag-and-drop result
pub fn reorder_plan<S: AsRef<str>>(ordered_ids: &[S]) -> Vec<OrderUpdate> {
    ordered_ids
        .iter()
        .enumerate()
        .map(|(i, id)| OrderUpdate {
            id: id.as_ref().to_string(),
            order: i as i64 + 1,
        })
        .collect()
}
