use std::fs;
use std::sync::Arc;

use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::TempDir;

use taskdeck::AppContext;
use taskdeck::api::MemoryBackend;
use taskdeck::io::storage::{FileStore, KeyValueStore};
use taskdeck::model::{
    FilterConfig, NewProject, NewTask, ProjectPatch, ProjectStatus, SortConfig, SortDirection,
    TaskStatus,
};
use taskdeck::ops::views;

/// A session against `backend` whose snapshot lives in `dir`
fn session(backend: &Arc<MemoryBackend>, dir: &TempDir) -> AppContext {
    let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::new(dir.path()));
    AppContext::new(backend.clone(), store)
}

fn draft_task(project_id: &str, title: &str, assignee: &str) -> NewTask {
    NewTask {
        project_id: project_id.into(),
        title: title.into(),
        description: String::new(),
        assignee: assignee.into(),
        status: TaskStatus::ToDo,
        due_date: String::new(),
    }
}

#[tokio::test]
async fn round_trip_collections_across_restart() {
    let dir = TempDir::new().unwrap();
    let backend = Arc::new(MemoryBackend::new());

    let mut first = session(&backend, &dir);
    let website = first
        .projects
        .create(NewProject {
            name: "Website".into(),
            description: "Relaunch".into(),
        })
        .await
        .unwrap();
    first
        .projects
        .update(
            &website.id,
            ProjectPatch {
                status: Some(ProjectStatus::OnHold),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    first.tasks.load_for_project(&website.id).await;
    for (title, who) in [("Copy", "Dana"), ("Layout", "Lee"), ("Launch", "")] {
        first
            .tasks
            .create(draft_task(&website.id, title, who))
            .await
            .unwrap();
    }
    first.tasks.reorder(&["3", "1", "2"]).await.unwrap();

    let projects = first.projects.projects().to_vec();
    let tasks = first.tasks.tasks().to_vec();
    drop(first);

    // No backend traffic needed: the caches come straight from the slots
    let second = session(&Arc::new(MemoryBackend::new()), &dir);
    assert_eq!(second.projects.projects(), projects.as_slice());
    assert_eq!(second.tasks.tasks(), tasks.as_slice());
    assert_eq!(second.projects.projects()[0].status, ProjectStatus::OnHold);
}

#[tokio::test]
async fn round_trip_view_settings_across_restart() {
    let dir = TempDir::new().unwrap();
    let backend = Arc::new(MemoryBackend::new());

    let mut first = session(&backend, &dir);
    first
        .projects
        .set_sort_config(Some(SortConfig::new("taskCount", SortDirection::Desc)));
    first.projects.set_filter_config(FilterConfig {
        name: Some("site".into()),
        status: Some(ProjectStatus::Active),
    });
    drop(first);

    let second = session(&backend, &dir);
    assert_eq!(
        second.projects.sort_config(),
        Some(&SortConfig::new("taskCount", SortDirection::Desc))
    );
    assert_eq!(second.projects.filter_config().name.as_deref(), Some("site"));
    assert_eq!(
        second.projects.filter_config().status,
        Some(ProjectStatus::Active)
    );
}

#[test]
fn slot_files_hold_the_wire_shape() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("projects.json"),
        json!([{
            "id": 4,
            "name": "Docs",
            "description": "",
            "status": "completed",
            "taskCount": 2,
            "completedTaskCount": 2,
            "createdAt": "2024-03-01T10:00:00.000Z",
            "updatedAt": "2024-03-02T10:00:00.000Z"
        }])
        .to_string(),
    )
    .unwrap();

    let ctx = session(&Arc::new(MemoryBackend::new()), &dir);
    let project = &ctx.projects.projects()[0];
    // Numeric ids are accepted and kept as strings
    assert_eq!(project.id, "4");
    assert_eq!(project.status, ProjectStatus::Completed);
    assert_eq!(project.completed_task_count, 2);
}

#[test]
fn malformed_slots_fall_back_to_defaults() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("projects.json"), "[{\"id\": ").unwrap();
    fs::write(dir.path().join("tasks.json"), "").unwrap();
    fs::write(dir.path().join("projectsSortConfig.json"), "\"name\"").unwrap();

    let ctx = session(&Arc::new(MemoryBackend::new()), &dir);
    assert!(ctx.projects.projects().is_empty());
    assert!(ctx.tasks.tasks().is_empty());
    assert_eq!(ctx.projects.sort_config(), None);
    assert!(ctx.projects.filter_config().is_empty());
}

#[tokio::test]
async fn ids_continue_from_restored_backend() {
    let dir = TempDir::new().unwrap();
    let backend = Arc::new(MemoryBackend::new());
    backend.seed(
        "projects",
        ["1", "2", "7"].map(|id| {
            json!({ "id": id, "name": format!("P{}", id), "status": "active" })
        }),
    );
    backend.seed(
        "tasks",
        [
            json!({ "id": "3", "projectId": "P", "title": "a", "status": "to_do", "order": 5 }),
            json!({ "id": "12", "projectId": "Q", "title": "b", "status": "done", "order": 1 }),
        ],
    );

    let mut ctx = session(&backend, &dir);
    let project = ctx
        .projects
        .create(NewProject {
            name: "Next".into(),
            description: String::new(),
        })
        .await
        .unwrap();
    assert_eq!(project.id, "8");

    let task = ctx.tasks.create(draft_task("P", "c", "")).await.unwrap();
    assert_eq!(task.id, "13");
    assert_eq!(task.order, 6);
}

#[tokio::test]
async fn deleting_an_uncached_project_is_a_no_op_locally() {
    let dir = TempDir::new().unwrap();
    let backend = Arc::new(MemoryBackend::new());
    backend.seed(
        "projects",
        [json!({ "id": "5", "name": "Remote only", "status": "active" })],
    );

    let mut ctx = session(&backend, &dir);
    let before = ctx.projects.projects().to_vec();
    ctx.projects.delete("5").await.unwrap();

    assert_eq!(ctx.projects.projects(), before.as_slice());
    assert_eq!(ctx.projects.error(), None);
    assert!(backend.records("projects").is_empty());
}

#[tokio::test]
async fn change_status_appends_after_column_max() {
    let dir = TempDir::new().unwrap();
    let backend = Arc::new(MemoryBackend::new());
    backend.seed(
        "tasks",
        [
            json!({ "id": "1", "projectId": "P", "title": "a", "status": "done", "order": 4 }),
            json!({ "id": "2", "projectId": "P", "title": "b", "status": "to_do", "order": 9 }),
            json!({ "id": "3", "projectId": "Q", "title": "c", "status": "done", "order": 40 }),
        ],
    );

    let mut ctx = session(&backend, &dir);
    ctx.tasks.load_for_project("P").await;
    let moved = ctx
        .tasks
        .change_status("2", TaskStatus::Done)
        .await
        .unwrap()
        .unwrap();

    // Project Q's done column does not count
    assert_eq!(moved.order, 5);
    assert_eq!(moved.project_id, "P");

    ctx.tasks.load_for_project("P").await;
    let empty = ctx
        .tasks
        .change_status("1", TaskStatus::InProgress)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(empty.order, 1);
}

#[test]
fn filter_predicates_commute() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("projects.json"),
        json!([
            { "id": "1", "name": "Foo site", "status": "completed" },
            { "id": "2", "name": "Foo app", "status": "active" },
            { "id": "3", "name": "Bar", "status": "completed" },
            { "id": "4", "name": "football", "status": "completed" }
        ])
        .to_string(),
    )
    .unwrap();
    let ctx = session(&Arc::new(MemoryBackend::new()), &dir);
    let all = ctx.projects.projects();

    let by_status = FilterConfig {
        name: None,
        status: Some(ProjectStatus::Completed),
    };
    let by_name = FilterConfig {
        name: Some("Foo".into()),
        status: None,
    };
    let both = FilterConfig {
        name: Some("Foo".into()),
        status: Some(ProjectStatus::Completed),
    };

    let status_then_name = views::visible_projects(
        &views::visible_projects(all, &by_status, None),
        &by_name,
        None,
    );
    let name_then_status = views::visible_projects(
        &views::visible_projects(all, &by_name, None),
        &by_status,
        None,
    );
    let combined = views::visible_projects(all, &both, None);

    let ids = |list: &[taskdeck::model::Project]| -> Vec<String> {
        list.iter().map(|p| p.id.clone()).collect()
    };
    assert_eq!(ids(&status_then_name), vec!["1", "4"]);
    assert_eq!(ids(&status_then_name), ids(&name_then_status));
    assert_eq!(ids(&status_then_name), ids(&combined));
}
