use std::sync::Arc;

use futures::future::join_all;

use super::projects::decode;
use super::short_id::next_short_id;
use super::transport::Transport;
use super::{encode_component, now_timestamp, ApiError};
use crate::model::task::{NewTask, OrderUpdate, Task, TaskPatch, TaskStatus};

fn record_path(id: &str) -> String {
    format!("/tasks/{}", encode_component(id))
}

/// CRUD for `/tasks`, plus order bookkeeping
#[derive(Clone)]
pub struct TasksApi {
    transport: Arc<dyn Transport>,
}

impl TasksApi {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        TasksApi { transport }
    }

    pub async fn list(&self) -> Result<Vec<Task>, ApiError> {
        decode(self.transport.get("/tasks").await?)
    }

    /// Tasks of one project, ascending by `order` (ties keep backend order)
    pub async fn list_by_project(&self, project_id: &str) -> Result<Vec<Task>, ApiError> {
        let mut tasks: Vec<Task> = decode(
            self.transport
                .get(&format!("/tasks?projectId={}", encode_component(project_id)))
                .await?,
        )?;
        tasks.sort_by_key(|t| t.order);
        Ok(tasks)
    }

    pub async fn get(&self, id: &str) -> Result<Task, ApiError> {
        decode(self.transport.get(&record_path(id)).await?)
    }

    /// Create a task at the end of its project with the next short id.
    ///
    /// `order` is one past the highest order in the task's project. The id is
    /// one past the highest short id across *all* tasks, so task ids stay
    /// unique system-wide.
    pub async fn create(&self, draft: NewTask) -> Result<Task, ApiError> {
        let siblings = self.list_by_project(&draft.project_id).await?;
        let order = siblings.iter().map(|t| t.order).max().unwrap_or(0) + 1;

        let all = self.list().await?;
        let id = next_short_id(all.iter().map(|t| t.id.as_str()));

        let now = now_timestamp();
        let record = Task {
            id,
            project_id: draft.project_id,
            title: draft.title,
            description: draft.description,
            assignee: draft.assignee,
            status: draft.status,
            due_date: draft.due_date,
            created_at: now.clone(),
            updated_at: now,
            order,
        };
        tracing::debug!(id = %record.id, project = %record.project_id, order, "creating task");
        decode(
            self.transport
                .post("/tasks", serde_json::to_value(&record)?)
                .await?,
        )
    }

    /// Send `patch` with a fresh `updatedAt`. Nothing is merged locally.
    pub async fn update(&self, id: &str, patch: TaskPatch) -> Result<Task, ApiError> {
        let patch = TaskPatch {
            updated_at: Some(now_timestamp()),
            ..patch
        };
        decode(
            self.transport
                .patch(&record_path(id), serde_json::to_value(&patch)?)
                .await?,
        )
    }

    pub async fn delete(&self, id: &str) -> Result<(), ApiError> {
        self.transport.delete(&record_path(id)).await
    }

    /// Submit one PATCH per entry, all in flight at once.
    ///
    /// Not transactional: every request runs to completion and the first
    /// failure is returned, but entries that did succeed stay applied on the
    /// backend.
    pub async fn update_order(&self, updates: &[OrderUpdate]) -> Result<(), ApiError> {
        let stamp = now_timestamp();
        let requests = updates.iter().map(|u| {
            let path = record_path(&u.id);
            let patch = TaskPatch {
                order: Some(u.order),
                updated_at: Some(stamp.clone()),
                ..Default::default()
            };
            async move {
                let body = serde_json::to_value(&patch)?;
                self.transport.patch(&path, body).await
            }
        });
        let results = join_all(requests).await;

        let failed = results.iter().filter(|r| r.is_err()).count();
        match results.into_iter().find_map(Result::err) {
            Some(err) => {
                tracing::warn!(failed, total = updates.len(), "order batch partially failed");
                Err(err)
            }
            None => Ok(()),
        }
    }

    pub async fn update_status(&self, id: &str, status: TaskStatus) -> Result<Task, ApiError> {
        self.update(
            id,
            TaskPatch {
                status: Some(status),
                ..Default::default()
            },
        )
        .await
    }
}
