use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::short_id::next_short_id;
use super::transport::Transport;
use super::{encode_component, now_timestamp, ApiError};
use crate::model::project::{NewProject, Project, ProjectPatch, ProjectStatus};

pub(crate) fn decode<T: DeserializeOwned>(value: Value) -> Result<T, ApiError> {
    Ok(serde_json::from_value(value)?)
}

fn record_path(id: &str) -> String {
    format!("/projects/{}", encode_component(id))
}

/// CRUD for `/projects`
#[derive(Clone)]
pub struct ProjectsApi {
    transport: Arc<dyn Transport>,
}

impl ProjectsApi {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        ProjectsApi { transport }
    }

    pub async fn list(&self) -> Result<Vec<Project>, ApiError> {
        decode(self.transport.get("/projects").await?)
    }

    pub async fn get(&self, id: &str) -> Result<Project, ApiError> {
        decode(self.transport.get(&record_path(id)).await?)
    }

    /// Create a project with the next short id.
    ///
    /// The id is derived from a fresh listing of all projects, so two creates
    /// racing against each other can pick the same id. The backend's echo of
    /// the record is returned, not the locally assembled one.
    pub async fn create(&self, draft: NewProject) -> Result<Project, ApiError> {
        let existing = self.list().await?;
        let id = next_short_id(existing.iter().map(|p| p.id.as_str()));
        let now = now_timestamp();

        let record = Project {
            id,
            name: draft.name,
            description: draft.description,
            status: ProjectStatus::Active,
            task_count: 0,
            completed_task_count: 0,
            created_at: now.clone(),
            updated_at: now,
        };
        tracing::debug!(id = %record.id, "creating project");
        decode(
            self.transport
                .post("/projects", serde_json::to_value(&record)?)
                .await?,
        )
    }

    /// Send `patch` with a fresh `updatedAt`. Nothing is merged locally.
    pub async fn update(&self, id: &str, patch: ProjectPatch) -> Result<Project, ApiError> {
        let patch = ProjectPatch {
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
}
