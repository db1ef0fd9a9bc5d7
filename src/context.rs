use std::sync::Arc;

use crate::api::{ApiError, HttpTransport, MemoryBackend, ProjectsApi, TasksApi, Transport};
use crate::io::storage::{FileStore, KeyValueStore};
use crate::model::config::ClientConfig;
use crate::ops::events::EventBus;
use crate::ops::project_cache::ProjectCache;
use crate::ops::task_cache::TaskCache;

/// Everything a session needs, built once at startup and passed down.
///
/// Each cache owns its own durable slots, so both can share one store.
pub struct AppContext {
    pub projects: ProjectCache,
    pub tasks: TaskCache,
    pub events: Arc<EventBus>,
}

impl AppContext {
    pub fn new(transport: Arc<dyn Transport>, store: Arc<dyn KeyValueStore>) -> Self {
        let events = Arc::new(EventBus::new());
        AppContext {
            projects: ProjectCache::new(
                ProjectsApi::new(transport.clone()),
                store.clone(),
                events.clone(),
            ),
            tasks: TaskCache::new(TasksApi::new(transport), store, events.clone()),
            events,
        }
    }

    /// HTTP backend from `config.api_url`, snapshots under `config.state_dir`
    pub fn connect(config: &ClientConfig) -> Result<Self, ApiError> {
        let transport = Arc::new(HttpTransport::new(config)?);
        let store = Arc::new(FileStore::new(&config.state_dir));
        Ok(Self::new(transport, store))
    }

    /// Work against the persisted snapshot with no server.
    ///
    /// An in-process backend is seeded from the cached collections, so reads
    /// return what the last session saw and writes land in the snapshot.
    pub fn offline(config: &ClientConfig) -> Self {
        let backend = Arc::new(MemoryBackend::new());
        let store = Arc::new(FileStore::new(&config.state_dir));
        let context = Self::new(backend.clone(), store);

        let projects = context
            .projects
            .projects()
            .iter()
            .filter_map(|p| serde_json::to_value(p).ok());
        backend.seed("projects", projects);
        let tasks = context
            .tasks
            .tasks()
            .iter()
            .filter_map(|t| serde_json::to_value(t).ok());
        backend.seed("tasks", tasks);
        tracing::debug!(
            projects = context.projects.projects().len(),
            tasks = context.tasks.tasks().len(),
            "offline backend seeded from snapshot"
        );
        context
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::project::NewProject;
    use crate::model::task::{NewTask, TaskStatus};
    use tempfile::TempDir;

    #[tokio::test]
    async fn offline_session_survives_restart() {
        let tmp = TempDir::new().unwrap();
        let config = ClientConfig {
            state_dir: tmp.path().to_path_buf(),
            ..Default::default()
        };

        let mut first = AppContext::offline(&config);
        let project = first
            .projects
            .create(NewProject {
                name: "Garden".into(),
                description: String::new(),
            })
            .await
            .unwrap();
        first
            .tasks
            .create(NewTask {
                project_id: project.id.clone(),
                title: "Plant tomatoes".into(),
                description: String::new(),
                assignee: "Lee".into(),
                status: TaskStatus::ToDo,
                due_date: String::new(),
            })
            .await
            .unwrap();
        drop(first);

        let mut second = AppContext::offline(&config);
        second.projects.refresh().await;
        second.tasks.load_for_project(&project.id).await;

        assert_eq!(second.projects.projects().len(), 1);
        assert_eq!(second.projects.projects()[0].name, "Garden");
        assert_eq!(second.tasks.tasks_for_current_project().len(), 1);
        assert_eq!(second.tasks.distinct_assignees(), vec!["Lee"]);
    }
}
