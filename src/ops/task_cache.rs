use std::sync::{Arc, Mutex, PoisonError};

use crate::api::{ApiError, TasksApi};
use crate::io::persist::Synced;
use crate::io::storage::KeyValueStore;
use crate::model::task::{NewTask, Task, TaskPatch, TaskStatus};
use crate::ops::events::{CacheEvent, CacheKind, EventBus};
use crate::ops::views::{self, StatusBuckets};

pub const TASKS_KEY: &str = "tasks";

pub const LOAD_FAILED: &str = "Failed to load tasks";
pub const CREATE_FAILED: &str = "Failed to create task";
pub const UPDATE_FAILED: &str = "Failed to update task";
pub const DELETE_FAILED: &str = "Failed to delete task";
pub const REORDER_FAILED: &str = "Failed to update task order";
pub const STATUS_FAILED: &str = "Failed to update task status";

/// Client-side copy of tasks for every project loaded so far.
///
/// Views are scoped to `current_project_id`. Loading one project only swaps
/// that project's tasks, so switching between projects never evicts the
/// others from the cache.
pub struct TaskCache {
    api: TasksApi,
    tasks: Synced<Vec<Task>>,
    current_project_id: Option<String>,
    /// Bumped whenever `current_project_id` changes
    scope_version: u64,
    loading: bool,
    error: Option<String>,
    events: Arc<EventBus>,
    scoped: Mutex<Option<((u64, u64), Arc<[Task]>)>>,
}

impl TaskCache {
    pub fn new(api: TasksApi, store: Arc<dyn KeyValueStore>, events: Arc<EventBus>) -> Self {
        TaskCache {
            api,
            tasks: Synced::attach(store, TASKS_KEY, Vec::new()),
            current_project_id: None,
            scope_version: 0,
            loading: false,
            error: None,
            events,
            scoped: Mutex::new(None),
        }
    }

    // -----------------------------------------------------------------------
    // Read access
    // -----------------------------------------------------------------------

    /// All cached tasks, every project mixed together
    pub fn tasks(&self) -> &[Task] {
        self.tasks.get()
    }

    pub fn find(&self, id: &str) -> Option<&Task> {
        self.tasks.get().iter().find(|t| t.id == id)
    }

    pub fn loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn current_project_id(&self) -> Option<&str> {
        self.current_project_id.as_deref()
    }

    /// Tasks of the current project, ascending by `order`
    pub fn tasks_for_current_project(&self) -> Arc<[Task]> {
        let key = (self.tasks.version(), self.scope_version);
        let mut memo = self.scoped.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some((cached_key, view)) = memo.as_ref() {
            if *cached_key == key {
                return view.clone();
            }
        }
        let view: Arc<[Task]> =
            views::tasks_for_project(self.tasks.get(), self.current_project_id()).into();
        *memo = Some((key, view.clone()));
        view
    }

    pub fn tasks_grouped_by_status(&self) -> StatusBuckets {
        views::group_by_status(&self.tasks_for_current_project())
    }

    pub fn distinct_assignees(&self) -> Vec<String> {
        views::distinct_assignees(&self.tasks_for_current_project())
    }

    /// Read one task straight from the backend. The cache is not touched.
    pub async fn fetch(&self, id: &str) -> Result<Task, ApiError> {
        self.api.get(id).await
    }

    pub fn clear_error(&mut self) {
        self.set_error(None);
    }

    pub fn clear_current_project(&mut self) {
        self.set_current_project(None);
    }

    // -----------------------------------------------------------------------
    // Mutators
    // -----------------------------------------------------------------------

    /// Make `project_id` current and refresh its tasks from the backend.
    ///
    /// Only that project's slice of the cache is replaced. Failures land in
    /// `error()` and are not returned.
    pub async fn load_for_project(&mut self, project_id: &str) {
        self.begin();
        self.set_current_project(Some(project_id.to_string()));

        match self.api.list_by_project(project_id).await {
            Ok(fresh) => {
                tracing::debug!(project = %project_id, count = fresh.len(), "tasks loaded");
                self.tasks.mutate(|list| {
                    list.retain(|t| t.project_id != project_id);
                    list.extend(fresh);
                });
                self.tasks_changed();
            }
            Err(e) => self.fail(LOAD_FAILED, &e),
        }
        self.finish();
    }

    pub async fn create(&mut self, draft: NewTask) -> Result<Task, ApiError> {
        self.begin();
        let result = self.api.create(draft).await;
        match &result {
            Ok(task) => {
                self.tasks.mutate(|list| list.push(task.clone()));
                self.tasks_changed();
            }
            Err(e) => self.fail(CREATE_FAILED, e),
        }
        self.finish();
        result
    }

    /// Send `patch` and swap the backend's copy into the cache. A task that
    /// isn't cached is not inserted.
    pub async fn update(&mut self, id: &str, patch: TaskPatch) -> Result<Task, ApiError> {
        self.begin();
        let result = self.api.update(id, patch).await;
        match &result {
            Ok(updated) => self.replace_cached(id, updated),
            Err(e) => self.fail(UPDATE_FAILED, e),
        }
        self.finish();
        result
    }

    pub async fn delete(&mut self, id: &str) -> Result<(), ApiError> {
        self.begin();
        let result = self.api.delete(id).await;
        match &result {
            Ok(()) => {
                if self.find(id).is_some() {
                    self.tasks.mutate(|list| list.retain(|t| t.id != id));
                    self.tasks_changed();
                }
            }
            Err(e) => self.fail(DELETE_FAILED, e),
        }
        self.finish();
        result
    }

    /// Persist a new sequence: the i-th id gets `order = i + 1`.
    ///
    /// The batch is one request per task and is not atomic. On failure the
    /// cache is left untouched even though some requests may already have
    /// been applied by the backend; reloading the project resynchronizes.
    pub async fn reorder<S: AsRef<str>>(&mut self, ordered_ids: &[S]) -> Result<(), ApiError> {
        self.begin();
        let plan = views::reorder_plan(ordered_ids);
        let result = self.api.update_order(&plan).await;
        match &result {
            Ok(()) => {
                self.tasks.mutate(|list| {
                    for update in &plan {
                        if let Some(task) = list.iter_mut().find(|t| t.id == update.id) {
                            task.order = update.order;
                        }
                    }
                });
                self.tasks_changed();
            }
            Err(e) => self.fail(REORDER_FAILED, e),
        }
        self.finish();
        result
    }

    /// Status-only update; order is left as it was
    pub async fn update_status(&mut self, id: &str, status: TaskStatus) -> Result<Task, ApiError> {
        self.begin();
        let result = self.api.update_status(id, status).await;
        match &result {
            Ok(updated) => self.replace_cached(id, updated),
            Err(e) => self.fail(STATUS_FAILED, e),
        }
        self.finish();
        result
    }

    /// Move a task to the end of the `status` column of the current project.
    ///
    /// Returns `Ok(None)` without contacting the backend when the task isn't
    /// cached.
    pub async fn change_status(
        &mut self,
        id: &str,
        status: TaskStatus,
    ) -> Result<Option<Task>, ApiError> {
        if self.find(id).is_none() {
            tracing::debug!(id, "change_status on uncached task ignored");
            return Ok(None);
        }
        let order = views::next_order_in_status(&self.tasks_for_current_project(), status);
        self.update(
            id,
            TaskPatch {
                status: Some(status),
                order: Some(order),
                ..Default::default()
            },
        )
        .await
        .map(Some)
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn replace_cached(&mut self, id: &str, updated: &Task) {
        if let Some(index) = self.tasks.get().iter().position(|t| t.id == id) {
            self.tasks.mutate(|list| list[index] = updated.clone());
            self.tasks_changed();
        }
    }

    fn set_current_project(&mut self, project_id: Option<String>) {
        if self.current_project_id == project_id {
            return;
        }
        self.current_project_id = project_id.clone();
        self.scope_version += 1;
        self.events
            .publish(CacheEvent::CurrentProjectChanged(project_id));
    }

    fn begin(&mut self) {
        self.set_loading(true);
        self.set_error(None);
    }

    fn finish(&mut self) {
        self.set_loading(false);
    }

    fn fail(&mut self, message: &str, err: &ApiError) {
        tracing::error!(error = %err, "{}", message);
        self.set_error(Some(message.to_string()));
    }

    fn set_loading(&mut self, loading: bool) {
        self.loading = loading;
        self.events.publish(CacheEvent::LoadingChanged {
            cache: CacheKind::Tasks,
            loading,
        });
    }

    fn set_error(&mut self, error: Option<String>) {
        if self.error == error {
            return;
        }
        self.error = error.clone();
        self.events.publish(CacheEvent::ErrorChanged {
            cache: CacheKind::Tasks,
            error,
        });
    }

    fn tasks_changed(&self) {
        self.events.publish(CacheEvent::TasksChanged {
            version: self.tasks.version(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{MemoryBackend, Transport};
    use crate::io::storage::MemoryStore;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};

    fn task_json(id: &str, project: &str, status: &str, order: i64, assignee: &str) -> Value {
        json!({
            "id": id,
            "projectId": project,
            "title": format!("Task {}", id),
            "description": "",
            "assignee": assignee,
            "status": status,
            "dueDate": "",
            "createdAt": "2024-01-01T00:00:00.000Z",
            "updatedAt": "2024-01-01T00:00:00.000Z",
            "order": order
        })
    }

    struct Fixture {
        backend: Arc<MemoryBackend>,
        store: Arc<MemoryStore>,
        cache: TaskCache,
    }

    fn fixture(seed: Vec<Value>) -> Fixture {
        let backend = Arc::new(MemoryBackend::new());
        backend.seed("tasks", seed);
        let store = Arc::new(MemoryStore::new());
        let cache = TaskCache::new(
            TasksApi::new(backend.clone()),
            store.clone(),
            Arc::new(EventBus::new()),
        );
        Fixture {
            backend,
            store,
            cache,
        }
    }

    fn board() -> Vec<Value> {
        vec![
            task_json("1", "P", "to_do", 2, "Kim"),
            task_json("2", "P", "to_do", 1, "Alex"),
            task_json("3", "P", "in_progress", 5, "Kim"),
            task_json("4", "P", "done", 3, ""),
            task_json("5", "Q", "to_do", 1, "Robin"),
        ]
    }

    fn scoped_ids(cache: &TaskCache) -> Vec<String> {
        cache
            .tasks_for_current_project()
            .iter()
            .map(|t| t.id.clone())
            .collect()
    }

    #[tokio::test]
    async fn load_for_project_scopes_views() {
        let mut f = fixture(board());
        assert!(f.cache.tasks_for_current_project().is_empty());

        f.cache.load_for_project("P").await;

        assert_eq!(f.cache.current_project_id(), Some("P"));
        assert_eq!(scoped_ids(&f.cache), vec!["2", "1", "4", "3"]);

        let buckets = f.cache.tasks_grouped_by_status();
        let todo: Vec<&str> = buckets.to_do.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(todo, vec!["2", "1"]);
        assert_eq!(buckets.in_progress.len(), 1);
        assert_eq!(buckets.done.len(), 1);

        assert_eq!(f.cache.distinct_assignees(), vec!["", "Alex", "Kim"]);
    }

    #[tokio::test]
    async fn loading_one_project_keeps_the_others() {
        let mut f = fixture(board());
        f.cache.load_for_project("Q").await;
        f.cache.load_for_project("P").await;
        assert_eq!(f.cache.tasks().len(), 5);

        // P is reloaded after a remote delete: only P's slice changes
        f.backend.delete("/tasks/1").await.unwrap();
        f.cache.load_for_project("P").await;
        assert_eq!(f.cache.tasks().len(), 4);
        assert!(f.cache.find("5").is_some());
        assert!(f.cache.find("1").is_none());
    }

    #[tokio::test]
    async fn load_failure_records_error() {
        let mut f = fixture(board());
        f.cache.load_for_project("P").await;
        f.backend.fail_once("GET", "/tasks?projectId=P");

        f.cache.load_for_project("P").await;

        assert_eq!(f.cache.error(), Some(LOAD_FAILED));
        assert_eq!(f.cache.tasks().len(), 4);
        assert!(!f.cache.loading());
    }

    #[tokio::test]
    async fn create_appends_with_next_order_and_global_id() {
        let mut f = fixture(vec![
            task_json("3", "P", "to_do", 5, ""),
            task_json("12", "Q", "to_do", 1, ""),
        ]);
        f.cache.load_for_project("P").await;

        let created = f
            .cache
            .create(NewTask {
                project_id: "P".into(),
                title: "Next".into(),
                description: String::new(),
                assignee: String::new(),
                status: TaskStatus::ToDo,
                due_date: String::new(),
            })
            .await
            .unwrap();

        assert_eq!(created.order, 6);
        assert_eq!(created.id, "13");
        assert_eq!(scoped_ids(&f.cache), vec!["3", "13"]);
    }

    #[tokio::test]
    async fn reorder_assigns_one_based_positions() {
        let mut f = fixture(board());
        f.cache.load_for_project("P").await;
        f.backend.clear_requests();

        f.cache.reorder(&["3", "1", "2"]).await.unwrap();

        assert_eq!(f.backend.requests().len(), 3);
        for (i, id) in ["3", "1", "2"].iter().enumerate() {
            assert_eq!(f.cache.find(id).unwrap().order, i as i64 + 1);
        }
        // Untouched task keeps its order
        assert_eq!(f.cache.find("4").unwrap().order, 3);

        let stored: Vec<Task> =
            serde_json::from_str(&f.store.get(TASKS_KEY).unwrap().unwrap()).unwrap();
        assert_eq!(stored, f.cache.tasks());
    }

    #[tokio::test]
    async fn reorder_failure_leaves_cache_untouched() {
        let mut f = fixture(board());
        f.cache.load_for_project("P").await;
        let before = f.cache.tasks().to_vec();
        f.backend.fail_once("PATCH", "/tasks/1");

        let err = f.cache.reorder(&["2", "1"]).await.unwrap_err();

        assert_eq!(err.status(), Some(503));
        assert_eq!(f.cache.error(), Some(REORDER_FAILED));
        assert_eq!(f.cache.tasks(), before.as_slice());
        // The request for task 2 was applied by the backend anyway
        let remote_2 = f
            .backend
            .records("tasks")
            .into_iter()
            .find(|t| t["id"] == "2")
            .unwrap();
        assert_eq!(remote_2["order"], 1);
    }

    #[tokio::test]
    async fn change_status_appends_to_target_column() {
        let mut f = fixture(board());
        f.cache.load_for_project("P").await;

        let moved = f
            .cache
            .change_status("2", TaskStatus::InProgress)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(moved.status, TaskStatus::InProgress);
        assert_eq!(moved.order, 6);
        assert_eq!(moved.project_id, "P");
        assert_eq!(f.cache.find("2").unwrap().order, 6);
    }

    #[tokio::test]
    async fn change_status_into_empty_column_gets_order_one() {
        let mut f = fixture(vec![
            task_json("1", "P", "to_do", 4, ""),
            task_json("2", "P", "to_do", 9, ""),
        ]);
        f.cache.load_for_project("P").await;

        let moved = f
            .cache
            .change_status("2", TaskStatus::Done)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(moved.order, 1);
        let done: Vec<String> = f
            .cache
            .tasks_grouped_by_status()
            .done
            .iter()
            .map(|t| t.id.clone())
            .collect();
        assert_eq!(done, vec!["2"]);
    }

    #[tokio::test]
    async fn change_status_of_unknown_task_is_silent() {
        let mut f = fixture(board());
        f.cache.load_for_project("P").await;
        f.backend.clear_requests();

        let result = f.cache.change_status("404", TaskStatus::Done).await.unwrap();

        assert!(result.is_none());
        assert!(f.backend.requests().is_empty());
        assert!(f.cache.error().is_none());
    }

    #[tokio::test]
    async fn update_status_keeps_order() {
        let mut f = fixture(board());
        f.cache.load_for_project("P").await;

        let task = f.cache.update_status("1", TaskStatus::Done).await.unwrap();

        assert_eq!(task.order, 2);
        assert_eq!(f.cache.find("1").unwrap().status, TaskStatus::Done);
    }

    #[tokio::test]
    async fn update_failure_is_recorded_and_returned() {
        let mut f = fixture(board());
        f.cache.load_for_project("P").await;
        f.backend.fail_once("PATCH", "/tasks/1");

        let err = f
            .cache
            .update(
                "1",
                TaskPatch {
                    title: Some("Renamed".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(503));
        assert_eq!(f.cache.error(), Some(UPDATE_FAILED));
        assert_eq!(f.cache.find("1").unwrap().title, "Task 1");
    }

    #[tokio::test]
    async fn delete_evicts_from_cache_and_storage() {
        let mut f = fixture(board());
        f.cache.load_for_project("P").await;

        f.cache.delete("3").await.unwrap();

        assert!(f.cache.find("3").is_none());
        let stored = f.store.get(TASKS_KEY).unwrap().unwrap();
        assert!(!stored.contains("\"id\":\"3\""));
    }

    #[tokio::test]
    async fn clearing_current_project_empties_views() {
        let mut f = fixture(board());
        f.cache.load_for_project("P").await;
        assert!(!f.cache.tasks_for_current_project().is_empty());

        f.cache.clear_current_project();

        assert!(f.cache.tasks_for_current_project().is_empty());
        assert!(f.cache.distinct_assignees().is_empty());
        assert_eq!(f.cache.tasks().len(), 4);
    }
}
