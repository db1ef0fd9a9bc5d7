use std::sync::{Arc, Mutex, PoisonError};

use crate::api::{ApiError, ProjectsApi};
use crate::io::persist::Synced;
use crate::io::storage::KeyValueStore;
use crate::model::project::{NewProject, Project, ProjectPatch};
use crate::model::view::{FilterConfig, SortConfig};
use crate::ops::events::{CacheEvent, CacheKind, EventBus};
use crate::ops::views;

pub const PROJECTS_KEY: &str = "projects";
pub const SORT_CONFIG_KEY: &str = "projectsSortConfig";
pub const FILTER_CONFIG_KEY: &str = "projectsFilterConfig";

pub const LOAD_FAILED: &str = "Failed to load projects";
pub const CREATE_FAILED: &str = "Failed to create project";
pub const UPDATE_FAILED: &str = "Failed to update project";
pub const DELETE_FAILED: &str = "Failed to delete project";

/// Input versions a memoized view was computed from
type ViewKey = (u64, u64, u64);

/// Client-side copy of the project collection plus its view settings.
///
/// Mutators talk to the backend first and only touch the cache once the
/// backend confirmed. `loading` is raised for the duration of each call and
/// `error` holds the message of the last failed call.
pub struct ProjectCache {
    api: ProjectsApi,
    projects: Synced<Vec<Project>>,
    sort_config: Synced<Option<SortConfig>>,
    filter_config: Synced<FilterConfig>,
    loading: bool,
    error: Option<String>,
    events: Arc<EventBus>,
    visible: Mutex<Option<(ViewKey, Arc<[Project]>)>>,
}

impl ProjectCache {
    /// Build the cache and restore the last persisted snapshot
    pub fn new(api: ProjectsApi, store: Arc<dyn KeyValueStore>, events: Arc<EventBus>) -> Self {
        ProjectCache {
            api,
            projects: Synced::attach(store.clone(), PROJECTS_KEY, Vec::new()),
            sort_config: Synced::attach(store.clone(), SORT_CONFIG_KEY, None),
            filter_config: Synced::attach(store, FILTER_CONFIG_KEY, FilterConfig::default()),
            loading: false,
            error: None,
            events,
            visible: Mutex::new(None),
        }
    }

    // -----------------------------------------------------------------------
    // Read access
    // -----------------------------------------------------------------------

    pub fn projects(&self) -> &[Project] {
        self.projects.get()
    }

    pub fn find(&self, id: &str) -> Option<&Project> {
        self.projects.get().iter().find(|p| p.id == id)
    }

    pub fn loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn sort_config(&self) -> Option<&SortConfig> {
        self.sort_config.get().as_ref()
    }

    pub fn filter_config(&self) -> &FilterConfig {
        self.filter_config.get()
    }

    /// Filtered and sorted projects, recomputed only when an input changed
    pub fn visible_projects(&self) -> Arc<[Project]> {
        let key = (
            self.projects.version(),
            self.sort_config.version(),
            self.filter_config.version(),
        );
        let mut memo = self.visible.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some((cached_key, view)) = memo.as_ref() {
            if *cached_key == key {
                return view.clone();
            }
        }
        let view: Arc<[Project]> = views::visible_projects(
            self.projects.get(),
            self.filter_config.get(),
            self.sort_config.get().as_ref(),
        )
        .into();
        *memo = Some((key, view.clone()));
        view
    }

    // -----------------------------------------------------------------------
    // View settings
    // -----------------------------------------------------------------------

    pub fn set_sort_config(&mut self, config: Option<SortConfig>) {
        self.sort_config.set(config);
        self.events.publish(CacheEvent::SortChanged {
            version: self.sort_config.version(),
        });
    }

    pub fn set_filter_config(&mut self, config: FilterConfig) {
        self.filter_config.set(config);
        self.events.publish(CacheEvent::FilterChanged {
            version: self.filter_config.version(),
        });
    }

    pub fn clear_error(&mut self) {
        self.set_error(None);
    }

    // -----------------------------------------------------------------------
    // Mutators
    // -----------------------------------------------------------------------

    /// Reset filters and sort, then replace the collection from the backend.
    ///
    /// Failures are not returned: they land in `error()` and the previous
    /// collection stays in place.
    pub async fn refresh(&mut self) {
        self.begin();
        self.set_filter_config(FilterConfig::default());
        self.set_sort_config(None);

        match self.api.list().await {
            Ok(projects) => {
                tracing::debug!(count = projects.len(), "projects loaded");
                self.projects.set(projects);
                self.projects_changed();
            }
            Err(e) => self.fail(LOAD_FAILED, &e),
        }
        self.finish();
    }

    pub async fn create(&mut self, draft: NewProject) -> Result<Project, ApiError> {
        self.begin();
        let result = self.api.create(draft).await;
        match &result {
            Ok(project) => {
                self.projects.mutate(|list| list.push(project.clone()));
                self.projects_changed();
            }
            Err(e) => self.fail(CREATE_FAILED, e),
        }
        self.finish();
        result
    }

    /// Send `patch` and swap the backend's copy into the cache.
    ///
    /// A project that isn't cached is not inserted; the backend result is
    /// still returned.
    pub async fn update(&mut self, id: &str, patch: ProjectPatch) -> Result<Project, ApiError> {
        self.begin();
        let result = self.api.update(id, patch).await;
        match &result {
            Ok(updated) => {
                if let Some(index) = self.projects.get().iter().position(|p| p.id == id) {
                    self.projects.mutate(|list| list[index] = updated.clone());
                    self.projects_changed();
                }
            }
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
                if self.projects.get().iter().any(|p| p.id == id) {
                    self.projects.mutate(|list| list.retain(|p| p.id != id));
                    self.projects_changed();
                }
            }
            Err(e) => self.fail(DELETE_FAILED, e),
        }
        self.finish();
        result
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

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
            cache: CacheKind::Projects,
            loading,
        });
    }

    fn set_error(&mut self, error: Option<String>) {
        if self.error == error {
            return;
        }
        self.error = error.clone();
        self.events.publish(CacheEvent::ErrorChanged {
            cache: CacheKind::Projects,
            error,
        });
    }

    fn projects_changed(&self) {
        self.events.publish(CacheEvent::ProjectsChanged {
            version: self.projects.version(),
        });
    }
}
