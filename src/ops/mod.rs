pub mod events;
pub mod project_cache;
pub mod task_cache;
pub mod views;
