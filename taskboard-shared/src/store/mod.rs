/// Persistence gateway
///
/// Handlers never talk to the database directly. They go through a
/// [`TaskStore`], which is constructed once at startup and shared as
/// `Arc<dyn TaskStore>` in the application state.
///
/// # Backends
///
/// - [`PgTaskStore`]: PostgreSQL via sqlx (production)
/// - [`MemoryTaskStore`]: process-local maps (tests, local development)
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use taskboard_shared::store::{MemoryTaskStore, TaskStore};
/// use taskboard_shared::models::task::CreateTask;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store: Arc<dyn TaskStore> = Arc::new(MemoryTaskStore::new());
///
/// store.ensure_user("u1", None).await?;
/// let task = store.create_task(CreateTask {
///     author_id: "u1".to_string(),
///     text: "buy milk".to_string(),
/// }).await?;
///
/// assert_eq!(store.find_task(task.id).await?, Some(task));
/// # Ok(())
/// # }
/// ```

mod memory;
mod postgres;

pub use memory::MemoryTaskStore;
pub use postgres::PgTaskStore;

use async_trait::async_trait;

use crate::models::task::{CreateTask, Task, UpdateTask};

/// Errors surfaced by a store backend
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The database rejected or failed the query
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A referential constraint was violated (e.g. unknown author)
    #[error("Constraint violation: {0}")]
    Constraint(String),
}

/// Store result type alias
pub type StoreResult<T> = Result<T, StoreError>;

/// Task and user persistence
///
/// Every method is a single persistence operation; there are no multi-write
/// transactions and no optimistic concurrency control.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Backend name for logs and the health endpoint
    fn backend(&self) -> &'static str;

    /// Verifies the backend is reachable
    async fn health_check(&self) -> StoreResult<()>;

    /// Tasks owned by `author_id`, newest first, optionally filtered by a
    /// case-insensitive substring of `text`
    async fn list_tasks(&self, author_id: &str, search: Option<&str>) -> StoreResult<Vec<Task>>;

    /// Looks a task up by id without any ownership filter
    async fn find_task(&self, id: i32) -> StoreResult<Option<Task>>;

    /// Idempotently records the user so tasks can reference it
    async fn ensure_user(&self, id: &str, email: Option<&str>) -> StoreResult<()>;

    /// Inserts a task; `completed` starts false
    async fn create_task(&self, data: CreateTask) -> StoreResult<Task>;

    /// Applies a partial update; `None` if the task does not exist
    async fn update_task(&self, id: i32, data: UpdateTask) -> StoreResult<Option<Task>>;

    /// Removes a task; `false` if it did not exist
    async fn delete_task(&self, id: i32) -> StoreResult<bool>;
}

/// Normalizes a raw `search` parameter: blank terms mean "no filter"
pub fn normalize_search(search: Option<&str>) -> Option<&str> {
    search.map(str::trim).filter(|term| !term.is_empty())
}
