/// PostgreSQL-backed task store
///
/// Thin delegation to the model functions in `crate::models`; the pool is
/// cloned cheaply (it is an `Arc` internally).

use async_trait::async_trait;
use sqlx::PgPool;

use super::{normalize_search, StoreError, StoreResult, TaskStore};
use crate::db::pool;
use crate::models::task::{CreateTask, Task, UpdateTask};
use crate::models::user::User;

/// Store backed by a sqlx connection pool
#[derive(Debug, Clone)]
pub struct PgTaskStore {
    pool: PgPool,
}

impl PgTaskStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Underlying pool, e.g. for closing it at shutdown
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl TaskStore for PgTaskStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn health_check(&self) -> StoreResult<()> {
        pool::health_check(&self.pool).await?;
        Ok(())
    }

    async fn list_tasks(&self, author_id: &str, search: Option<&str>) -> StoreResult<Vec<Task>> {
        let tasks = Task::list_by_author(&self.pool, author_id, normalize_search(search)).await?;
        Ok(tasks)
    }

    async fn find_task(&self, id: i32) -> StoreResult<Option<Task>> {
        Ok(Task::find_by_id(&self.pool, id).await?)
    }

    async fn ensure_user(&self, id: &str, email: Option<&str>) -> StoreResult<()> {
        User::ensure_exists(&self.pool, id, email).await?;
        Ok(())
    }

    async fn create_task(&self, data: CreateTask) -> StoreResult<Task> {
        let author_id = data.author_id.clone();

        Task::create(&self.pool, data).await.map_err(|err| match err {
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => StoreError::Constraint(
                format!("tasks.author_id references unknown user {}", author_id),
            ),
            other => StoreError::Database(other),
        })
    }

    async fn update_task(&self, id: i32, data: UpdateTask) -> StoreResult<Option<Task>> {
        Ok(Task::update(&self.pool, id, data).await?)
    }

    async fn delete_task(&self, id: i32) -> StoreResult<bool> {
        Ok(Task::delete(&self.pool, id).await?)
    }
}
