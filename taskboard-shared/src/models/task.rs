/// Task model and database operations
///
/// A task is a single to-do item owned by exactly one user. Ownership is
/// recorded once at creation (`author_id`) and never changes.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE tasks (
///     id SERIAL PRIMARY KEY,
///     text TEXT NOT NULL,
///     completed BOOLEAN NOT NULL DEFAULT FALSE,
///     author_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use taskboard_shared::models::task::{Task, CreateTask, UpdateTask};
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), sqlx::Error> {
/// let task = Task::create(&pool, CreateTask {
///     author_id: "firebase-uid-123".to_string(),
///     text: "buy milk".to_string(),
/// }).await?;
///
/// Task::update(&pool, task.id, UpdateTask {
///     completed: Some(true),
///     ..Default::default()
/// }).await?;
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

/// A to-do item
///
/// Serializes with camelCase keys (`authorId`, `createdAt`, ...), which is the
/// wire format of the HTTP API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Identifier assigned by the database
    pub id: i32,

    /// User-supplied content
    pub text: String,

    /// Whether the owner has ticked it off
    pub completed: bool,

    /// Subject identifier of the owner
    pub author_id: String,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Whether `user_id` owns this task
    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.author_id == user_id
    }
}

/// Input for creating a task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTask {
    /// Owner; always the authenticated caller
    pub author_id: String,

    /// Task content (validated non-empty by the caller)
    pub text: String,
}

/// Partial update; `None` fields are left unchanged
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateTask {
    pub text: Option<String>,
    pub completed: Option<bool>,
}

impl UpdateTask {
    /// True when the update would not change any column
    pub fn is_empty(&self) -> bool {
        self.text.is_none() && self.completed.is_none()
    }
}

/// Escapes `LIKE` metacharacters so a search term matches literally
///
/// Used together with `ESCAPE '\'`.
pub fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

impl Task {
    /// Inserts a new task
    ///
    /// The author must already exist in `users` (see `User::ensure_exists`).
    pub async fn create(pool: &PgPool, data: CreateTask) -> Result<Self, sqlx::Error> {
        let task = sqlx::query_as::<_, Task>(
            r#"
            INSERT INTO tasks (text, author_id)
            VALUES ($1, $2)
            RETURNING id, text, completed, author_id, created_at, updated_at
            "#,
        )
        .bind(data.text)
        .bind(data.author_id)
        .fetch_one(pool)
        .await?;

        Ok(task)
    }

    /// Finds a task by ID, regardless of owner
    ///
    /// Ownership is checked by the caller (`auth::authorization::authorize_task`).
    pub async fn find_by_id(pool: &PgPool, id: i32) -> Result<Option<Self>, sqlx::Error> {
        let task = sqlx::query_as::<_, Task>(
            r#"
            SELECT id, text, completed, author_id, created_at, updated_at
            FROM tasks
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(task)
    }

    /// Lists one author's tasks, newest first
    ///
    /// When `search` is given, only tasks whose text contains it
    /// (case-insensitive, wildcards matched literally) are returned.
    pub async fn list_by_author(
        pool: &PgPool,
        author_id: &str,
        search: Option<&str>,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let pattern = search.map(|term| format!("%{}%", escape_like(term)));

        let tasks = sqlx::query_as::<_, Task>(
            r#"
            SELECT id, text, completed, author_id, created_at, updated_at
            FROM tasks
            WHERE author_id = $1
              AND ($2::TEXT IS NULL OR text ILIKE $2 ESCAPE '\')
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(author_id)
        .bind(pattern)
        .fetch_all(pool)
        .await?;

        Ok(tasks)
    }

    /// Applies a partial update and bumps `updated_at`
    ///
    /// Returns `None` if the task no longer exists.
    pub async fn update(
        pool: &PgPool,
        id: i32,
        data: UpdateTask,
    ) -> Result<Option<Self>, sqlx::Error> {
        let task = sqlx::query_as::<_, Task>(
            r#"
            UPDATE tasks
            SET text = COALESCE($2, text),
                completed = COALESCE($3, completed),
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, text, completed, author_id, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(data.text)
        .bind(data.completed)
        .fetch_optional(pool)
        .await?;

        Ok(task)
    }

    /// Deletes a task; returns whether a row was removed
    pub async fn delete(pool: &PgPool, id: i32) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_task() -> Task {
        let now = Utc::now();
        Task {
            id: 7,
            text: "buy milk".to_string(),
            completed: false,
            author_id: "u1".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_task_serializes_camel_case() {
        let json = serde_json::to_value(sample_task()).unwrap();

        assert_eq!(json["id"], 7);
        assert_eq!(json["text"], "buy milk");
        assert_eq!(json["completed"], false);
        assert_eq!(json["authorId"], "u1");
        assert!(json["createdAt"].is_string());
        assert!(json["updatedAt"].is_string());
        assert!(json.get("author_id").is_none());
    }

    #[test]
    fn test_is_owned_by() {
        let task = sample_task();
        assert!(task.is_owned_by("u1"));
        assert!(!task.is_owned_by("u2"));
        assert!(!task.is_owned_by(""));
    }

    #[test]
    fn test_update_task_is_empty() {
        assert!(UpdateTask::default().is_empty());
        assert!(!UpdateTask {
            completed: Some(false),
            ..Default::default()
        }
        .is_empty());
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("milk"), "milk");
        assert_eq!(escape_like("100%"), "100\\%");
        assert_eq!(escape_like("a_b"), "a\\_b");
        assert_eq!(escape_like("c:\\tmp"), "c:\\\\tmp");
    }
}
