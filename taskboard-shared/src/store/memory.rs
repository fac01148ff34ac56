/// In-memory task store
///
/// Mirrors the PostgreSQL semantics closely enough for tests and local
/// development: sequential ids from 1, newest-first listing, and the
/// `tasks.author_id -> users.id` foreign key.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

use super::{normalize_search, StoreError, StoreResult, TaskStore};
use crate::models::task::{CreateTask, Task, UpdateTask};
use crate::models::user::placeholder_email;

#[derive(Debug, Default)]
struct MemoryState {
    next_id: i32,
    tasks: BTreeMap<i32, Task>,
    /// user id -> email
    users: HashMap<String, String>,
}

/// Store backed by process-local maps behind an async `RwLock`
#[derive(Debug, Default)]
pub struct MemoryTaskStore {
    state: RwLock<MemoryState>,
}

impl MemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored tasks across all users
    pub async fn task_count(&self) -> usize {
        self.state.read().await.tasks.len()
    }

    /// E-mail recorded for a user, if the user exists
    pub async fn user_email(&self, id: &str) -> Option<String> {
        self.state.read().await.users.get(id).cloned()
    }
}

#[async_trait]
impl TaskStore for MemoryTaskStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn list_tasks(&self, author_id: &str, search: Option<&str>) -> StoreResult<Vec<Task>> {
        let needle = normalize_search(search).map(str::to_lowercase);
        let state = self.state.read().await;

        let mut tasks: Vec<Task> = state
            .tasks
            .values()
            .filter(|task| task.author_id == author_id)
            .filter(|task| match &needle {
                Some(needle) => task.text.to_lowercase().contains(needle.as_str()),
                None => true,
            })
            .cloned()
            .collect();

        tasks.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });

        Ok(tasks)
    }

    async fn find_task(&self, id: i32) -> StoreResult<Option<Task>> {
        Ok(self.state.read().await.tasks.get(&id).cloned())
    }

    async fn ensure_user(&self, id: &str, email: Option<&str>) -> StoreResult<()> {
        let mut state = self.state.write().await;
        state
            .users
            .entry(id.to_string())
            .or_insert_with(|| email.map(str::to_string).unwrap_or_else(|| placeholder_email(id)));
        Ok(())
    }

    async fn create_task(&self, data: CreateTask) -> StoreResult<Task> {
        let mut state = self.state.write().await;

        if !state.users.contains_key(&data.author_id) {
            return Err(StoreError::Constraint(format!(
                "tasks.author_id references unknown user {}",
                data.author_id
            )));
        }

        state.next_id += 1;
        let now = Utc::now();
        let task = Task {
            id: state.next_id,
            text: data.text,
            completed: false,
            author_id: data.author_id,
            created_at: now,
            updated_at: now,
        };

        state.tasks.insert(task.id, task.clone());
        Ok(task)
    }

    async fn update_task(&self, id: i32, data: UpdateTask) -> StoreResult<Option<Task>> {
        let mut state = self.state.write().await;

        let Some(task) = state.tasks.get_mut(&id) else {
            return Ok(None);
        };

        if let Some(text) = data.text {
            task.text = text;
        }
        if let Some(completed) = data.completed {
            task.completed = completed;
        }
        task.updated_at = Utc::now();

        Ok(Some(task.clone()))
    }

    async fn delete_task(&self, id: i32) -> StoreResult<bool> {
        Ok(self.state.write().await.tasks.remove(&id).is_some())
    }
}
