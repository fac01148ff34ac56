/// Task endpoints
///
/// Personal to-do items. Every endpoint requires a bearer token, and a task
/// is only ever visible to its author.
///
/// # Endpoints
///
/// - `GET /api/tasks?search=<term>` - List own tasks, newest first
/// - `POST /api/tasks` - Create task
/// - `GET /api/tasks/:id` - Read task
/// - `PATCH /api/tasks/:id` - Update `text` and/or `completed`
/// - `DELETE /api/tasks/:id` - Delete task

use crate::{
    app::AppState,
    error::{ApiError, ApiResult, INVALID_TASK_TEXT},
    routes::extractors::TaskId,
};
use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Deserializer};
use taskboard_shared::{
    auth::{authorization::authorize_task, middleware::AuthContext},
    models::task::{CreateTask, Task, UpdateTask},
};
use validator::Validate;

/// Longest accepted task text, in characters
pub const MAX_TEXT_CHARS: u64 = 10_000;

/// List query parameters
#[derive(Debug, Default, Deserialize)]
pub struct ListTasksQuery {
    /// Case-insensitive substring filter on `text`
    pub search: Option<String>,
}

/// Create task request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateTaskRequest {
    /// Task content; a non-string value is treated as missing
    #[serde(default, deserialize_with = "string_or_none")]
    #[validate(required, length(min = 1, max = MAX_TEXT_CHARS))]
    pub text: Option<String>,
}

impl CreateTaskRequest {
    /// Validated, non-blank text
    pub fn into_text(self) -> ApiResult<String> {
        self.validate().map_err(|e| {
            tracing::debug!(errors = %e, "Create task validation failed");
            invalid_text()
        })?;

        match self.text {
            Some(text) if !text.trim().is_empty() => Ok(text),
            _ => Err(invalid_text()),
        }
    }
}

/// Update task request
///
/// Absent (or `null`) fields are left unchanged.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateTaskRequest {
    #[validate(length(min = 1, max = MAX_TEXT_CHARS))]
    pub text: Option<String>,

    pub completed: Option<bool>,
}

impl UpdateTaskRequest {
    pub fn into_update(self) -> ApiResult<UpdateTask> {
        self.validate().map_err(|e| {
            tracing::debug!(errors = %e, "Update task validation failed");
            invalid_text()
        })?;

        if self.text.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err(invalid_text());
        }

        Ok(UpdateTask {
            text: self.text,
            completed: self.completed,
        })
    }
}

fn invalid_text() -> ApiError {
    ApiError::BadRequest(INVALID_TASK_TEXT.to_string())
}

fn string_or_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Some(s),
        _ => None,
    })
}

/// List tasks handler
///
/// ```text
/// GET /api/tasks?search=milk
/// Authorization: Bearer <token>
/// ```
///
/// # Response
///
/// ```json
/// [
///   {
///     "id": 7,
///     "text": "buy milk",
///     "completed": false,
///     "authorId": "u1",
///     "createdAt": "2025-01-03T12:00:00Z",
///     "updatedAt": "2025-01-03T12:00:00Z"
///   }
/// ]
/// ```
pub async fn list_tasks(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<ListTasksQuery>,
) -> ApiResult<Json<Vec<Task>>> {
    let tasks = state
        .store
        .list_tasks(&auth.user_id, query.search.as_deref())
        .await?;

    Ok(Json(tasks))
}

/// Create task handler
///
/// ```text
/// POST /api/tasks
/// Authorization: Bearer <token>
/// Content-Type: application/json
///
/// { "text": "buy milk" }
/// ```
///
/// Returns `201 Created` with the new task. The caller's user row is
/// created on first use.
///
/// # Errors
///
/// - `400 Bad Request`: Body is not JSON, or `text` is missing, not a string, or blank
/// - `401 Unauthorized`: Missing or invalid token
/// - `500 Internal Server Error`: Store failure
pub async fn create_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    payload: Result<Json<CreateTaskRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Task>)> {
    let Json(req) = payload?;
    let text = req.into_text()?;

    state
        .store
        .ensure_user(&auth.user_id, auth.email.as_deref())
        .await?;

    let task = state
        .store
        .create_task(CreateTask {
            author_id: auth.user_id.clone(),
            text,
        })
        .await?;

    tracing::info!(task_id = task.id, user_id = %auth.user_id, "Task created");

    Ok((StatusCode::CREATED, Json(task)))
}

/// Read task handler
///
/// # Errors
///
/// - `400 Bad Request`: Invalid task ID
/// - `403 Forbidden`: Task belongs to another user
/// - `404 Not Found`: No such task
pub async fn get_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    TaskId(id): TaskId,
) -> ApiResult<Json<Task>> {
    let task = authorize_task(state.store.as_ref(), id, &auth).await?;
    Ok(Json(task))
}

/// Update task handler
///
/// ```text
/// PATCH /api/tasks/7
/// Authorization: Bearer <token>
/// Content-Type: application/json
///
/// { "completed": true }
/// ```
///
/// Ownership is checked before the body is looked at.
///
/// # Errors
///
/// - `400 Bad Request`: Invalid task ID, malformed body, blank `text`, non-boolean `completed`
/// - `403 Forbidden`: Task belongs to another user
/// - `404 Not Found`: No such task (including one deleted concurrently)
pub async fn update_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    TaskId(id): TaskId,
    payload: Result<Json<UpdateTaskRequest>, JsonRejection>,
) -> ApiResult<Json<Task>> {
    authorize_task(state.store.as_ref(), id, &auth).await?;

    let Json(req) = payload?;
    let update = req.into_update()?;

    let task = state
        .store
        .update_task(id, update)
        .await?
        .ok_or_else(ApiError::task_not_found)?;

    Ok(Json(task))
}

/// Delete task handler
///
/// Returns `204 No Content`. Deleting the same id twice yields 404 the
/// second time.
pub async fn delete_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    TaskId(id): TaskId,
) -> ApiResult<StatusCode> {
    authorize_task(state.store.as_ref(), id, &auth).await?;

    if !state.store.delete_task(id).await? {
        return Err(ApiError::task_not_found());
    }

    tracing::info!(task_id = id, user_id = %auth.user_id, "Task deleted");

    Ok(StatusCode::NO_CONTENT)
}
