/// Path extractors
///
/// `TaskId` parses the `:id` segment of `/api/tasks/:id`. Anything other
/// than a plain positive 32-bit integer is rejected with
/// `400 Invalid task ID.` before the handler runs.

use axum::{
    async_trait,
    extract::{FromRequestParts, Path},
    http::request::Parts,
};

use crate::error::{ApiError, INVALID_TASK_ID};

/// Validated task identifier from the request path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskId(pub i32);

/// Digits only, no sign, fits in `i32`, greater than zero
pub fn parse_task_id(raw: &str) -> Option<i32> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    raw.parse::<i32>().ok().filter(|id| *id > 0)
}

#[async_trait]
impl<S> FromRequestParts<S> for TaskId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let invalid = || ApiError::BadRequest(INVALID_TASK_ID.to_string());

        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|_| invalid())?;

        parse_task_id(&raw).map(TaskId).ok_or_else(invalid)
    }
}
