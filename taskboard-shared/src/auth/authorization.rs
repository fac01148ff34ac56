/// Task ownership guard
///
/// Every task has exactly one author. Only that author may read, update, or
/// delete it; everyone else gets [`AuthzError::Forbidden`], and a missing task
/// is [`AuthzError::NotFound`].
///
/// # Example
///
/// ```no_run
/// use taskboard_shared::auth::authorization::{authorize_task, AuthzError};
/// use taskboard_shared::auth::middleware::AuthContext;
/// use taskboard_shared::store::TaskStore;
///
/// async fn load(store: &dyn TaskStore, auth: &AuthContext, id: i32) -> Result<String, AuthzError> {
///     let task = authorize_task(store, id, auth).await?;
///     Ok(task.text)
/// }
/// ```

use super::middleware::AuthContext;
use crate::models::task::Task;
use crate::store::{StoreError, TaskStore};

/// Error type for ownership checks
#[derive(Debug, thiserror::Error)]
pub enum AuthzError {
    /// No task with that id
    #[error("Task not found")]
    NotFound,

    /// Task exists but belongs to someone else
    #[error("Not authorized to access this resource")]
    Forbidden,

    /// Lookup failed
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Checks that `auth` is the author of `task`
pub fn require_ownership(auth: &AuthContext, task: &Task) -> Result<(), AuthzError> {
    if !task.is_owned_by(&auth.user_id) {
        return Err(AuthzError::Forbidden);
    }
    Ok(())
}

/// Loads a task and checks that the caller owns it
///
/// # Errors
///
/// - `NotFound` if the id does not exist
/// - `Forbidden` if it exists with a different author
/// - `Store` if the lookup itself fails
pub async fn authorize_task(
    store: &dyn TaskStore,
    task_id: i32,
    auth: &AuthContext,
) -> Result<Task, AuthzError> {
    let task = store.find_task(task_id).await?.ok_or(AuthzError::NotFound)?;

    if let Err(err) = require_ownership(auth, &task) {
        tracing::warn!(
            task_id,
            user_id = %auth.user_id,
            "Access to task owned by another user denied"
        );
        return Err(err);
    }

    Ok(task)
}
