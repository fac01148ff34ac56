/// Database models for Taskboard
///
/// # Models
///
/// - `task`: To-do items, each owned by one user
/// - `user`: Callers, created lazily on first task creation

pub mod task;
pub mod user;
