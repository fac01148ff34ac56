/// API route handlers
///
/// - `health`: Health check endpoint
/// - `tasks`: Task CRUD endpoints
/// - `extractors`: Path extractors shared by the task routes

pub mod extractors;
pub mod health;
pub mod tasks;

use crate::error::ApiError;

/// Fallback for unknown routes
pub async fn not_found() -> ApiError {
    ApiError::NotFound("Route not found.".to_string())
}
