/// User model and database operations
///
/// Users are never registered explicitly. A row is upserted the first time a
/// caller creates a task so that `tasks.author_id` has something to reference.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE users (
///     id TEXT PRIMARY KEY,          -- identity provider subject identifier
///     email TEXT NOT NULL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

/// A known caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Subject identifier from the verified token
    pub id: String,

    pub email: String,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

/// E-mail stored for users whose token carries no `email` claim
pub fn placeholder_email(user_id: &str) -> String {
    format!("user-{}@example.com", user_id)
}

impl User {
    /// Inserts the user if missing; an existing row is left untouched
    ///
    /// # Arguments
    ///
    /// * `pool` - Database connection pool
    /// * `id` - Subject identifier
    /// * `email` - E-mail claim, if the token had one
    pub async fn ensure_exists(
        pool: &PgPool,
        id: &str,
        email: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        let email = email
            .map(str::to_string)
            .unwrap_or_else(|| placeholder_email(id));

        sqlx::query(
            r#"
            INSERT INTO users (id, email)
            VALUES ($1, $2)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(id)
        .bind(email)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Finds a user by subject identifier
    pub async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Self>, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_email() {
        assert_eq!(placeholder_email("u1"), "user-u1@example.com");
    }
}
