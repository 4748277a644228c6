//! User lookup, creation, and messaging handle linking.

use super::{to_db_time, Store};
use chrono::{DateTime, Utc};
use taskbell_core::{error::TaskbellError, model::User};

impl Store {
    /// Get a user by id.
    pub async fn get_user(&self, id: &str) -> Result<Option<User>, TaskbellError> {
        let row: Option<(String, Option<i64>)> =
            sqlx::query_as("SELECT id, messaging_handle FROM users WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| TaskbellError::Store(format!("get user failed: {e}")))?;

        Ok(row.map(user_from_row))
    }

    /// Get the user linked to a messaging handle.
    pub async fn get_user_by_messaging_handle(
        &self,
        handle: i64,
    ) -> Result<Option<User>, TaskbellError> {
        let row: Option<(String, Option<i64>)> =
            sqlx::query_as("SELECT id, messaging_handle FROM users WHERE messaging_handle = ?")
                .bind(handle)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| TaskbellError::Store(format!("get user by handle failed: {e}")))?;

        Ok(row.map(user_from_row))
    }

    /// Create a user if no user with this id exists. Idempotent.
    pub async fn create_user_if_absent(&self, id: &str) -> Result<User, TaskbellError> {
        if id.trim().is_empty() {
            return Err(TaskbellError::Validation("user id must not be empty".into()));
        }

        let result = sqlx::query("INSERT OR IGNORE INTO users (id) VALUES (?)")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| TaskbellError::Store(format!("create user failed: {e}")))?;

        if result.rows_affected() > 0 {
            tracing::info!("created user {id}");
        }

        self.get_user(id)
            .await?
            .ok_or_else(|| TaskbellError::NotFound(format!("user {id}")))
    }

    /// Attach or replace the messaging handle of a user.
    ///
    /// Handles are unique: if another user held `handle`, it is detached
    /// from them in the same transaction.
    pub async fn set_messaging_handle(
        &self,
        user_id: &str,
        handle: i64,
    ) -> Result<User, TaskbellError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| TaskbellError::Store(format!("begin failed: {e}")))?;

        let exists: Option<(String,)> = sqlx::query_as("SELECT id FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| TaskbellError::Store(format!("get user failed: {e}")))?;
        if exists.is_none() {
            return Err(TaskbellError::NotFound(format!("user {user_id}")));
        }

        let detached = sqlx::query(
            "UPDATE users SET messaging_handle = NULL WHERE messaging_handle = ? AND id != ?",
        )
        .bind(handle)
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| TaskbellError::Store(format!("detach handle failed: {e}")))?;

        sqlx::query("UPDATE users SET messaging_handle = ? WHERE id = ?")
            .bind(handle)
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| TaskbellError::Store(format!("set handle failed: {e}")))?;

        tx.commit()
            .await
            .map_err(|e| TaskbellError::Store(format!("commit failed: {e}")))?;

        if detached.rows_affected() > 0 {
            tracing::info!("messaging handle moved to user {user_id}");
        }

        Ok(User {
            id: user_id.to_string(),
            messaging_handle: Some(handle),
        })
    }

    /// Users owning at least one incomplete task whose deadline is after `now`.
    pub async fn list_active_task_users(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<User>, TaskbellError> {
        let rows: Vec<(String, Option<i64>)> = sqlx::query_as(
            "SELECT DISTINCT u.id, u.messaging_handle FROM users u \
             JOIN user_task ut ON ut.user_id = u.id \
             JOIN tasks t ON t.id = ut.task_id \
             WHERE t.completed = 0 AND t.end_time IS NOT NULL AND t.end_time > ? \
             ORDER BY u.id",
        )
        .bind(to_db_time(now))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| TaskbellError::Store(format!("list active users failed: {e}")))?;

        Ok(rows.into_iter().map(user_from_row).collect())
    }
}

pub(super) fn user_from_row((id, messaging_handle): (String, Option<i64>)) -> User {
    User {
        id,
        messaging_handle,
    }
}
