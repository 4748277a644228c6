//! Deadline-notification queries and idempotent threshold marking.

use super::{task_from_row, to_db_time, Store, TASK_COLUMNS};
use chrono::{DateTime, Duration, Utc};
use taskbell_core::{
    error::TaskbellError,
    model::{TaskWithOwners, Threshold, User},
};

/// A task row followed by one (possibly absent) owner.
type PendingRow = (
    String,
    String,
    Option<String>,
    Option<i64>,
    bool,
    Option<String>,
    Option<String>,
    String,
    Option<String>,
    Option<i64>,
);

impl Store {
    /// Incomplete tasks whose deadline lies in `[now, now + window]`, with owners loaded.
    ///
    /// Ordered by deadline; owners within a task are ordered by user id.
    pub async fn list_pending_notification_tasks(
        &self,
        now: DateTime<Utc>,
        window: Duration,
    ) -> Result<Vec<TaskWithOwners>, TaskbellError> {
        let sql = format!(
            "SELECT {TASK_COLUMNS}, u.id, u.messaging_handle FROM tasks t \
             LEFT JOIN user_task ut ON ut.task_id = t.id \
             LEFT JOIN users u ON u.id = ut.user_id \
             WHERE t.completed = 0 AND t.end_time IS NOT NULL \
             AND t.end_time >= ? AND t.end_time <= ? \
             ORDER BY t.end_time, t.id, u.id"
        );
        let rows: Vec<PendingRow> = sqlx::query_as(&sql)
            .bind(to_db_time(now))
            .bind(to_db_time(now + window))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| TaskbellError::Store(format!("pending notifications query failed: {e}")))?;

        let mut pending: Vec<TaskWithOwners> = Vec::new();
        for (id, title, description, difficulty, completed, start, end, sent, owner_id, handle) in
            rows
        {
            let owner = owner_id.map(|id| User {
                id,
                messaging_handle: handle,
            });

            if let Some(last) = pending.last_mut().filter(|last| last.task.id == id) {
                last.owners.extend(owner);
                continue;
            }

            let task = task_from_row((
                id,
                title,
                description,
                difficulty,
                completed,
                start,
                end,
                sent,
            ))?;
            pending.push(TaskWithOwners {
                task,
                owners: owner.into_iter().collect(),
            });
        }

        Ok(pending)
    }

    /// Record that the reminder for `threshold` fired. Idempotent; other
    /// thresholds are untouched and nothing here ever writes `false`.
    pub async fn mark_notification_sent(
        &self,
        task_id: &str,
        threshold: Threshold,
    ) -> Result<(), TaskbellError> {
        let path = format!("$.\"{}\"", threshold.label());
        let result = sqlx::query(
            "UPDATE tasks \
             SET notifications_sent = json_set(COALESCE(notifications_sent, '{}'), ?, json('true')), \
                 updated_at = datetime('now') \
             WHERE id = ?",
        )
        .bind(path)
        .bind(task_id)
        .execute(&self.pool)
        .await
        .map_err(|e| TaskbellError::Store(format!("mark notification failed: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(TaskbellError::NotFound(format!("task {task_id}")));
        }
        Ok(())
    }
}
