//! Task CRUD, ownership, and sharing.

use super::users::user_from_row;
use super::{task_from_row, to_db_time, Store, TaskRow, TASK_COLUMNS};
use chrono::{DateTime, Utc};
use sqlx::SqliteExecutor;
use taskbell_core::{
    error::TaskbellError,
    model::{NewTask, Task, TaskUpdate, User},
};
use tracing::{debug, info};
use uuid::Uuid;

impl Store {
    /// Get a task by id, regardless of owner.
    pub async fn get_task(&self, id: &str) -> Result<Option<Task>, TaskbellError> {
        let sql = format!("SELECT {TASK_COLUMNS} FROM tasks t WHERE t.id = ?");
        let row: Option<TaskRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| TaskbellError::Store(format!("get task failed: {e}")))?;

        row.map(task_from_row).transpose()
    }

    /// Get a task only if `user_id` is one of its owners.
    pub async fn get_user_task(
        &self,
        task_id: &str,
        user_id: &str,
    ) -> Result<Option<Task>, TaskbellError> {
        owned_task(&self.pool, task_id, user_id).await
    }

    /// Create a task owned by `owner_id`, with every threshold marked unsent.
    pub async fn create_task(&self, owner_id: &str, new: NewTask) -> Result<Task, TaskbellError> {
        let mut created = self.create_tasks(owner_id, vec![new]).await?;
        created
            .pop()
            .ok_or_else(|| TaskbellError::Store("create task returned no row".into()))
    }

    /// Create several tasks for `owner_id` in one transaction.
    ///
    /// Either every task is stored or none is.
    pub async fn create_tasks(
        &self,
        owner_id: &str,
        batch: Vec<NewTask>,
    ) -> Result<Vec<Task>, TaskbellError> {
        for new in &batch {
            new.validate()?;
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| TaskbellError::Store(format!("begin failed: {e}")))?;

        let owner: Option<(String,)> = sqlx::query_as("SELECT id FROM users WHERE id = ?")
            .bind(owner_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| TaskbellError::Store(format!("get owner failed: {e}")))?;
        if owner.is_none() {
            return Err(TaskbellError::NotFound(format!("user {owner_id}")));
        }

        let mut created = Vec::with_capacity(batch.len());
        for new in batch {
            let id = new.id.unwrap_or_else(|| Uuid::new_v4().to_string());

            let taken: Option<(String,)> = sqlx::query_as("SELECT id FROM tasks WHERE id = ?")
                .bind(&id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| TaskbellError::Store(format!("task id check failed: {e}")))?;
            if taken.is_some() {
                return Err(TaskbellError::Validation(format!("task id {id} already exists")));
            }

            let task = Task {
                id,
                title: new.title,
                description: new.description,
                difficulty: new.difficulty,
                completed: false,
                start_time: new.start_time,
                end_time: new.end_time,
                notifications_sent: self.initial_notifications(),
            };

            sqlx::query(
                "INSERT INTO tasks \
                 (id, title, description, difficulty, completed, start_time, end_time, notifications_sent) \
                 VALUES (?, ?, ?, ?, 0, ?, ?, ?)",
            )
            .bind(&task.id)
            .bind(&task.title)
            .bind(&task.description)
            .bind(task.difficulty)
            .bind(task.start_time.map(to_db_time))
            .bind(task.end_time.map(to_db_time))
            .bind(serde_json::to_string(&task.notifications_sent)?)
            .execute(&mut *tx)
            .await
            .map_err(|e| TaskbellError::Store(format!("create task failed: {e}")))?;

            sqlx::query("INSERT INTO user_task (user_id, task_id) VALUES (?, ?)")
                .bind(owner_id)
                .bind(&task.id)
                .execute(&mut *tx)
                .await
                .map_err(|e| TaskbellError::Store(format!("link owner failed: {e}")))?;

            created.push(task);
        }

        tx.commit()
            .await
            .map_err(|e| TaskbellError::Store(format!("commit failed: {e}")))?;

        for task in &created {
            info!("created task {} for {owner_id}: {}", task.id, task.title);
        }
        Ok(created)
    }

    /// Apply an allow-listed partial update to a task owned by `owner_id`.
    ///
    /// Returns the updated task. `notifications_sent` is never written here.
    pub async fn update_task(
        &self,
        task_id: &str,
        owner_id: &str,
        update: &TaskUpdate,
    ) -> Result<Task, TaskbellError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| TaskbellError::Store(format!("begin failed: {e}")))?;

        let mut task = owned_task(&mut *tx, task_id, owner_id)
            .await?
            .ok_or_else(|| TaskbellError::NotFound(format!("task {task_id} for {owner_id}")))?;

        if update.is_empty() {
            debug!("update of task {task_id} carried no recognized fields");
            return Ok(task);
        }

        update.apply_to(&mut task)?;

        sqlx::query(
            "UPDATE tasks SET title = ?, description = ?, difficulty = ?, completed = ?, \
             start_time = ?, end_time = ?, updated_at = datetime('now') WHERE id = ?",
        )
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.difficulty)
        .bind(task.completed)
        .bind(task.start_time.map(to_db_time))
        .bind(task.end_time.map(to_db_time))
        .bind(task_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| TaskbellError::Store(format!("update task failed: {e}")))?;

        tx.commit()
            .await
            .map_err(|e| TaskbellError::Store(format!("commit failed: {e}")))?;

        Ok(task)
    }

    /// Delete a task owned by `owner_id`, together with all its ownership links.
    ///
    /// Returns `false` if the task does not exist or is not owned.
    pub async fn delete_task(&self, task_id: &str, owner_id: &str) -> Result<bool, TaskbellError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| TaskbellError::Store(format!("begin failed: {e}")))?;

        if owned_task(&mut *tx, task_id, owner_id).await?.is_none() {
            return Ok(false);
        }

        sqlx::query("DELETE FROM user_task WHERE task_id = ?")
            .bind(task_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| TaskbellError::Store(format!("unlink owners failed: {e}")))?;

        sqlx::query("DELETE FROM tasks WHERE id = ?")
            .bind(task_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| TaskbellError::Store(format!("delete task failed: {e}")))?;

        tx.commit()
            .await
            .map_err(|e| TaskbellError::Store(format!("commit failed: {e}")))?;

        info!("deleted task {task_id} (by {owner_id})");
        Ok(true)
    }

    /// Add `new_owner_id` as an owner of the task. Idempotent.
    ///
    /// Returns `true` if the owner was newly added.
    pub async fn share_task(&self, task_id: &str, new_owner_id: &str) -> Result<bool, TaskbellError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| TaskbellError::Store(format!("begin failed: {e}")))?;

        let user: Option<(String,)> = sqlx::query_as("SELECT id FROM users WHERE id = ?")
            .bind(new_owner_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| TaskbellError::Store(format!("get user failed: {e}")))?;
        if user.is_none() {
            return Err(TaskbellError::NotFound(format!("user {new_owner_id}")));
        }

        let task: Option<(String,)> = sqlx::query_as("SELECT id FROM tasks WHERE id = ?")
            .bind(task_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| TaskbellError::Store(format!("get task failed: {e}")))?;
        if task.is_none() {
            return Err(TaskbellError::NotFound(format!("task {task_id}")));
        }

        let result = sqlx::query("INSERT OR IGNORE INTO user_task (user_id, task_id) VALUES (?, ?)")
            .bind(new_owner_id)
            .bind(task_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| TaskbellError::Store(format!("share task failed: {e}")))?;

        tx.commit()
            .await
            .map_err(|e| TaskbellError::Store(format!("commit failed: {e}")))?;

        let added = result.rows_affected() > 0;
        if added {
            info!("shared task {task_id} with {new_owner_id}");
        }
        Ok(added)
    }

    /// Owners of a task, ordered by user id.
    pub async fn task_owners(&self, task_id: &str) -> Result<Vec<User>, TaskbellError> {
        let rows: Vec<(String, Option<i64>)> = sqlx::query_as(
            "SELECT u.id, u.messaging_handle FROM users u \
             JOIN user_task ut ON ut.user_id = u.id \
             WHERE ut.task_id = ? ORDER BY u.id",
        )
        .bind(task_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| TaskbellError::Store(format!("get owners failed: {e}")))?;

        Ok(rows.into_iter().map(user_from_row).collect())
    }

    /// All tasks of a user, ordered by deadline then start, nulls last.
    pub async fn list_user_tasks(&self, user_id: &str) -> Result<Vec<Task>, TaskbellError> {
        let sql = format!(
            "SELECT {TASK_COLUMNS} FROM tasks t \
             JOIN user_task ut ON ut.task_id = t.id \
             WHERE ut.user_id = ? \
             ORDER BY t.end_time IS NULL, t.end_time, t.start_time IS NULL, t.start_time, t.id"
        );
        let rows: Vec<TaskRow> = sqlx::query_as(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| TaskbellError::Store(format!("list tasks failed: {e}")))?;

        rows.into_iter().map(task_from_row).collect()
    }

    /// A uniformly random active task (incomplete, deadline after `now`) of a user.
    pub async fn pick_random_active_task(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Task>, TaskbellError> {
        let sql = format!(
            "SELECT {TASK_COLUMNS} FROM tasks t \
             JOIN user_task ut ON ut.task_id = t.id \
             WHERE ut.user_id = ? AND t.completed = 0 \
             AND t.end_time IS NOT NULL AND t.end_time > ? \
             ORDER BY RANDOM() LIMIT 1"
        );
        let row: Option<TaskRow> = sqlx::query_as(&sql)
            .bind(user_id)
            .bind(to_db_time(now))
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| TaskbellError::Store(format!("pick random task failed: {e}")))?;

        row.map(task_from_row).transpose()
    }

    /// Find an incomplete task of a user by its command slug (title with
    /// spaces replaced by underscores), earliest deadline first.
    pub async fn find_open_task_by_slug(
        &self,
        user_id: &str,
        slug: &str,
    ) -> Result<Option<Task>, TaskbellError> {
        let sql = format!(
            "SELECT {TASK_COLUMNS} FROM tasks t \
             JOIN user_task ut ON ut.task_id = t.id \
             WHERE ut.user_id = ? AND t.completed = 0 AND replace(t.title, ' ', '_') = ? \
             ORDER BY t.end_time IS NULL, t.end_time LIMIT 1"
        );
        let row: Option<TaskRow> = sqlx::query_as(&sql)
            .bind(user_id)
            .bind(slug)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| TaskbellError::Store(format!("find task failed: {e}")))?;

        row.map(task_from_row).transpose()
    }
}

/// Load a task only if `user_id` owns it. Works on the pool or inside a transaction.
async fn owned_task<'e, E>(
    executor: E,
    task_id: &str,
    user_id: &str,
) -> Result<Option<Task>, TaskbellError>
where
    E: SqliteExecutor<'e>,
{
    let sql = format!(
        "SELECT {TASK_COLUMNS} FROM tasks t \
         JOIN user_task ut ON ut.task_id = t.id \
         WHERE t.id = ? AND ut.user_id = ?"
    );
    let row: Option<TaskRow> = sqlx::query_as(&sql)
        .bind(task_id)
        .bind(user_id)
        .fetch_optional(executor)
        .await
        .map_err(|e| TaskbellError::Store(format!("get owned task failed: {e}")))?;

    row.map(task_from_row).transpose()
}
