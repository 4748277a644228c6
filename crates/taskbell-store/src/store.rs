//! SQLite-backed user and task store.

mod notifications;
mod tasks;
mod users;

#[cfg(test)]
mod tests;

use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::collections::BTreeMap;
use std::str::FromStr;
use taskbell_core::{
    config::{shellexpand, StoreConfig},
    deadline::Thresholds,
    error::TaskbellError,
    model::Task,
};
use tracing::info;

/// Timestamp layout used for every stored datetime (UTC, fixed width so
/// that text comparison matches chronological order).
const DB_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Column list matching [`TaskRow`], for a `tasks` table aliased `t`.
const TASK_COLUMNS: &str = "t.id, t.title, t.description, t.difficulty, t.completed, \
                            t.start_time, t.end_time, t.notifications_sent";

/// (id, title, description, difficulty, completed, start_time, end_time, notifications_sent)
type TaskRow = (
    String,
    String,
    Option<String>,
    Option<i64>,
    bool,
    Option<String>,
    Option<String>,
    String,
);

/// Persistent store backed by SQLite.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
    thresholds: Thresholds,
}

impl Store {
    /// Create a new store, running migrations on first use.
    ///
    /// `thresholds` is the key set written into `notifications_sent` of
    /// every new task.
    pub async fn new(config: &StoreConfig, thresholds: Thresholds) -> Result<Self, TaskbellError> {
        let in_memory = config.db_path == ":memory:";
        let db_path = shellexpand(&config.db_path);

        let mut pool_opts = SqlitePoolOptions::new();
        let opts = if in_memory {
            // Every connection to `:memory:` is a separate database, so keep one forever.
            pool_opts = pool_opts
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
            SqliteConnectOptions::from_str("sqlite::memory:")
                .map_err(|e| TaskbellError::Store(format!("invalid db path: {e}")))?
        } else {
            // Ensure parent directory exists.
            if let Some(parent) = std::path::Path::new(&db_path).parent() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    TaskbellError::Store(format!("failed to create data dir: {e}"))
                })?;
            }
            pool_opts = pool_opts.max_connections(4);
            SqliteConnectOptions::from_str(&format!("sqlite:{db_path}"))
                .map_err(|e| TaskbellError::Store(format!("invalid db path: {e}")))?
                .create_if_missing(true)
                .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        };

        let pool = pool_opts
            .connect_with(opts.foreign_keys(true))
            .await
            .map_err(|e| TaskbellError::Store(format!("failed to connect to sqlite: {e}")))?;

        Self::run_migrations(&pool).await?;

        info!("Task store initialized at {db_path}");

        Ok(Self { pool, thresholds })
    }

    /// Threshold set used for new tasks.
    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    /// Run SQL migrations, tracking which have already been applied.
    async fn run_migrations(pool: &SqlitePool) -> Result<(), TaskbellError> {
        sqlx::raw_sql(
            "CREATE TABLE IF NOT EXISTS _migrations (
                name TEXT PRIMARY KEY,
                applied_at TEXT NOT NULL DEFAULT (datetime('now'))
            );",
        )
        .execute(pool)
        .await
        .map_err(|e| TaskbellError::Store(format!("failed to create migrations table: {e}")))?;

        let migrations: &[(&str, &str)] = &[("001_init", include_str!("../migrations/001_init.sql"))];

        for (name, sql) in migrations {
            let applied: Option<(String,)> =
                sqlx::query_as("SELECT name FROM _migrations WHERE name = ?")
                    .bind(name)
                    .fetch_optional(pool)
                    .await
                    .map_err(|e| {
                        TaskbellError::Store(format!("failed to check migration {name}: {e}"))
                    })?;

            if applied.is_some() {
                continue;
            }

            sqlx::raw_sql(sql)
                .execute(pool)
                .await
                .map_err(|e| TaskbellError::Store(format!("migration {name} failed: {e}")))?;

            sqlx::query("INSERT INTO _migrations (name) VALUES (?)")
                .bind(name)
                .execute(pool)
                .await
                .map_err(|e| {
                    TaskbellError::Store(format!("failed to record migration {name}: {e}"))
                })?;
        }
        Ok(())
    }

    /// Row counts for `taskbell status`: (users, tasks, open tasks with a deadline).
    pub async fn stats(&self) -> Result<(i64, i64, i64), TaskbellError> {
        let row: (i64, i64, i64) = sqlx::query_as(
            "SELECT \
                (SELECT COUNT(*) FROM users), \
                (SELECT COUNT(*) FROM tasks), \
                (SELECT COUNT(*) FROM tasks WHERE completed = 0 AND end_time IS NOT NULL)",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|e| TaskbellError::Store(format!("stats query failed: {e}")))?;
        Ok(row)
    }

    /// A fresh all-false `notifications_sent` map for the configured thresholds.
    fn initial_notifications(&self) -> BTreeMap<String, bool> {
        self.thresholds.iter().map(|t| (t.label(), false)).collect()
    }
}

pub(crate) fn to_db_time(t: DateTime<Utc>) -> String {
    t.format(DB_TIME_FORMAT).to_string()
}

pub(crate) fn from_db_time(s: &str) -> Result<DateTime<Utc>, TaskbellError> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S"))
        .map(|naive| naive.and_utc())
        .map_err(|e| TaskbellError::Store(format!("bad timestamp '{s}': {e}")))
}

fn task_from_row(row: TaskRow) -> Result<Task, TaskbellError> {
    let (id, title, description, difficulty, completed, start, end, notifications) = row;
    let difficulty = difficulty
        .map(i32::try_from)
        .transpose()
        .map_err(|e| TaskbellError::Store(format!("difficulty out of range for {id}: {e}")))?;
    Ok(Task {
        title,
        description,
        difficulty,
        completed,
        start_time: start.as_deref().map(from_db_time).transpose()?,
        end_time: end.as_deref().map(from_db_time).transpose()?,
        notifications_sent: serde_json::from_str(&notifications)?,
        id,
    })
}
