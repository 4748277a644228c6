//! Users, tasks, and the allow-listed partial update applied to tasks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::TaskbellError;

/// A registered user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Stable external key (a username).
    pub id: String,
    /// Telegram chat id, once the user linked the bot.
    #[serde(rename = "telegram_id")]
    pub messaging_handle: Option<i64>,
}

/// A deadline notification threshold, in minutes before the deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Threshold(u32);

impl Threshold {
    pub fn new(minutes: u32) -> Self {
        Self(minutes)
    }

    pub fn minutes(self) -> u32 {
        self.0
    }

    /// Key used in `notifications_sent`.
    pub fn label(self) -> String {
        self.0.to_string()
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}m", self.0)
    }
}

/// A user task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub difficulty: Option<i32>,
    #[serde(default)]
    pub completed: bool,
    #[serde(rename = "start_datetime")]
    pub start_time: Option<DateTime<Utc>>,
    /// The deadline.
    #[serde(rename = "end_datetime")]
    pub end_time: Option<DateTime<Utc>>,
    /// Threshold label -> whether that reminder already fired.
    #[serde(default)]
    pub notifications_sent: BTreeMap<String, bool>,
}

impl Task {
    /// Whether the reminder for `threshold` already fired.
    pub fn notification_sent(&self, threshold: Threshold) -> bool {
        self.notifications_sent
            .get(&threshold.label())
            .copied()
            .unwrap_or(false)
    }

    /// Incomplete, has a deadline, and the deadline lies after `now`.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        !self.completed && self.end_time.is_some_and(|end| end > now)
    }
}

/// A task together with its owners, as loaded for deadline scanning.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskWithOwners {
    pub task: Task,
    pub owners: Vec<User>,
}

/// Fields accepted when creating a task.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewTask {
    /// Client-chosen id. A UUID is generated when absent.
    #[serde(default)]
    pub id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub difficulty: Option<i32>,
    #[serde(default, rename = "start_datetime")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, rename = "end_datetime")]
    pub end_time: Option<DateTime<Utc>>,
}

impl NewTask {
    pub fn validate(&self) -> Result<(), TaskbellError> {
        if self.title.trim().is_empty() {
            return Err(TaskbellError::Validation("title must not be empty".into()));
        }
        if let Some(id) = &self.id {
            if id.trim().is_empty() {
                return Err(TaskbellError::Validation("id must not be empty".into()));
            }
        }
        check_time_order(self.start_time, self.end_time)
    }
}

/// Partial update of a task. Absent fields are left untouched.
///
/// Nullable attributes use `Option<Option<T>>`: `None` keeps the current
/// value, `Some(None)` clears it. Unknown JSON fields are ignored.
/// `notifications_sent` is deliberately not part of this structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskUpdate {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub difficulty: Option<Option<i32>>,
    #[serde(default)]
    pub completed: Option<bool>,
    #[serde(default, rename = "start_datetime", deserialize_with = "double_option")]
    pub start_time: Option<Option<DateTime<Utc>>>,
    #[serde(default, rename = "end_datetime", deserialize_with = "double_option")]
    pub end_time: Option<Option<DateTime<Utc>>>,
}

impl TaskUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.difficulty.is_none()
            && self.completed.is_none()
            && self.start_time.is_none()
            && self.end_time.is_none()
    }

    /// Apply the present fields to `task`, validating the result.
    ///
    /// On error `task` is left unchanged.
    pub fn apply_to(&self, task: &mut Task) -> Result<(), TaskbellError> {
        let mut next = task.clone();
        if let Some(title) = &self.title {
            if title.trim().is_empty() {
                return Err(TaskbellError::Validation("title must not be empty".into()));
            }
            next.title = title.clone();
        }
        if let Some(description) = &self.description {
            next.description = description.clone();
        }
        if let Some(difficulty) = self.difficulty {
            next.difficulty = difficulty;
        }
        if let Some(completed) = self.completed {
            next.completed = completed;
        }
        if let Some(start) = self.start_time {
            next.start_time = start;
        }
        if let Some(end) = self.end_time {
            next.end_time = end;
        }
        check_time_order(next.start_time, next.end_time)?;
        *task = next;
        Ok(())
    }
}

fn check_time_order(
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
) -> Result<(), TaskbellError> {
    match (start, end) {
        (Some(s), Some(e)) if s > e => Err(TaskbellError::Validation(
            "start_datetime must not be after end_datetime".into(),
        )),
        _ => Ok(()),
    }
}

/// Distinguish an explicit JSON `null` (clear) from a missing field (keep).
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
