//! Deadline notification state machine.
//!
//! Decides, for a task and the current time, which reminder thresholds are
//! newly due. Everything here is pure; persisting the "sent" flag is the
//! store's job.
//!
//! Each threshold `t` owns the window `[t - 1, t]` minutes before the
//! deadline. With a scan cadence of one minute every window is visited
//! once, but a delayed scan can step over a window entirely, and a task
//! created 5 minutes before its deadline never sees any window. Strict mode
//! accepts those misses; catch-up mode (the default) fires the most urgent
//! entered window instead and reports the skipped larger ones as superseded.

use chrono::{DateTime, Utc};

use crate::error::TaskbellError;
use crate::model::{Task, Threshold};

/// The configured threshold set, descending and deduplicated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thresholds(Vec<Threshold>);

impl Thresholds {
    /// Normalize raw minute values: drop zeros, deduplicate, sort descending.
    pub fn new(minutes: &[u32]) -> Result<Self, TaskbellError> {
        let mut list: Vec<Threshold> = minutes
            .iter()
            .copied()
            .filter(|m| *m > 0)
            .map(Threshold::new)
            .collect();
        list.sort_unstable_by(|a, b| b.cmp(a));
        list.dedup();
        if list.is_empty() {
            return Err(TaskbellError::Config(
                "at least one positive notification threshold is required".into(),
            ));
        }
        Ok(Self(list))
    }

    pub fn iter(&self) -> impl Iterator<Item = Threshold> + '_ {
        self.0.iter().copied()
    }

    pub fn as_slice(&self) -> &[Threshold] {
        &self.0
    }

    /// Largest threshold, used to size the pending-task lookahead.
    pub fn largest(&self) -> Threshold {
        self.0[0]
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self(vec![
            Threshold::new(60),
            Threshold::new(30),
            Threshold::new(10),
        ])
    }
}

/// Fractional minutes from `now` until `deadline`; negative once passed.
pub fn minutes_until(deadline: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    (deadline - now).num_milliseconds() as f64 / 60_000.0
}

/// Thresholds whose one-minute window contains `now`, not yet sent.
///
/// Returned in descending order. Completed tasks and tasks without a
/// deadline never have due thresholds.
pub fn due_thresholds(task: &Task, thresholds: &Thresholds, now: DateTime<Utc>) -> Vec<Threshold> {
    let Some(minutes) = remaining_minutes(task, now) else {
        return Vec::new();
    };
    thresholds
        .iter()
        .filter(|t| !task.notification_sent(*t))
        .filter(|t| in_window(*t, minutes))
        .collect()
}

/// Whether `minutes` before the deadline falls in the `[t - 1, t]` window of `threshold`.
pub fn in_window(threshold: Threshold, minutes: f64) -> bool {
    let upper = f64::from(threshold.minutes());
    upper - 1.0 <= minutes && minutes <= upper
}

fn remaining_minutes(task: &Task, now: DateTime<Utc>) -> Option<f64> {
    if task.completed {
        return None;
    }
    task.end_time.map(|end| minutes_until(end, now))
}

/// Outcome of evaluating one task.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Evaluation {
    /// Thresholds to deliver and then mark, descending.
    pub due: Vec<Threshold>,
    /// Thresholds to mark without delivering (catch-up mode only).
    pub superseded: Vec<Threshold>,
}

impl Evaluation {
    pub fn is_empty(&self) -> bool {
        self.due.is_empty() && self.superseded.is_empty()
    }
}

/// Threshold set plus the window rule applied by the deadline scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadlinePolicy {
    thresholds: Thresholds,
    catch_up: bool,
}

impl DeadlinePolicy {
    pub fn new(thresholds: Thresholds, catch_up: bool) -> Self {
        Self {
            thresholds,
            catch_up,
        }
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    pub fn evaluate(&self, task: &Task, now: DateTime<Utc>) -> Evaluation {
        if !self.catch_up {
            return Evaluation {
                due: due_thresholds(task, &self.thresholds, now),
                superseded: Vec::new(),
            };
        }

        let Some(minutes) = remaining_minutes(task, now) else {
            return Evaluation::default();
        };
        if minutes < 0.0 {
            return Evaluation::default();
        }

        // Entered windows that have not fired yet, descending.
        let mut entered: Vec<Threshold> = self
            .thresholds
            .iter()
            .filter(|t| !task.notification_sent(*t))
            .filter(|t| minutes <= f64::from(t.minutes()))
            .collect();

        match entered.pop() {
            Some(most_urgent) => Evaluation {
                due: vec![most_urgent],
                superseded: entered,
            },
            None => Evaluation::default(),
        }
    }
}
