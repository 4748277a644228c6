//! Per-user rate limit for random task reminders.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

/// Remembers when each user last received a random reminder.
///
/// Owned by the reminder loop; a restart starts with an empty map.
#[derive(Debug)]
pub struct ReminderThrottle {
    last_sent: HashMap<String, DateTime<Utc>>,
    period: Duration,
}

impl ReminderThrottle {
    pub fn new(period: Duration) -> Self {
        Self {
            last_sent: HashMap::new(),
            period,
        }
    }

    /// True unless the user got a reminder less than one period ago.
    pub fn should_send(&self, user_id: &str, now: DateTime<Utc>) -> bool {
        self.last_sent
            .get(user_id)
            .map_or(true, |last| now - *last >= self.period)
    }

    pub fn record_sent(&mut self, user_id: &str, now: DateTime<Utc>) {
        self.last_sent.insert(user_id.to_string(), now);
    }
}
