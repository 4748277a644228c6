//! Random task reminder loop.

use super::messages::random_reminder_message;
use super::throttle::ReminderThrottle;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use taskbell_core::{error::TaskbellError, traits::Notifier};
use taskbell_store::Store;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Periodically nudges each linked user about one of their active tasks.
pub struct RandomReminder {
    store: Store,
    notifier: Arc<dyn Notifier>,
    throttle: ReminderThrottle,
}

impl RandomReminder {
    pub fn new(store: Store, notifier: Arc<dyn Notifier>, throttle: ReminderThrottle) -> Self {
        Self {
            store,
            notifier,
            throttle,
        }
    }

    /// One pass over active users. Returns the number of reminders delivered.
    pub async fn tick(&mut self, now: DateTime<Utc>) -> Result<usize, TaskbellError> {
        let users = self.store.list_active_task_users(now).await?;
        let mut sent = 0;

        for user in users {
            let Some(handle) = user.messaging_handle else {
                continue;
            };
            if !self.throttle.should_send(&user.id, now) {
                debug!("random reminder for {} throttled", user.id);
                continue;
            }

            let task = match self.store.pick_random_active_task(&user.id, now).await {
                Ok(Some(task)) => task,
                Ok(None) => continue,
                Err(e) => {
                    error!("random reminder: picking a task for {} failed: {e}", user.id);
                    continue;
                }
            };
            let Some(text) = random_reminder_message(&task, now) else {
                continue;
            };

            match self.notifier.send_message(handle, &text).await {
                Ok(()) => {
                    self.throttle.record_sent(&user.id, now);
                    sent += 1;
                    info!("random reminder for task {} sent to {}", task.id, user.id);
                }
                Err(e) => warn!("random reminder to {} failed: {e}", user.id),
            }
        }

        Ok(sent)
    }

    /// Tick every `interval` until the shutdown signal flips.
    pub async fn run(mut self, interval: std::time::Duration, mut shutdown: watch::Receiver<bool>) {
        info!("random reminder started (every {}s)", interval.as_secs());

        loop {
            if let Err(e) = self.tick(Utc::now()).await {
                error!("random reminder pass failed: {e}");
            }

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = shutdown.changed() => break,
            }
        }

        info!("random reminder stopped");
    }
}
