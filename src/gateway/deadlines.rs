//! Deadline scan loop: deliver threshold reminders and mark them sent.

use super::messages::deadline_message;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use taskbell_core::{
    deadline::DeadlinePolicy, error::TaskbellError, model::TaskWithOwners, traits::Notifier,
};
use taskbell_store::Store;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Counters for one scan, logged when anything happened.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScanReport {
    pub tasks: usize,
    pub delivered: usize,
    pub failed: usize,
    pub marked: usize,
    pub superseded: usize,
}

/// Periodic deadline reminder worker.
pub struct DeadlineScanner {
    store: Store,
    notifier: Arc<dyn Notifier>,
    policy: DeadlinePolicy,
    lookahead: Duration,
}

impl DeadlineScanner {
    pub fn new(
        store: Store,
        notifier: Arc<dyn Notifier>,
        policy: DeadlinePolicy,
        lookahead: Duration,
    ) -> Self {
        Self {
            store,
            notifier,
            policy,
            lookahead,
        }
    }

    /// One scan at `now`. Only the pending-task query can fail the scan;
    /// per-task errors are logged and the remaining tasks still run.
    pub async fn scan(&self, now: DateTime<Utc>) -> Result<ScanReport, TaskbellError> {
        let pending = self
            .store
            .list_pending_notification_tasks(now, self.lookahead)
            .await?;

        let mut report = ScanReport {
            tasks: pending.len(),
            ..Default::default()
        };
        for entry in &pending {
            if let Err(e) = self.process(entry, now, &mut report).await {
                error!("deadline scan: task {} failed: {e}", entry.task.id);
            }
        }
        Ok(report)
    }

    async fn process(
        &self,
        entry: &TaskWithOwners,
        now: DateTime<Utc>,
        report: &mut ScanReport,
    ) -> Result<(), TaskbellError> {
        let task = &entry.task;
        let Some(deadline) = task.end_time else {
            return Ok(());
        };

        let evaluation = self.policy.evaluate(task, now);
        if evaluation.is_empty() {
            return Ok(());
        }
        debug!(
            "task {}: due {:?}, superseded {:?}",
            task.id, evaluation.due, evaluation.superseded
        );

        for threshold in &evaluation.due {
            let text = deadline_message(&task.title, deadline, *threshold, now);
            for owner in &entry.owners {
                let Some(handle) = owner.messaging_handle else {
                    continue;
                };
                match self.notifier.send_message(handle, &text).await {
                    Ok(()) => {
                        report.delivered += 1;
                        info!(
                            "deadline reminder ({threshold}) for task {} sent to {}",
                            task.id, owner.id
                        );
                    }
                    Err(e) => {
                        report.failed += 1;
                        warn!(
                            "deadline reminder ({threshold}) for task {} to {} failed: {e}",
                            task.id, owner.id
                        );
                    }
                }
            }
            self.store.mark_notification_sent(&task.id, *threshold).await?;
            report.marked += 1;
        }

        for threshold in &evaluation.superseded {
            self.store.mark_notification_sent(&task.id, *threshold).await?;
            report.superseded += 1;
        }

        Ok(())
    }

    /// Scan every `poll` until the shutdown signal flips.
    pub async fn run(self, poll: std::time::Duration, mut shutdown: watch::Receiver<bool>) {
        info!(
            "deadline scanner started (every {}s, thresholds {:?})",
            poll.as_secs(),
            self.policy
                .thresholds()
                .iter()
                .map(|t| t.minutes())
                .collect::<Vec<_>>()
        );

        loop {
            match self.scan(Utc::now()).await {
                Ok(report) if report.marked + report.superseded > 0 => {
                    info!(
                        "deadline scan: {} tasks, {} delivered, {} failed, {} marked, {} superseded",
                        report.tasks,
                        report.delivered,
                        report.failed,
                        report.marked,
                        report.superseded
                    );
                }
                Ok(_) => {}
                Err(e) => error!("deadline scan failed: {e}"),
            }

            tokio::select! {
                _ = tokio::time::sleep(poll) => {}
                _ = shutdown.changed() => break,
            }
        }

        info!("deadline scanner stopped");
    }
}
