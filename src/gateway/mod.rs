//! Gateway: the event loop connecting the bot channel, the store, and the
//! background reminder workers, with graceful shutdown.

mod deadlines;
pub(crate) mod messages;
mod reminders;
mod throttle;


use deadlines::DeadlineScanner;
use reminders::RandomReminder;
use throttle::ReminderThrottle;

use crate::commands::{self, Command, CommandContext};
use chrono::{Duration, Utc};
use std::sync::Arc;
use taskbell_core::{
    config::{DeadlineConfig, ReminderConfig},
    deadline::DeadlinePolicy,
    message::IncomingMessage,
    traits::{Channel, Notifier},
};
use taskbell_store::Store;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// How long workers get to reach their next sleep boundary on shutdown.
const SHUTDOWN_GRACE: std::time::Duration = std::time::Duration::from_secs(5);

/// Routes bot messages to command handlers and owns the reminder workers.
pub struct Gateway {
    store: Store,
    channel: Arc<dyn Channel>,
    notifier: Arc<dyn Notifier>,
    policy: DeadlinePolicy,
    deadline_config: DeadlineConfig,
    reminder_config: ReminderConfig,
}

impl Gateway {
    /// Create a new gateway. `notifier` is normally the same object as `channel`.
    pub fn new(
        store: Store,
        channel: Arc<dyn Channel>,
        notifier: Arc<dyn Notifier>,
        policy: DeadlinePolicy,
        deadline_config: DeadlineConfig,
        reminder_config: ReminderConfig,
    ) -> Self {
        Self {
            store,
            channel,
            notifier,
            policy,
            deadline_config,
            reminder_config,
        }
    }

    /// Run until ctrl-c.
    pub async fn run(self: Arc<Self>) -> anyhow::Result<()> {
        info!(
            "Taskbell gateway running | channel: {} | deadlines: {} | reminders: {}",
            self.channel.name(),
            if self.deadline_config.enabled { "on" } else { "off" },
            if self.reminder_config.enabled { "on" } else { "off" },
        );

        let lookahead = self.deadline_config.lookahead()?;
        let mut rx = self
            .channel
            .start()
            .await
            .map_err(|e| anyhow::anyhow!("failed to start channel {}: {e}", self.channel.name()))?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut handles: Vec<JoinHandle<()>> = Vec::new();

        if self.deadline_config.enabled {
            let scanner = DeadlineScanner::new(
                self.store.clone(),
                self.notifier.clone(),
                self.policy.clone(),
                lookahead,
            );
            let poll = std::time::Duration::from_secs(self.deadline_config.poll_interval_secs);
            handles.push(tokio::spawn(scanner.run(poll, shutdown_rx.clone())));
        }

        if self.reminder_config.enabled {
            let reminder = RandomReminder::new(
                self.store.clone(),
                self.notifier.clone(),
                ReminderThrottle::new(Duration::minutes(self.reminder_config.throttle_minutes)),
            );
            let interval = std::time::Duration::from_secs(self.reminder_config.interval_secs);
            handles.push(tokio::spawn(reminder.run(interval, shutdown_rx.clone())));
        }

        // Main event loop with graceful shutdown.
        loop {
            tokio::select! {
                Some(incoming) = rx.recv() => {
                    let gw = self.clone();
                    tokio::spawn(async move {
                        gw.dispatch_message(incoming).await;
                    });
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Received shutdown signal");
                    break;
                }
            }
        }

        self.shutdown(shutdown_tx, handles).await;
        Ok(())
    }

    /// Answer one bot message.
    async fn dispatch_message(&self, incoming: IncomingMessage) {
        let ctx = CommandContext {
            store: &self.store,
            sender_handle: incoming.sender_handle,
            text: &incoming.text,
            now: Utc::now(),
        };
        let reply = commands::handle(Command::parse(&incoming.text), &ctx).await;

        if let Err(e) = self.channel.send_message(incoming.chat_id, &reply).await {
            error!("failed to send reply to {}: {e}", incoming.chat_id);
        }
    }

    async fn shutdown(&self, shutdown_tx: watch::Sender<bool>, handles: Vec<JoinHandle<()>>) {
        info!("Shutting down...");

        let _ = shutdown_tx.send(true);
        for mut handle in handles {
            if tokio::time::timeout(SHUTDOWN_GRACE, &mut handle).await.is_err() {
                warn!("worker did not stop within {}s, aborting", SHUTDOWN_GRACE.as_secs());
                handle.abort();
            }
        }

        if let Err(e) = self.channel.stop().await {
            warn!("failed to stop channel {}: {e}", self.channel.name());
        }

        info!("Shutdown complete.");
    }
}
