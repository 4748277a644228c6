//! Long-polling update loop and Channel trait implementation.

use super::types::{TgMessage, TgResponse, TgUpdate};
use super::{is_allowed, TelegramChannel};
use async_trait::async_trait;
use std::time::Duration;
use taskbell_core::{
    error::TaskbellError,
    message::IncomingMessage,
    traits::{Channel, Notifier},
};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

const MAX_BACKOFF_SECS: u64 = 60;

#[async_trait]
impl Notifier for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn send_message(&self, handle: i64, text: &str) -> Result<(), TaskbellError> {
        self.send_text(handle, text).await
    }
}

#[async_trait]
impl Channel for TelegramChannel {
    async fn start(&self) -> Result<mpsc::Receiver<IncomingMessage>, TaskbellError> {
        if self.config.bot_token.is_empty() {
            return Err(TaskbellError::Config(
                "telegram bot_token is empty (set it or TELEGRAM_BOT_TOKEN)".into(),
            ));
        }

        self.register_commands().await;

        let (tx, rx) = mpsc::channel(64);
        let client = self.client.clone();
        let base_url = self.base_url.clone();
        let allowed_users = self.config.allowed_users.clone();
        let last_update_id = self.last_update_id.clone();

        info!("Telegram channel starting long polling...");

        tokio::spawn(async move {
            let mut backoff_secs: u64 = 1;

            loop {
                let offset = last_update_id.lock().await.map(|id| id + 1);

                let mut url = format!("{base_url}/getUpdates?timeout=30");
                if let Some(off) = offset {
                    url.push_str(&format!("&offset={off}"));
                }

                let body: Result<TgResponse<Vec<TgUpdate>>, String> = match client
                    .get(&url)
                    .timeout(Duration::from_secs(35))
                    .send()
                    .await
                {
                    Ok(resp) => resp.json().await.map_err(|e| format!("parse error: {e}")),
                    Err(e) => Err(format!("poll error: {e}")),
                };

                let updates = match body {
                    Ok(b) if b.ok => b.result.unwrap_or_default(),
                    Ok(b) => {
                        error!(
                            "telegram API error (retry in {backoff_secs}s): {}",
                            b.description.unwrap_or_default()
                        );
                        backoff_secs = back_off(backoff_secs).await;
                        continue;
                    }
                    Err(e) => {
                        error!("telegram {e} (retry in {backoff_secs}s)");
                        backoff_secs = back_off(backoff_secs).await;
                        continue;
                    }
                };

                // Successful poll -- reset backoff.
                backoff_secs = 1;

                if let Some(last_update) = updates.last() {
                    *last_update_id.lock().await = Some(last_update.update_id);
                }

                for update in updates {
                    let Some(msg) = update.message else {
                        continue;
                    };
                    let Some(incoming) = to_incoming(msg, &allowed_users) else {
                        continue;
                    };
                    if tx.send(incoming).await.is_err() {
                        info!("telegram channel receiver dropped, stopping poll");
                        return;
                    }
                }
            }
        });

        Ok(rx)
    }

    async fn stop(&self) -> Result<(), TaskbellError> {
        info!("Telegram channel stopped");
        Ok(())
    }
}

/// Sleep for the current backoff and return the next one.
async fn back_off(secs: u64) -> u64 {
    tokio::time::sleep(Duration::from_secs(secs)).await;
    (secs * 2).min(MAX_BACKOFF_SECS)
}

/// Convert a Telegram message into an [`IncomingMessage`].
///
/// Returns `None` for non-text messages, anonymous senders, senders outside
/// `allowed_users`, and group chats.
pub(super) fn to_incoming(msg: TgMessage, allowed_users: &[i64]) -> Option<IncomingMessage> {
    let text = msg.text?;
    let user = msg.from?;

    if !is_allowed(allowed_users, user.id) {
        warn!("ignoring message from unauthorized user {}", user.id);
        return None;
    }

    // Drop group messages -- the bot only talks person-to-person.
    if msg.chat.is_group() {
        debug!("telegram: ignoring group message from chat {}", msg.chat.id);
        return None;
    }

    Some(IncomingMessage {
        channel: "telegram".to_string(),
        sender_handle: user.id,
        sender_name: Some(user.display_name()),
        chat_id: msg.chat.id,
        text,
        timestamp: chrono::Utc::now(),
    })
}
