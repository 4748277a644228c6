//! Outbound messages: `sendMessage`, command registration, splitting.

use super::types::TgResponse;
use super::TelegramChannel;
use taskbell_core::error::TaskbellError;
use tracing::{info, warn};

/// Telegram's per-message text limit, in bytes.
pub(crate) const MAX_MESSAGE_LEN: usize = 4096;

impl TelegramChannel {
    /// Send a plain-text message to a chat, split into API-sized chunks.
    pub(crate) async fn send_text(&self, chat_id: i64, text: &str) -> Result<(), TaskbellError> {
        let url = format!("{}/sendMessage", self.base_url);

        for chunk in split_message(text, MAX_MESSAGE_LEN) {
            let body = serde_json::json!({
                "chat_id": chat_id,
                "text": chunk,
            });

            let resp = self
                .client
                .post(&url)
                .json(&body)
                .send()
                .await
                .map_err(|e| TaskbellError::Delivery(format!("telegram send failed: {e}")))?;

            let status = resp.status();
            if !status.is_success() {
                let description = resp
                    .json::<TgResponse<serde_json::Value>>()
                    .await
                    .ok()
                    .and_then(|r| r.description)
                    .unwrap_or_default();
                return Err(TaskbellError::Delivery(format!(
                    "telegram send to {chat_id} got {status}: {description}"
                )));
            }
        }

        Ok(())
    }

    /// Register bot commands with Telegram so users see an autocomplete menu.
    /// Best-effort: logs failures but does not propagate errors.
    pub(crate) async fn register_commands(&self) {
        let commands = serde_json::json!({
            "commands": [
                { "command": "start", "description": "How to connect your account" },
                { "command": "link", "description": "Link this chat to your username" },
                { "command": "next", "description": "Suggest one of your active tasks" },
            ]
        });

        let url = format!("{}/setMyCommands", self.base_url);
        match self.client.post(&url).json(&commands).send().await {
            Ok(resp) if resp.status().is_success() => {
                info!("registered Telegram bot commands");
            }
            Ok(resp) => {
                let body = resp.text().await.unwrap_or_default();
                warn!("failed to register Telegram bot commands: {body}");
            }
            Err(e) => {
                warn!("failed to register Telegram bot commands: {e}");
            }
        }
    }
}

/// Split a long message into chunks of at most `max_len` bytes.
///
/// Breaks after the last newline inside the window when there is one and
/// never splits a UTF-8 character.
pub(crate) fn split_message(text: &str, max_len: usize) -> Vec<&str> {
    if text.len() <= max_len {
        return vec![text];
    }

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < text.len() {
        let mut end = (start + max_len).min(text.len());
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        if end == start {
            // max_len smaller than one character: emit it whole.
            end = start + text[start..].chars().next().map_or(1, char::len_utf8);
        }
        let break_at = if end < text.len() {
            text[start..end]
                .rfind('\n')
                .map(|i| start + i + 1)
                .unwrap_or(end)
        } else {
            end
        };
        chunks.push(&text[start..break_at]);
        start = break_at;
    }

    chunks
}
