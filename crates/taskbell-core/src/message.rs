use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A text message received by the bot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomingMessage {
    /// Channel name (e.g. "telegram").
    pub channel: String,
    /// Platform user id of the sender; becomes the user's messaging handle on `/link`.
    pub sender_handle: i64,
    /// Human-readable sender name.
    pub sender_name: Option<String>,
    /// Chat to reply into.
    pub chat_id: i64,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}
