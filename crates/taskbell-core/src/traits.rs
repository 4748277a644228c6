use crate::{error::TaskbellError, message::IncomingMessage};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Outbound messaging capability used by the reminder loops.
///
/// Failures are reported as [`TaskbellError::Delivery`]; callers log and
/// move on.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Human-readable notifier name.
    fn name(&self) -> &str;

    /// Send `text` to the chat identified by `handle`.
    async fn send_message(&self, handle: i64, text: &str) -> Result<(), TaskbellError>;
}

/// Bidirectional messaging channel: a notifier that also receives bot messages.
#[async_trait]
pub trait Channel: Notifier {
    /// Start listening for incoming messages.
    async fn start(&self) -> Result<tokio::sync::mpsc::Receiver<IncomingMessage>, TaskbellError>;

    /// Graceful shutdown.
    async fn stop(&self) -> Result<(), TaskbellError>;
}

/// One generated subtask.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakdownItem {
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Estimated effort in hours.
    #[serde(alias = "duration")]
    pub estimated_hours: f64,
}

/// Turns a free-form goal into an ordered list of subtasks.
#[async_trait]
pub trait TaskBreakdown: Send + Sync {
    /// Human-readable provider name.
    fn name(&self) -> &str;

    async fn breakdown(&self, prompt: &str) -> Result<Vec<BreakdownItem>, TaskbellError>;
}
