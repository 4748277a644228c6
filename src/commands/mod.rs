//! Built-in bot commands: instant replies computed from the store.


use crate::gateway::messages::next_task_message;
use chrono::{DateTime, Utc};
use taskbell_core::model::{TaskUpdate, User};
use taskbell_store::Store;
use tracing::{info, warn};

/// Grouped context for command execution.
pub struct CommandContext<'a> {
    pub store: &'a Store,
    /// Messaging handle of the sender.
    pub sender_handle: i64,
    pub text: &'a str,
    pub now: DateTime<Utc>,
}

/// Known bot commands.
#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    Start,
    Link,
    Next,
    /// `/complete_<slug>`, where the slug is the task title with spaces as underscores.
    Complete(String),
    Help,
}

impl Command {
    /// Parse a command from message text. Anything unrecognized maps to `Help`.
    pub fn parse(text: &str) -> Self {
        let Some(first) = text.split_whitespace().next() else {
            return Self::Help;
        };
        // Telegram appends the bot name in some clients: "/next@taskbell_bot".
        let cmd = first.split('@').next().unwrap_or(first);
        match cmd {
            "/start" => Self::Start,
            "/link" => Self::Link,
            "/next" => Self::Next,
            _ => match cmd.strip_prefix("/complete_") {
                Some(slug) if !slug.is_empty() => Self::Complete(slug.to_string()),
                _ => Self::Help,
            },
        }
    }
}

/// Handle a command and return the response text.
pub async fn handle(cmd: Command, ctx: &CommandContext<'_>) -> String {
    match cmd {
        Command::Start => handle_start(),
        Command::Link => handle_link(ctx.store, ctx.sender_handle, ctx.text).await,
        Command::Next => handle_next(ctx.store, ctx.sender_handle, ctx.now).await,
        Command::Complete(slug) => handle_complete(ctx.store, ctx.sender_handle, &slug).await,
        Command::Help => handle_help(),
    }
}

const LINK_FIRST: &str = "Please link your account first using /link <username>";

fn handle_start() -> String {
    "Welcome to Task Reminder Bot!\n\
     Use /link <your_username> to connect your account."
        .to_string()
}

fn handle_help() -> String {
    "Available commands:\n\
     /link <username> - connect this chat to your account\n\
     /next - suggest one of your active tasks\n\
     /complete_<task_title> - mark a task as done"
        .to_string()
}

async fn handle_link(store: &Store, sender_handle: i64, text: &str) -> String {
    let Some(username) = text.split_whitespace().nth(1) else {
        return "Please provide your username: /link <username>".to_string();
    };
    match store.get_user(username).await {
        Ok(Some(_)) => match store.set_messaging_handle(username, sender_handle).await {
            Ok(_) => {
                info!("linked handle {sender_handle} to user {username}");
                format!("Successfully linked to account: {username}")
            }
            Err(e) => format!("Error: {e}"),
        },
        Ok(None) => "User not found. Please check your username.".to_string(),
        Err(e) => format!("Error: {e}"),
    }
}

async fn linked_user(store: &Store, sender_handle: i64) -> Result<Option<User>, String> {
    store
        .get_user_by_messaging_handle(sender_handle)
        .await
        .map_err(|e| format!("Error: {e}"))
}

async fn handle_next(store: &Store, sender_handle: i64, now: DateTime<Utc>) -> String {
    let user = match linked_user(store, sender_handle).await {
        Ok(Some(user)) => user,
        Ok(None) => return LINK_FIRST.to_string(),
        Err(reply) => return reply,
    };
    match store.pick_random_active_task(&user.id, now).await {
        Ok(Some(task)) => {
            next_task_message(&task, now).unwrap_or_else(|| "No active tasks found!".to_string())
        }
        Ok(None) => "No active tasks found!".to_string(),
        Err(e) => format!("Error: {e}"),
    }
}

async fn handle_complete(store: &Store, sender_handle: i64, slug: &str) -> String {
    let user = match linked_user(store, sender_handle).await {
        Ok(Some(user)) => user,
        Ok(None) => return LINK_FIRST.to_string(),
        Err(reply) => return reply,
    };
    let task = match store.find_open_task_by_slug(&user.id, slug).await {
        Ok(Some(task)) => task,
        Ok(None) => return format!("No open task named \"{}\".", slug.replace('_', " ")),
        Err(e) => return format!("Error: {e}"),
    };

    let update = TaskUpdate {
        completed: Some(true),
        ..Default::default()
    };
    match store.update_task(&task.id, &user.id, &update).await {
        Ok(done) => {
            info!("user {} completed task {}", user.id, done.id);
            format!("✅ Completed: {}", done.title)
        }
        Err(e) => {
            warn!("completing task {} failed: {e}", task.id);
            format!("Error: {e}")
        }
    }
}
