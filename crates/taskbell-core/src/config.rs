use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::deadline::{DeadlinePolicy, Thresholds};
use crate::error::TaskbellError;

/// Top-level taskbell configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub taskbell: TaskbellConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub channel: ChannelConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub deadlines: DeadlineConfig,
    #[serde(default)]
    pub reminders: ReminderConfig,
}

/// General process settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskbellConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for TaskbellConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            log_level: default_log_level(),
        }
    }
}

/// Storage config. `db_path = ":memory:"` opens a private in-memory database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

/// Channel configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChannelConfig {
    pub telegram: Option<TelegramConfig>,
}

/// Telegram bot config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub bot_token: String,
    /// Telegram user ids allowed to talk to the bot. Empty = allow all.
    #[serde(default)]
    pub allowed_users: Vec<i64>,
}

/// Provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProviderConfig {
    pub openai: Option<OpenAiConfig>,
}

/// OpenAI-compatible task breakdown provider config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_openai_model")]
    pub model: String,
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: String::new(),
            model: default_openai_model(),
            base_url: default_openai_base_url(),
        }
    }
}

/// Deadline scan loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadlineConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_deadline_poll")]
    pub poll_interval_secs: u64,
    /// How far ahead the pending-notification query looks.
    #[serde(default = "default_lookahead")]
    pub lookahead_minutes: i64,
    /// Minutes before the deadline at which reminders fire.
    #[serde(default = "default_thresholds")]
    pub thresholds: Vec<u32>,
    /// Fire the most urgent entered window when a scan stepped over one.
    #[serde(default = "default_true")]
    pub catch_up: bool,
}

impl Default for DeadlineConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_secs: default_deadline_poll(),
            lookahead_minutes: default_lookahead(),
            thresholds: default_thresholds(),
            catch_up: true,
        }
    }
}

impl DeadlineConfig {
    pub fn thresholds(&self) -> Result<Thresholds, TaskbellError> {
        Thresholds::new(&self.thresholds)
    }

    pub fn policy(&self) -> Result<DeadlinePolicy, TaskbellError> {
        Ok(DeadlinePolicy::new(self.thresholds()?, self.catch_up))
    }

    /// Pending-task lookahead, never shorter than the largest threshold.
    pub fn lookahead(&self) -> Result<chrono::Duration, TaskbellError> {
        let largest = i64::from(self.thresholds()?.largest().minutes());
        Ok(chrono::Duration::minutes(self.lookahead_minutes.max(largest)))
    }
}

/// Random task reminder loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReminderConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_reminder_interval")]
    pub interval_secs: u64,
    /// Minimum gap between two random reminders for the same user.
    #[serde(default = "default_throttle_minutes")]
    pub throttle_minutes: i64,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: default_reminder_interval(),
            throttle_minutes: default_throttle_minutes(),
        }
    }
}

// --- Default value functions ---

fn default_name() -> String {
    "taskbell".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_db_path() -> String {
    "~/.taskbell/tasks.db".to_string()
}
fn default_true() -> bool {
    true
}
fn default_openai_model() -> String {
    "gpt-4o".to_string()
}
fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_deadline_poll() -> u64 {
    60
}
fn default_lookahead() -> i64 {
    65
}
fn default_thresholds() -> Vec<u32> {
    vec![60, 30, 10]
}
fn default_reminder_interval() -> u64 {
    1200
}
fn default_throttle_minutes() -> i64 {
    60
}

/// Expand `~` to home directory.
pub fn shellexpand(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return format!("{}/{rest}", home.to_string_lossy());
        }
    }
    path.to_string()
}

/// Load configuration from a TOML file.
///
/// Falls back to defaults if the file does not exist. Empty secrets are
/// filled from `TELEGRAM_BOT_TOKEN` and `OPENAI_API_KEY`.
pub fn load(path: &str) -> Result<Config, TaskbellError> {
    let path = Path::new(path);
    let mut config = if path.exists() {
        let content = std::fs::read_to_string(path).map_err(|e| {
            TaskbellError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        parse(&content)?
    } else {
        tracing::info!(
            "Config file not found at {}, using defaults",
            path.display()
        );
        Config::default()
    };

    apply_env_overrides(
        &mut config,
        std::env::var("TELEGRAM_BOT_TOKEN").ok(),
        std::env::var("OPENAI_API_KEY").ok(),
    );
    Ok(config)
}

/// Parse and validate configuration from TOML text.
pub fn parse(content: &str) -> Result<Config, TaskbellError> {
    let config: Config = toml::from_str(content)
        .map_err(|e| TaskbellError::Config(format!("failed to parse config: {}", e)))?;
    let largest = config.deadlines.thresholds()?.largest().minutes();
    if config.deadlines.poll_interval_secs == 0 || config.reminders.interval_secs == 0 {
        return Err(TaskbellError::Config(
            "loop intervals must be greater than zero".into(),
        ));
    }
    if config.reminders.throttle_minutes < 0 {
        return Err(TaskbellError::Config(
            "reminders.throttle_minutes must not be negative".into(),
        ));
    }
    if config.deadlines.lookahead_minutes < i64::from(largest) {
        return Err(TaskbellError::Config(format!(
            "deadlines.lookahead_minutes ({}) must cover the largest threshold ({largest})",
            config.deadlines.lookahead_minutes
        )));
    }
    Ok(config)
}

fn apply_env_overrides(
    config: &mut Config,
    telegram_token: Option<String>,
    openai_key: Option<String>,
) {
    if let Some(token) = telegram_token.filter(|t| !t.is_empty()) {
        let tg = config.channel.telegram.get_or_insert(TelegramConfig {
            enabled: true,
            bot_token: String::new(),
            allowed_users: Vec::new(),
        });
        if tg.bot_token.is_empty() {
            tg.bot_token = token;
        }
    }
    if let Some(key) = openai_key.filter(|k| !k.is_empty()) {
        if let Some(openai) = config.provider.openai.as_mut() {
            if openai.api_key.is_empty() {
                openai.api_key = key;
            }
        }
    }
}
