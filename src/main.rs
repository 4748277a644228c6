mod commands;
mod gateway;
mod planner;

use clap::{Parser, Subcommand};
use std::sync::Arc;
use taskbell_channels::telegram::TelegramChannel;
use taskbell_core::config;
use taskbell_providers::openai::OpenAiBreakdown;
use taskbell_store::Store;

#[derive(Parser)]
#[command(
    name = "taskbell",
    version,
    about = "Taskbell: deadline reminders for shared tasks"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file.
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the bot and the reminder loops.
    Start,
    /// Show configuration and store summary.
    Status,
    /// Break a goal into scheduled tasks with the configured AI provider.
    Plan {
        /// User who will own the generated tasks.
        #[arg(short, long)]
        user: String,
        /// Describe what you want to get done.
        #[arg(trailing_var_arg = true)]
        prompt: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load(&cli.config)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cfg.taskbell.log_level)),
        )
        .init();

    match cli.command {
        Commands::Start => {
            let tg = match cfg.channel.telegram {
                Some(ref tg) if tg.enabled => tg.clone(),
                _ => anyhow::bail!(
                    "Telegram is not enabled. Enable [channel.telegram] in {}.",
                    cli.config
                ),
            };
            if tg.bot_token.is_empty() {
                anyhow::bail!(
                    "Telegram is enabled but bot_token is empty. \
                     Set it in {} or TELEGRAM_BOT_TOKEN env var.",
                    cli.config
                );
            }

            let policy = cfg.deadlines.policy()?;
            let store = Store::new(&cfg.store, policy.thresholds().clone()).await?;
            let telegram = Arc::new(TelegramChannel::new(tg));

            println!("Taskbell: starting...");
            let gw = Arc::new(gateway::Gateway::new(
                store,
                telegram.clone(),
                telegram,
                policy,
                cfg.deadlines.clone(),
                cfg.reminders.clone(),
            ));
            gw.run().await?;
        }
        Commands::Status => {
            println!("Taskbell status\n");
            println!("Config: {}", cli.config);
            println!("Database: {}", config::shellexpand(&cfg.store.db_path));

            let thresholds = cfg.deadlines.thresholds()?;
            match Store::new(&cfg.store, thresholds.clone()).await {
                Ok(store) => {
                    let (users, tasks, open) = store.stats().await?;
                    println!("  users: {users}, tasks: {tasks}, open with deadline: {open}");
                }
                Err(e) => println!("  store: unavailable ({e})"),
            }
            println!();

            println!(
                "  deadlines: {} (every {}s, thresholds {:?}, {})",
                if cfg.deadlines.enabled { "on" } else { "off" },
                cfg.deadlines.poll_interval_secs,
                thresholds.iter().map(|t| t.minutes()).collect::<Vec<_>>(),
                if cfg.deadlines.catch_up {
                    "catch-up"
                } else {
                    "strict"
                }
            );
            println!(
                "  reminders: {} (every {}s, at most one per {} min)",
                if cfg.reminders.enabled { "on" } else { "off" },
                cfg.reminders.interval_secs,
                cfg.reminders.throttle_minutes
            );

            match cfg.channel.telegram {
                Some(ref tg) => println!(
                    "  telegram: {}",
                    if tg.enabled && !tg.bot_token.is_empty() {
                        "configured"
                    } else if tg.enabled {
                        "enabled but missing bot_token"
                    } else {
                        "disabled"
                    }
                ),
                None => println!("  telegram: not configured"),
            }
            match cfg.provider.openai {
                Some(ref ai) if ai.enabled && !ai.api_key.is_empty() => {
                    println!("  openai: configured ({})", ai.model)
                }
                Some(ref ai) if ai.enabled => println!("  openai: enabled but missing api_key"),
                _ => println!("  openai: not configured"),
            }
        }
        Commands::Plan { user, prompt } => {
            if prompt.is_empty() {
                anyhow::bail!("no prompt provided. Usage: taskbell plan --user <id> <prompt>");
            }
            let prompt = prompt.join(" ");

            let ai = match cfg.provider.openai {
                Some(ref ai) if ai.enabled => ai,
                _ => anyhow::bail!(
                    "OpenAI is not enabled. Enable [provider.openai] in {}.",
                    cli.config
                ),
            };
            let generator = OpenAiBreakdown::from_config(ai)?;
            let store = Store::new(&cfg.store, cfg.deadlines.thresholds()?).await?;

            let tasks =
                planner::plan_tasks(&store, &generator, &user, &prompt, chrono::Utc::now()).await?;
            println!("Created {} tasks for {user}:", tasks.len());
            for task in &tasks {
                let window = match (task.start_time, task.end_time) {
                    (Some(start), Some(end)) => format!(
                        "{} → {}",
                        start.format("%Y-%m-%d %H:%M"),
                        end.format("%H:%M")
                    ),
                    _ => String::new(),
                };
                println!("  [{}] {} {window}", &task.id[..8.min(task.id.len())], task.title);
            }
        }
    }

    Ok(())
}
