//! Initialization helpers for the application:
//! - database connection + migrations
//! - the optional Telegram bot and its command dispatcher
//!
//! This module centralizes bits that would otherwise live in `main.rs`.

use std::{path::PathBuf, str::FromStr, sync::Arc};

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

use crate::config::Config;
use crate::services::poll::PollSender;
use crate::services::telegram::{spawn_dispatcher, BotAccess, BotContext, TelegramService};

/// File behind a SQLite URL. SQLite URLs carry no credentials, so this is what gets logged.
fn database_file(options: &SqliteConnectOptions) -> PathBuf {
    options.clone().get_filename().into_owned()
}

/// Open the SQLite database named by `DATABASE_URL` and apply the migrations.
///
/// The file and its directory are created on first start. The pool is capped
/// by `DATABASE_MAX_CONNECTIONS`, one connection by default.
pub async fn init_db(config: &Config) -> Result<SqlitePool> {
    if !config.database.url.starts_with("sqlite:") {
        anyhow::bail!("DATABASE_URL must be a sqlite: URL");
    }
    let options = SqliteConnectOptions::from_str(&config.database.url)
        .context("DATABASE_URL is not a valid SQLite URL")?
        .create_if_missing(true);
    let file = database_file(&options);

    if let Some(dir) = file.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create database directory {}", dir.display()))?;
    }
    let fresh = !file.exists();

    let pool = SqlitePoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect_with(options)
        .await
        .with_context(|| format!("Failed to open database {}", file.display()))?;
    tracing::info!(
        "Opened {} database {}",
        if fresh { "new" } else { "existing" },
        file.display()
    );

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Database migrations applied");

    Ok(pool)
}

/// Initialize the Telegram bot when a token is configured: store it as the
/// poll sender and start the `/start` command dispatcher.
///
/// Failures are logged; the HTTP API keeps working without the bot and the
/// poll endpoint reports the bot as unavailable.
pub async fn initialize_telegram(
    state: &Arc<crate::AppState>,
    shutdown: tokio::sync::broadcast::Sender<()>,
) -> Vec<tokio::task::JoinHandle<()>> {
    let Some(ref token) = state.config.telegram.bot_token else {
        tracing::info!("TELEGRAM_BOT_TOKEN not set; Telegram bot disabled");
        return Vec::new();
    };

    tracing::info!("Initializing Telegram bot");
    let telegram = match TelegramService::new(token.clone()).await {
        Ok(telegram) => telegram,
        Err(e) => {
            tracing::warn!("Failed to initialize Telegram bot: {}", e);
            return Vec::new();
        }
    };

    if state.config.telegram.allowed_users.is_empty() {
        tracing::warn!("TELEGRAM_ALLOWED_USERS is empty; nobody can bind a chat with /start");
    }

    let ctx = BotContext {
        db: state.db.clone(),
        access: BotAccess::new(state.config.telegram.allowed_users.clone()),
    };
    let handles = spawn_dispatcher(telegram.get_bot().clone(), ctx, shutdown);

    let sender: Arc<dyn PollSender> = Arc::new(telegram);
    *state.telegram.write().await = Some(sender);
    tracing::info!("Telegram bot initialized successfully");

    handles
}
