use async_trait::async_trait;
use sqlx::SqlitePool;
use teloxide::prelude::*;
use teloxide::types::ChatId;
use teloxide::utils::command::BotCommands;

use crate::db::{ChatBinding, ChatBindingRepository};
use crate::error::{AppError, AppResult};
use crate::services::poll::PollSender;

#[derive(Clone)]
pub struct TelegramService {
    bot: Bot,
}

impl TelegramService {
    pub async fn new(token: String) -> AppResult<Self> {
        let bot = Bot::new(token);

        // Verify the bot token by getting bot info
        match bot.get_me().await {
            Ok(me) => {
                tracing::info!("Telegram bot initialized: @{}", me.username());
                Ok(Self { bot })
            }
            Err(e) => {
                tracing::error!("Failed to initialize Telegram bot: {}", e);
                Err(AppError::Telegram(format!(
                    "Failed to initialize bot: {}",
                    e
                )))
            }
        }
    }

    pub fn get_bot(&self) -> &Bot {
        &self.bot
    }
}

#[async_trait]
impl PollSender for TelegramService {
    async fn send_poll(
        &self,
        chat_id: i64,
        question: &str,
        options: Vec<String>,
    ) -> AppResult<()> {
        match self
            .bot
            .send_poll(ChatId(chat_id), question, options)
            .is_anonymous(false)
            .await
        {
            Ok(sent) => {
                tracing::debug!("Telegram poll sent to {}: message_id={}", chat_id, sent.id);
                Ok(())
            }
            Err(e) => {
                tracing::error!("Failed to send Telegram poll: {}", e);
                Err(AppError::Telegram(format!("Failed to send poll: {}", e)))
            }
        }
    }
}

// ============================================================================
// Bot commands
// ============================================================================

/// Decides which Telegram users may bind a chat to the app.
#[derive(Debug, Clone, Default)]
pub struct BotAccess {
    allowed_users: Vec<String>,
}

impl BotAccess {
    pub fn new(allowed_users: Vec<String>) -> Self {
        Self { allowed_users }
    }

    /// User names compare case-insensitively, as Telegram treats them.
    pub fn can_bind(&self, username: Option<&str>) -> bool {
        let Some(username) = username else {
            return false;
        };
        self.allowed_users
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(username))
    }
}

#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(rename_rule = "lowercase", description = "These commands are supported:")]
pub enum Command {
    #[command(description = "Connect this chat to the song vote.")]
    Start,
}

/// Dependencies injected into the bot handlers.
#[derive(Clone)]
pub struct BotContext {
    pub db: SqlitePool,
    pub access: BotAccess,
}

pub const CONNECTED_REPLY: &str = "Connection established.";

/// Bind the chat for an allowed user. Returns the binding that was stored, or
/// `None` when the sender is not allowed.
pub async fn bind_chat(
    ctx: &BotContext,
    username: Option<&str>,
    chat_id: i64,
) -> AppResult<Option<ChatBinding>> {
    if !ctx.access.can_bind(username) {
        tracing::warn!("Ignoring /start from unauthorized user {:?}", username);
        return Ok(None);
    }

    let binding = ChatBinding {
        user_name: username.unwrap_or_default().to_string(),
        chat_id,
    };
    ChatBindingRepository::bind(&ctx.db, &binding).await?;
    tracing::info!("Bound chat {} for @{}", binding.chat_id, binding.user_name);
    Ok(Some(binding))
}

async fn command_handler(bot: Bot, msg: Message, cmd: Command, ctx: BotContext) -> AppResult<()> {
    match cmd {
        Command::Start => {
            let username = msg.from().and_then(|user| user.username.clone());
            if bind_chat(&ctx, username.as_deref(), msg.chat.id.0)
                .await?
                .is_some()
            {
                bot.send_message(msg.chat.id, CONNECTED_REPLY)
                    .await
                    .map_err(|e| AppError::Telegram(format!("Failed to reply: {}", e)))?;
            }
        }
    }
    Ok(())
}

/// Spawn the long-polling dispatcher for bot commands. It stops when `shutdown` fires.
pub fn spawn_dispatcher(
    bot: Bot,
    ctx: BotContext,
    shutdown: tokio::sync::broadcast::Sender<()>,
) -> Vec<tokio::task::JoinHandle<()>> {
    let handler = Update::filter_message()
        .filter_command::<Command>()
        .endpoint(command_handler);

    let mut dispatcher = Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![ctx])
        .build();
    let token = dispatcher.shutdown_token();

    let mut shutdown_rx = shutdown.subscribe();
    let stopper = tokio::spawn(async move {
        let _ = shutdown_rx.recv().await;
        match token.shutdown() {
            Ok(done) => {
                done.await;
                tracing::info!("Telegram dispatcher stopped");
            }
            Err(e) => tracing::debug!("Telegram dispatcher was not running: {:?}", e),
        }
    });

    let runner = tokio::spawn(async move {
        tracing::info!("Starting Telegram command dispatcher");
        dispatcher.dispatch().await;
    });

    vec![runner, stopper]
}
