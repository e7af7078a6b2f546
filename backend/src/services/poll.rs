//! "Has everyone voted" check and the poll it triggers.
//!
//! The trigger reads the chat bindings and every participant's submission,
//! compares the submitted emails with the configured participant list and,
//! when they match exactly, sends one poll with an `artist - title` option
//! per participant.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use sqlx::SqlitePool;
use tokio::sync::{Mutex, RwLock};

use crate::config::PollConfig;
use crate::db::{ChatBindingRepository, SongChoice, UserRepository};
use crate::error::{AppError, AppResult};
use crate::AppState;

/// Something that can post a poll to a chat.
#[async_trait]
pub trait PollSender: Send + Sync + 'static {
    async fn send_poll(&self, chat_id: i64, question: &str, options: Vec<String>)
        -> AppResult<()>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PollOutcome {
    /// Nobody has bound a chat with `/start` yet.
    NoBinding,
    /// The submitted emails do not match the expected participants.
    Incomplete { submitted: usize, expected: usize },
    /// The same options were already posted.
    AlreadySent,
    /// Telegram polls need between 2 and 10 options.
    InvalidOptionCount { count: usize },
    Sent { chat_id: i64, options: Vec<String> },
}

/// Option count bounds enforced by the Telegram Bot API.
pub const MIN_POLL_OPTIONS: usize = 2;
pub const MAX_POLL_OPTIONS: usize = 10;

/// Order-independent multiset comparison of the two email lists.
pub fn everyone_answered(expected: &[String], submitted: &[String]) -> bool {
    if expected.is_empty() {
        return false;
    }

    let mut expected = expected.to_vec();
    let mut submitted = submitted.to_vec();
    expected.sort();
    submitted.sort();
    expected == submitted
}

/// One option per row. With `skip_incomplete` rows lacking a title or artist are dropped.
pub fn build_options(songs: &[SongChoice], skip_incomplete: bool) -> Vec<String> {
    songs
        .iter()
        .filter(|song| !skip_incomplete || song.is_complete())
        .map(SongChoice::label)
        .collect()
}

/// Serializes poll checks and remembers the last option list that went out.
#[derive(Default)]
pub struct PollGuard {
    last_sent: Mutex<Option<Vec<String>>>,
}

pub struct PollService {
    pool: SqlitePool,
    config: PollConfig,
    guard: Arc<PollGuard>,
    telegram: Arc<RwLock<Option<Arc<dyn PollSender>>>>,
}

impl PollService {
    pub fn new(state: &Arc<AppState>) -> Self {
        Self {
            pool: state.db.clone(),
            config: state.config.poll.clone(),
            guard: state.poll_guard.clone(),
            telegram: state.telegram.clone(),
        }
    }

    pub async fn poll_if_complete(&self) -> AppResult<PollOutcome> {
        // Held for the whole check so two concurrent triggers cannot both send.
        let mut last_sent = self.guard.last_sent.lock().await;

        let chat_ids = ChatBindingRepository::list_chat_ids(&self.pool).await?;
        let Some(&chat_id) = chat_ids.first() else {
            tracing::warn!("No Telegram chat is bound yet; skipping poll");
            return Ok(PollOutcome::NoBinding);
        };

        let songs = UserRepository::list_songs(&self.pool).await?;
        let emails = UserRepository::list_emails(&self.pool).await?;
        tracing::debug!("Submitted emails: {:?}", emails);

        if !everyone_answered(&self.config.expected_participants, &emails) {
            tracing::info!(
                "Waiting for submissions: {} submitted, {} expected",
                emails.len(),
                self.config.expected_participants.len()
            );
            return Ok(PollOutcome::Incomplete {
                submitted: emails.len(),
                expected: self.config.expected_participants.len(),
            });
        }

        let options = build_options(&songs, self.config.skip_incomplete);
        if !(MIN_POLL_OPTIONS..=MAX_POLL_OPTIONS).contains(&options.len()) {
            tracing::warn!(
                "Cannot send a poll with {} options (Telegram allows {}..={})",
                options.len(),
                MIN_POLL_OPTIONS,
                MAX_POLL_OPTIONS
            );
            return Ok(PollOutcome::InvalidOptionCount {
                count: options.len(),
            });
        }

        if last_sent.as_ref() == Some(&options) {
            tracing::info!("Poll with the same options was already sent; skipping");
            return Ok(PollOutcome::AlreadySent);
        }

        let sender = self
            .telegram
            .read()
            .await
            .clone()
            .ok_or_else(|| AppError::ServiceUnavailable("Telegram bot not configured".to_string()))?;

        sender
            .send_poll(chat_id, &self.config.question, options.clone())
            .await?;
        tracing::info!("Sent poll with {} options to chat {}", options.len(), chat_id);

        *last_sent = Some(options.clone());
        Ok(PollOutcome::Sent { chat_id, options })
    }
}
