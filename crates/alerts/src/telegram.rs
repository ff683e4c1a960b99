//! Telegram delivery.

use crate::formatter::strip_html;
use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{ParseMode, Recipient};
use std::future::Future;
use thiserror::Error;
use tracing::{debug, error, warn};

/// Telegram rejects messages longer than 4096 characters.
pub const MAX_MESSAGE_CHARS: usize = 4000;

#[derive(Error, Debug)]
pub enum TelegramError {
    #[error("Telegram API error: {0}")]
    Api(#[from] teloxide::RequestError),
    #[error("Invalid chat id: {0:?}")]
    InvalidChatId(String),
}

/// Something that can deliver an HTML message.
#[async_trait]
pub trait MessageTransport: Send + Sync {
    async fn send_html(&self, html: &str) -> Result<(), TelegramError>;
}

/// Parse a chat id: numeric ids (`-100123...`) or `@channel` usernames.
pub fn parse_recipient(chat_id: &str) -> Result<Recipient, TelegramError> {
    let chat_id = chat_id.trim();
    if let Ok(id) = chat_id.parse::<i64>() {
        return Ok(Recipient::Id(ChatId(id)));
    }
    if chat_id.len() > 1 && chat_id.starts_with('@') {
        return Ok(Recipient::ChannelUsername(chat_id.to_string()));
    }
    Err(TelegramError::InvalidChatId(chat_id.to_string()))
}

/// Split a message at line boundaries so each chunk fits in `max_chars`.
///
/// A single line longer than the limit is kept whole.
pub fn split_message(text: &str, max_chars: usize) -> Vec<String> {
    if text.chars().count() <= max_chars {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut chunk = String::new();
    let mut chunk_len = 0;
    for line in text.split('\n') {
        let line_len = line.chars().count();
        if !chunk.is_empty() && chunk_len + 1 + line_len > max_chars {
            chunks.push(std::mem::take(&mut chunk));
            chunk_len = 0;
        }
        if !chunk.is_empty() {
            chunk.push('\n');
            chunk_len += 1;
        }
        chunk.push_str(line);
        chunk_len += line_len;
    }
    if !chunk.is_empty() {
        chunks.push(chunk);
    }
    chunks
}

/// Send every chunk in order, even after one fails.
///
/// Each failure is logged; the last one is returned.
async fn send_chunks<F, Fut>(chunks: Vec<String>, mut send: F) -> Result<(), TelegramError>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<(), TelegramError>>,
{
    let total = chunks.len();
    let mut last_error = None;
    for (i, chunk) in chunks.into_iter().enumerate() {
        if let Err(e) = send(chunk).await {
            error!("Failed to send message chunk {}/{}: {}", i + 1, total, e);
            last_error = Some(e);
        }
    }
    last_error.map_or(Ok(()), Err)
}

fn is_entity_error(err: &teloxide::RequestError) -> bool {
    let message = err.to_string().to_lowercase();
    message.contains("parse") || message.contains("entities")
}

/// Telegram bot bound to one destination chat.
pub struct TelegramBot {
    bot: Bot,
    chat: Recipient,
}

impl TelegramBot {
    /// Create a new bot with the given token and destination chat.
    pub fn new(token: &str, chat_id: &str) -> Result<Self, TelegramError> {
        Ok(Self {
            bot: Bot::new(token),
            chat: parse_recipient(chat_id)?,
        })
    }

    async fn send_chunk(&self, html: &str) -> Result<(), TelegramError> {
        let result = self
            .bot
            .send_message(self.chat.clone(), html)
            .parse_mode(ParseMode::Html)
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_entity_error(&e) => {
                warn!("Telegram rejected HTML ({}), resending as plain text", e);
                self.bot
                    .send_message(self.chat.clone(), strip_html(html))
                    .await?;
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl MessageTransport for TelegramBot {
    async fn send_html(&self, html: &str) -> Result<(), TelegramError> {
        let chunks = split_message(html, MAX_MESSAGE_CHARS);
        if chunks.len() > 1 {
            debug!("Splitting message into {} chunks", chunks.len());
        }
        send_chunks(chunks, |chunk| async move { self.send_chunk(&chunk).await }).await
    }
}
