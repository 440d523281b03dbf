//! Telegram implementation of the core's transport seam.
//!
//! All outbound messages use HTML parse mode: mentions are `tg://user`
//! anchors and free text is escaped before interpolation.

use std::time::Duration;

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{
    InlineKeyboardButton, InlineKeyboardMarkup, MessageId, ParseMode, ReplyParameters,
};
use tracing::warn;

use hush_whisper::{Action, Transport, TransportError};

/// Deletions are the only retried transport operation.
const DELETE_ATTEMPTS: usize = 3;
const DELETE_RETRY_PAUSE: Duration = Duration::from_millis(600);

pub struct TelegramTransport {
    bot: Bot,
}

impl TelegramTransport {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

/// Strip angle brackets so a display name cannot smuggle markup into the
/// HTML we build around it.
pub fn sanitize(name: &str) -> String {
    let name = name.replace(['<', '>'], "");
    if name.is_empty() {
        "user".to_string()
    } else {
        name
    }
}

/// Escape free text for interpolation into an HTML-parse-mode message.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

pub fn mention_html(user_id: i64, name: &str) -> String {
    format!("<a href=\"tg://user?id={user_id}\">{}</a>", sanitize(name))
}

/// Delete with bounded retries. Returns `false` once every attempt failed,
/// which includes the message already being gone.
pub async fn safe_delete(bot: &Bot, chat_id: ChatId, message_id: MessageId) -> bool {
    for attempt in 1..=DELETE_ATTEMPTS {
        match bot.delete_message(chat_id, message_id).await {
            Ok(_) => return true,
            Err(e) => {
                if attempt == DELETE_ATTEMPTS {
                    warn!(chat = chat_id.0, message = message_id.0, error = %e, "delete gave up");
                } else {
                    tokio::time::sleep(DELETE_RETRY_PAUSE).await;
                }
            }
        }
    }
    false
}

pub(crate) fn action_keyboard(actions: &[Action]) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(
        actions
            .iter()
            .map(|a| vec![InlineKeyboardButton::callback(a.label.clone(), a.token.clone())]),
    )
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn send_notification(
        &self,
        chat_id: i64,
        text: &str,
        reply_to: Option<i64>,
        actions: &[Action],
    ) -> Result<i64, TransportError> {
        let mut req = self
            .bot
            .send_message(ChatId(chat_id), text)
            .parse_mode(ParseMode::Html);
        if let Some(anchor) = reply_to {
            req = req.reply_parameters(ReplyParameters::new(MessageId(anchor as i32)));
        }
        if !actions.is_empty() {
            req = req.reply_markup(action_keyboard(actions));
        }
        let sent = req
            .await
            .map_err(|e| TransportError::Send(e.to_string()))?;
        Ok(sent.id.0 as i64)
    }

    async fn send_private(&self, user_id: i64, text: &str) -> Result<i64, TransportError> {
        let sent = self
            .bot
            .send_message(ChatId(user_id), text)
            .parse_mode(ParseMode::Html)
            .await
            .map_err(|e| TransportError::Send(e.to_string()))?;
        Ok(sent.id.0 as i64)
    }

    async fn delete_message(&self, chat_id: i64, message_id: i64) -> bool {
        safe_delete(&self.bot, ChatId(chat_id), MessageId(message_id as i32)).await
    }

    async fn edit_notification(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
        actions: &[Action],
    ) -> Result<(), TransportError> {
        self.bot
            .edit_message_text(ChatId(chat_id), MessageId(message_id as i32), text)
            .parse_mode(ParseMode::Html)
            .reply_markup(action_keyboard(actions))
            .await
            .map(|_| ())
            .map_err(|e| TransportError::Edit(e.to_string()))
    }

    async fn resolve_name(&self, user_id: i64) -> Option<String> {
        let chat = self.bot.get_chat(ChatId(user_id)).await.ok()?;
        chat.first_name()
            .map(str::to_string)
            .or_else(|| chat.username().map(str::to_string))
    }

    fn mention(&self, user_id: i64, name: &str) -> String {
        mention_html(user_id, name)
    }

    fn escape(&self, text: &str) -> String {
        escape_html(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_markup_brackets() {
        assert_eq!(sanitize("<b>Eve</b>"), "bEve/b");
        assert_eq!(sanitize("Alice"), "Alice");
        assert_eq!(sanitize(""), "user");
    }

    #[test]
    fn escape_html_covers_ampersand_first() {
        assert_eq!(escape_html("a < b & c > d"), "a &lt; b &amp; c &gt; d");
        assert_eq!(escape_html("&lt;"), "&amp;lt;");
    }

    #[test]
    fn mention_links_to_user_id() {
        let m = mention_html(42, "Alice");
        assert_eq!(m, "<a href=\"tg://user?id=42\">Alice</a>");
    }

    #[test]
    fn mention_sanitizes_name() {
        let m = mention_html(42, "<i>Eve</i>");
        assert!(!m.contains("<i>"));
    }
}
