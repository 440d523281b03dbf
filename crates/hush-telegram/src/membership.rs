//! Membership gate backed by a required public channel.

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{Recipient, UserId};

use hush_whisper::{GateError, MembershipGate};

/// Checks whether a user belongs to the configured channel.
///
/// An empty channel name disables the gate. Transport errors are surfaced
/// as [`GateError`] so the engine can apply the configured
/// fail-open/fail-closed policy instead of defaulting by accident.
pub struct ChannelGate {
    bot: Bot,
    channel: String,
}

impl ChannelGate {
    pub fn new(bot: Bot, channel: &str) -> Self {
        Self {
            bot,
            channel: channel.trim_start_matches('@').to_string(),
        }
    }
}

#[async_trait]
impl MembershipGate for ChannelGate {
    async fn is_eligible(&self, user_id: i64) -> Result<bool, GateError> {
        if self.channel.is_empty() {
            return Ok(true);
        }
        let chat = Recipient::ChannelUsername(format!("@{}", self.channel));
        let member = self
            .bot
            .get_chat_member(chat, UserId(user_id as u64))
            .await
            .map_err(|e| GateError(e.to_string()))?;
        let kind = &member.kind;
        Ok(kind.is_owner() || kind.is_administrator() || kind.is_member())
    }
}
