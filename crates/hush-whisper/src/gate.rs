//! The visibility gate: authorizes reveal requests and owns the
//! Sent → Read transition.

use tracing::{debug, info};

use hush_core::config::ReadReceipt;

use crate::engine::WhisperService;
use crate::error::WhisperError;
use crate::transport::{log_best_effort, Action};

/// Characters shown in the inline alert before the text is clipped and the
/// full version is sent through the private side channel.
pub const SNIPPET_CHARS: usize = 190;

const OVERFLOW_MARKER: &str = " …";

/// The reveal action payload attached to group notifications.
///
/// Wire format: `show:<groupId>:<senderId>:<receiverId>`. The token is not
/// a secret; authorization comes solely from the identity check against
/// sender/receiver/owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevealToken {
    pub group_id: i64,
    pub sender_id: i64,
    pub receiver_id: i64,
}

impl RevealToken {
    pub fn encode(&self) -> String {
        format!("show:{}:{}:{}", self.group_id, self.sender_id, self.receiver_id)
    }

    pub fn parse(data: &str) -> Option<Self> {
        let rest = data.strip_prefix("show:")?;
        let mut parts = rest.splitn(3, ':');
        let group_id = parts.next()?.parse().ok()?;
        let sender_id = parts.next()?.parse().ok()?;
        let receiver_id = parts.next()?.parse().ok()?;
        Some(Self {
            group_id,
            sender_id,
            receiver_id,
        })
    }
}

/// Per-caller outcome of a reveal request. The text field is only ever
/// populated for an authorized requester.
#[derive(Debug, Clone, PartialEq)]
pub enum Disclosure {
    /// The (possibly clipped) whisper text, ready for an inline alert.
    Disclosed { text: String },
    Denied,
    NotFound,
}

impl WhisperService {
    /// Serve a reveal request for `token` on behalf of `requester`.
    ///
    /// Authorized requesters are the whisper's sender, its receiver, and
    /// the owner. The first successful reveal flips the record to Read;
    /// re-revealing afterwards is always permitted.
    pub async fn reveal(
        &self,
        requester: i64,
        token: &str,
    ) -> Result<Disclosure, WhisperError> {
        let token = RevealToken::parse(token).ok_or(WhisperError::BadToken)?;
        let Some(record) =
            self.store()
                .latest_whisper(token.group_id, token.sender_id, token.receiver_id)?
        else {
            return Ok(Disclosure::NotFound);
        };

        let authorized = requester == record.sender_id
            || requester == record.receiver_id
            || requester == self.config().owner_id;
        if !authorized {
            debug!(requester, whisper = record.id, "reveal denied");
            return Ok(Disclosure::Denied);
        }

        let (snippet, clipped) = clip(&record.text);
        if clipped {
            // The alert only fits the snippet; the full text goes to the
            // requester privately, never to the group.
            let full = format!(
                "Full whisper text:\n{}",
                self.transport().escape(&record.text)
            );
            log_best_effort(
                "whisper side channel",
                self.transport().send_private(requester, &full).await,
            );
        }

        let transitioned = self.store().mark_whisper_read(record.id)?;
        if transitioned {
            info!(whisper = record.id, requester, "whisper read");
            if self.config().read_receipt == ReadReceipt::Active {
                self.post_read_banner(&record, token).await;
            }
        }

        Ok(Disclosure::Disclosed { text: snippet })
    }

    /// Active read-receipt policy: replace the group notification with a
    /// terminal read banner whose action re-enters the reveal contract.
    async fn post_read_banner(
        &self,
        record: &hush_store::types::WhisperRecord,
        token: RevealToken,
    ) {
        let Some(message_id) = record.message_id else {
            return;
        };
        let sender_name = self.display_name(record.sender_id, "sender").await;
        let receiver_name = self.display_name(record.receiver_id, "receiver").await;
        let banner = format!(
            "🔓 {} read the whisper\n👤 from: {}",
            self.transport().mention(record.receiver_id, &receiver_name),
            self.transport().mention(record.sender_id, &sender_name),
        );
        let actions = [Action::new("🔒 Show again", &token.encode())];
        log_best_effort(
            "read banner edit",
            self.transport()
                .edit_notification(record.group_id, message_id, &banner, &actions)
                .await,
        );
    }
}

/// Clip to the alert-safe snippet length. Returns the snippet and whether
/// anything was cut.
fn clip(text: &str) -> (String, bool) {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(SNIPPET_CHARS).collect();
    if chars.next().is_some() {
        (format!("{head}{OVERFLOW_MARKER}"), true)
    } else {
        (head, false)
    }
}
