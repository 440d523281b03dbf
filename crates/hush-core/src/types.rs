//! Narrow inbound types shared between the domain core and channel adapters.
//!
//! The core never sees transport message shapes. An adapter reduces each
//! incoming event to [`InboundMessage`]: sender, chat, text, optional reply
//! target, mention spans. Nothing else crosses the seam.

/// A participant as observed on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Peer {
    pub id: i64,
    pub name: String,
    pub is_bot: bool,
}

/// The bot's own identity, probed once at startup.
#[derive(Debug, Clone)]
pub struct BotIdentity {
    pub id: i64,
    pub username: String,
}

/// The message an inbound event replies to, if any.
#[derive(Debug, Clone)]
pub struct ReplyRef {
    pub message_id: i64,
    pub author: Option<Peer>,
}

/// A mention inside the message text.
///
/// `offset` and `len` are UTF-16 code units, as reported by the transport.
/// `user` is populated for rich mentions; plain `@username` mentions carry
/// only the username and are resolved by the adapter where possible.
#[derive(Debug, Clone)]
pub struct MentionSpan {
    pub offset: usize,
    pub len: usize,
    pub user: Option<Peer>,
    pub username: Option<String>,
}

/// A group-chat event reduced to the capabilities the core needs.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub sender: Peer,
    pub chat_id: i64,
    pub text: String,
    pub reply: Option<ReplyRef>,
    pub mentions: Vec<MentionSpan>,
}
