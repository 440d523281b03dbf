use serde::{Deserialize, Serialize};

/// Lifecycle of a delivered whisper. Transitions only Sent → Read,
/// enforced by a conditional update in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WhisperStatus {
    Sent,
    Read,
}

impl std::fmt::Display for WhisperStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sent => write!(f, "sent"),
            Self::Read => write!(f, "read"),
        }
    }
}

impl std::str::FromStr for WhisperStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sent" => Ok(Self::Sent),
            "read" => Ok(Self::Read),
            other => Err(format!("unknown whisper status: {other}")),
        }
    }
}

/// A delivered whisper. Created by the delivery engine with status `Sent`;
/// mutated only by the visibility gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhisperRecord {
    pub id: i64,
    pub group_id: i64,
    pub sender_id: i64,
    pub receiver_id: i64,
    pub text: String,
    pub status: WhisperStatus,
    pub created_at: String,
    /// The gated group notification this whisper was announced with.
    pub message_id: Option<i64>,
}

/// A time-boxed whisper intent, at most one per sender.
#[derive(Debug, Clone)]
pub struct PendingRequest {
    pub sender_id: i64,
    pub group_id: i64,
    pub receiver_id: i64,
    pub created_at: String,
    pub expires_at: String,
    /// Transient guide message posted in the group, cleaned up later.
    pub guide_message_id: Option<i64>,
    /// Message the trigger replied to; the notification anchors to it.
    pub anchor_message_id: Option<i64>,
}

/// A directory entry for a user seen anywhere the bot operates.
#[derive(Debug, Clone)]
pub struct DirectoryUser {
    pub user_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub is_bot: bool,
}

/// Aggregate counters for the operator's /stats command.
#[derive(Debug, Clone, Copy)]
pub struct Stats {
    pub users: i64,
    pub groups: i64,
    pub whispers: i64,
}
