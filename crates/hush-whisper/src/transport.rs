//! The seams between the whisper core and the messaging transport.
//!
//! The core only ever talks to these traits. Adapters translate them to a
//! concrete chat platform; tests substitute recording mocks.

use async_trait::async_trait;
use tracing::warn;

/// An inline action attached to a notification. `token` travels back
/// verbatim as the callback payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    pub label: String,
    pub token: String,
}

impl Action {
    pub fn new(label: &str, token: &str) -> Self {
        Self {
            label: label.to_string(),
            token: token.to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("send failed: {0}")]
    Send(String),

    #[error("edit failed: {0}")]
    Edit(String),
}

/// Outbound messaging operations the core depends on.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Post a message to a chat, optionally as a reply, optionally with
    /// inline actions. Returns the new message id.
    async fn send_notification(
        &self,
        chat_id: i64,
        text: &str,
        reply_to: Option<i64>,
        actions: &[Action],
    ) -> Result<i64, TransportError>;

    /// Message a user privately.
    async fn send_private(&self, user_id: i64, text: &str) -> Result<i64, TransportError>;

    /// Delete a message. Returns `false` when the message is already gone;
    /// adapters may retry a bounded number of times internally.
    async fn delete_message(&self, chat_id: i64, message_id: i64) -> bool;

    /// Replace a notification's text and actions.
    async fn edit_notification(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
        actions: &[Action],
    ) -> Result<(), TransportError>;

    /// Ask the transport for a user's display name (directory miss path).
    async fn resolve_name(&self, user_id: i64) -> Option<String>;

    /// Render a clickable mention in the transport's markup.
    fn mention(&self, user_id: i64, name: &str) -> String;

    /// Escape free text for safe interpolation into the transport's markup.
    fn escape(&self, text: &str) -> String;
}

#[derive(Debug, thiserror::Error)]
#[error("membership check failed: {0}")]
pub struct GateError(pub String);

/// External membership/subscription gate consulted before accepting a
/// trigger or a private submission.
#[async_trait]
pub trait MembershipGate: Send + Sync {
    /// Whether the user may use the whisper flow. An `Err` means the check
    /// itself could not be performed; the engine resolves it per the
    /// configured fail-open/fail-closed policy.
    async fn is_eligible(&self, user_id: i64) -> Result<bool, GateError>;
}

/// The one place best-effort transport results are swallowed.
/// Logs the failure and moves on; callers get the value if there was one.
pub fn log_best_effort<T>(context: &str, result: Result<T, TransportError>) -> Option<T> {
    match result {
        Ok(v) => Some(v),
        Err(e) => {
            warn!(error = %e, "{context} failed (best effort)");
            None
        }
    }
}
