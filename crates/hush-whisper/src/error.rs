use thiserror::Error;

use crate::transport::TransportError;
use hush_store::StoreError;

/// Errors surfaced by the whisper core. The recoverable variants map to
/// user-visible guidance in the adapter; the rest are generic failures.
#[derive(Debug, Error)]
pub enum WhisperError {
    /// Sender has not passed the membership gate.
    #[error("sender is not eligible")]
    NotEligible,

    /// Submitted content was not plain text. The pending entry is left
    /// untouched so the sender may retry.
    #[error("whispers are text-only")]
    NotTextOnly,

    /// No live pending request for the sender.
    #[error("no pending whisper request")]
    NoPendingRequest,

    /// Reveal token did not decode to (group, sender, receiver).
    #[error("malformed reveal token")]
    BadToken,

    /// The group notification could not be published. The whisper was not
    /// persisted; the pending entry is already consumed, so the sender must
    /// restart from the group (known recoverable-but-lossy edge).
    #[error("failed to publish group notification: {0}")]
    Notify(#[source] TransportError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
