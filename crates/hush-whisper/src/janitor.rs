//! Delayed cleanup of transient guide messages.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::transport::Transport;

/// Schedule a one-shot deletion of `message_id` in `chat_id` after `delay`.
///
/// Detached from the request path: the task is fire-and-forget and its
/// outcome is unobserved. The target may already have been deleted by the
/// delivery engine; that attempt is a harmless no-op.
pub fn schedule_cleanup(
    transport: Arc<dyn Transport>,
    chat_id: i64,
    message_id: i64,
    delay: Duration,
) {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        if !transport.delete_message(chat_id, message_id).await {
            debug!(chat_id, message_id, "scheduled cleanup: message already gone");
        }
    });
}
