//! Owner broadcast relay: forward a banner to every known user and group.

use std::time::Duration;

use teloxide::prelude::*;
use teloxide::types::MessageId;
use tracing::{debug, warn};

use hush_store::Store;

/// Pause between forwards to respect Telegram rate limits.
const FORWARD_PAUSE: Duration = Duration::from_millis(50);

/// Forward `message_id` from `from_chat` to every broadcast target.
/// Best effort per destination; returns the delivered count.
pub async fn run(bot: &Bot, store: &Store, from_chat: ChatId, message_id: MessageId) -> usize {
    let targets = match store.broadcast_targets() {
        Ok(targets) => targets,
        Err(e) => {
            warn!(error = %e, "broadcast target lookup failed");
            return 0;
        }
    };

    let mut delivered = 0;
    for target in targets {
        match bot.forward_message(ChatId(target), from_chat, message_id).await {
            Ok(_) => delivered += 1,
            Err(e) => debug!(target, error = %e, "broadcast destination skipped"),
        }
        tokio::time::sleep(FORWARD_PAUSE).await;
    }
    delivered
}
