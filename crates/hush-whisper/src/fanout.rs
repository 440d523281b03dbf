//! Administrative oversight fanout: whisper reports to the owner and the
//! group's registered watchers. Best effort, never raises.

use std::time::Duration;

use tracing::warn;

use hush_store::types::WhisperRecord;
use hush_store::Store;

use crate::transport::{log_best_effort, Transport};

/// Pause between recipient sends to respect transport rate limits.
const SEND_PAUSE: Duration = Duration::from_millis(100);

/// Deliver a whisper report to {owner} ∪ watchers(group).
///
/// The report carries the full text: this is the oversight path and
/// deliberately bypasses the visibility gate. Recipients are sent to
/// sequentially; one failure is logged and skipped, the rest still get
/// their copy.
pub(crate) async fn report(
    store: &Store,
    transport: &dyn Transport,
    owner_id: i64,
    record: &WhisperRecord,
    group_title: &str,
    sender_name: &str,
    receiver_name: &str,
) {
    let mut recipients = vec![owner_id];
    match store.watchers_for(record.group_id) {
        Ok(watchers) => {
            for w in watchers {
                if !recipients.contains(&w) {
                    recipients.push(w);
                }
            }
        }
        Err(e) => {
            warn!(group = record.group_id, error = %e, "watcher lookup failed; reporting to owner only");
        }
    }

    let text = format!(
        "📝 Whisper report\nGroup: {} (ID: {})\nFrom: {} ➜ To: {}\nText: {}",
        transport.escape(group_title),
        record.group_id,
        transport.mention(record.sender_id, sender_name),
        transport.mention(record.receiver_id, receiver_name),
        transport.escape(&record.text),
    );

    for (i, recipient) in recipients.iter().enumerate() {
        log_best_effort(
            "whisper report",
            transport.send_private(*recipient, &text).await,
        );
        if i + 1 < recipients.len() {
            tokio::time::sleep(SEND_PAUSE).await;
        }
    }
}
