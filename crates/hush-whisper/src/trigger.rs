//! Whisper trigger detection in group conversations.
//!
//! Two forms open a whisper:
//! - reply form: the message replies to the target and its text is one of
//!   the trigger keywords — this opens a pending request and the text is
//!   submitted later in private;
//! - inline form: the message mentions the bot and a target and carries
//!   residual free text — the whisper is created immediately from that text.

use hush_core::types::{BotIdentity, InboundMessage, MentionSpan, Peer};

/// Keywords that open a whisper when sent as a reply. Matched
/// case-insensitively against the trimmed message text.
pub const TRIGGER_KEYWORDS: &[&str] = &["whisper", "hush", "psst"];

/// What the detector decided about a group message.
#[derive(Debug, Clone, PartialEq)]
pub enum TriggerOutcome {
    /// Reply form: open a pending request, text arrives later in private.
    OpenPending { receiver: Peer, anchor: i64 },
    /// Inline form: create the whisper immediately with the extracted text.
    OpenImmediate { receiver: Peer, text: String },
    /// Keyword present but the message is not a reply. The caller must
    /// answer with a corrective notice, not stay silent.
    NeedsReply,
    /// Not a whisper trigger at all.
    Ignore,
}

/// Decide whether a group message opens a whisper.
pub fn detect(msg: &InboundMessage, bot: &BotIdentity) -> TriggerOutcome {
    let text = msg.text.trim();

    if is_trigger_keyword(text) {
        let Some(reply) = &msg.reply else {
            return TriggerOutcome::NeedsReply;
        };
        let Some(author) = &reply.author else {
            return TriggerOutcome::Ignore;
        };
        if author.is_bot || author.id == bot.id {
            return TriggerOutcome::Ignore;
        }
        return TriggerOutcome::OpenPending {
            receiver: author.clone(),
            anchor: reply.message_id,
        };
    }

    detect_inline(msg, bot)
}

fn detect_inline(msg: &InboundMessage, bot: &BotIdentity) -> TriggerOutcome {
    let mut bot_span: Option<&MentionSpan> = None;
    let mut target_span: Option<&MentionSpan> = None;

    for span in &msg.mentions {
        if mentions_bot(span, bot) {
            if bot_span.is_none() {
                bot_span = Some(span);
            }
        } else if target_span.is_none() {
            target_span = Some(span);
        }
    }

    let (Some(bot_span), Some(target_span)) = (bot_span, target_span) else {
        return TriggerOutcome::Ignore;
    };
    // Plain @username mentions the adapter could not resolve stay opaque.
    let Some(receiver) = target_span.user.clone() else {
        return TriggerOutcome::Ignore;
    };
    if receiver.is_bot || receiver.id == bot.id {
        return TriggerOutcome::Ignore;
    }

    let residual = strip_spans(&msg.text, &[bot_span, target_span]);
    let residual = residual.trim();
    if residual.is_empty() {
        return TriggerOutcome::Ignore;
    }

    TriggerOutcome::OpenImmediate {
        receiver,
        text: residual.to_string(),
    }
}

fn is_trigger_keyword(text: &str) -> bool {
    TRIGGER_KEYWORDS.iter().any(|k| text.eq_ignore_ascii_case(k))
}

fn mentions_bot(span: &MentionSpan, bot: &BotIdentity) -> bool {
    if let Some(user) = &span.user {
        return user.id == bot.id;
    }
    span.username
        .as_deref()
        .map(|u| u.eq_ignore_ascii_case(&bot.username))
        .unwrap_or(false)
}

/// Remove the given mention spans from `text`. Span offsets are UTF-16
/// code units, so we walk chars tracking their UTF-16 width.
fn strip_spans(text: &str, spans: &[&MentionSpan]) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pos = 0usize;
    for ch in text.chars() {
        let width = ch.len_utf16();
        let inside = spans
            .iter()
            .any(|s| pos >= s.offset && pos < s.offset + s.len);
        if !inside {
            out.push(ch);
        }
        pos += width;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use hush_core::types::ReplyRef;

    fn bot() -> BotIdentity {
        BotIdentity {
            id: 999,
            username: "hushbot".to_string(),
        }
    }

    fn peer(id: i64, name: &str) -> Peer {
        Peer {
            id,
            name: name.to_string(),
            is_bot: false,
        }
    }

    fn group_msg(text: &str) -> InboundMessage {
        InboundMessage {
            sender: peer(1, "Alice"),
            chat_id: -100,
            text: text.to_string(),
            reply: None,
            mentions: Vec::new(),
        }
    }

    fn reply_to(msg: InboundMessage, author: Option<Peer>) -> InboundMessage {
        InboundMessage {
            reply: Some(ReplyRef {
                message_id: 42,
                author,
            }),
            ..msg
        }
    }

    #[test]
    fn keyword_reply_opens_pending() {
        let msg = reply_to(group_msg("whisper"), Some(peer(2, "Bob")));
        match detect(&msg, &bot()) {
            TriggerOutcome::OpenPending { receiver, anchor } => {
                assert_eq!(receiver.id, 2);
                assert_eq!(anchor, 42);
            }
            other => panic!("expected OpenPending, got {other:?}"),
        }
    }

    #[test]
    fn keyword_is_case_insensitive_and_trimmed() {
        let msg = reply_to(group_msg("  Hush "), Some(peer(2, "Bob")));
        assert!(matches!(
            detect(&msg, &bot()),
            TriggerOutcome::OpenPending { .. }
        ));
    }

    #[test]
    fn keyword_without_reply_needs_correction() {
        assert_eq!(detect(&group_msg("psst"), &bot()), TriggerOutcome::NeedsReply);
    }

    #[test]
    fn non_keyword_chatter_is_ignored() {
        assert_eq!(detect(&group_msg("hello all"), &bot()), TriggerOutcome::Ignore);
        let msg = reply_to(group_msg("whisper please"), Some(peer(2, "Bob")));
        assert_eq!(detect(&msg, &bot()), TriggerOutcome::Ignore);
    }

    #[test]
    fn bot_target_is_rejected() {
        let mut target = peer(2, "OtherBot");
        target.is_bot = true;
        let msg = reply_to(group_msg("whisper"), Some(target));
        assert_eq!(detect(&msg, &bot()), TriggerOutcome::Ignore);

        let msg = reply_to(group_msg("whisper"), Some(peer(999, "Hush")));
        assert_eq!(detect(&msg, &bot()), TriggerOutcome::Ignore);
    }

    #[test]
    fn reply_without_author_is_ignored() {
        let msg = reply_to(group_msg("whisper"), None);
        assert_eq!(detect(&msg, &bot()), TriggerOutcome::Ignore);
    }

    fn inline_msg(text: &str, mentions: Vec<MentionSpan>) -> InboundMessage {
        InboundMessage {
            mentions,
            ..group_msg(text)
        }
    }

    fn span(offset: usize, len: usize, user: Option<Peer>, username: Option<&str>) -> MentionSpan {
        MentionSpan {
            offset,
            len,
            user,
            username: username.map(String::from),
        }
    }

    #[test]
    fn inline_form_extracts_residual_text() {
        // "@hushbot @bob meet me at 9"
        let msg = inline_msg(
            "@hushbot @bob meet me at 9",
            vec![
                span(0, 8, None, Some("hushbot")),
                span(9, 4, Some(peer(2, "Bob")), Some("bob")),
            ],
        );
        match detect(&msg, &bot()) {
            TriggerOutcome::OpenImmediate { receiver, text } => {
                assert_eq!(receiver.id, 2);
                assert_eq!(text, "meet me at 9");
            }
            other => panic!("expected OpenImmediate, got {other:?}"),
        }
    }

    #[test]
    fn inline_form_without_residual_text_is_ignored() {
        let msg = inline_msg(
            "@hushbot @bob",
            vec![
                span(0, 8, None, Some("hushbot")),
                span(9, 4, Some(peer(2, "Bob")), Some("bob")),
            ],
        );
        assert_eq!(detect(&msg, &bot()), TriggerOutcome::Ignore);
    }

    #[test]
    fn inline_form_with_unresolved_target_is_ignored() {
        let msg = inline_msg(
            "@hushbot @ghost boo",
            vec![
                span(0, 8, None, Some("hushbot")),
                span(9, 6, None, Some("ghost")),
            ],
        );
        assert_eq!(detect(&msg, &bot()), TriggerOutcome::Ignore);
    }

    #[test]
    fn inline_form_without_bot_mention_is_ignored() {
        let msg = inline_msg(
            "@bob hi there",
            vec![span(0, 4, Some(peer(2, "Bob")), Some("bob"))],
        );
        assert_eq!(detect(&msg, &bot()), TriggerOutcome::Ignore);
    }

    #[test]
    fn span_stripping_handles_utf16_offsets() {
        // "🙈 @hushbot @bob hi" — the emoji is 2 UTF-16 units, so the
        // bot mention starts at offset 3.
        let msg = inline_msg(
            "🙈 @hushbot @bob hi",
            vec![
                span(3, 8, None, Some("hushbot")),
                span(12, 4, Some(peer(2, "Bob")), Some("bob")),
            ],
        );
        match detect(&msg, &bot()) {
            TriggerOutcome::OpenImmediate { text, .. } => assert_eq!(text, "🙈   hi"),
            other => panic!("expected OpenImmediate, got {other:?}"),
        }
    }
}
