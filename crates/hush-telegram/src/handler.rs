//! Message handlers registered in the teloxide Dispatcher.
//!
//! Group messages feed the directory cache and the trigger detector;
//! private messages carry onboarding, owner administration and whisper
//! submissions.

use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::types::{Message, MessageEntityKind, MessageId, ParseMode, ReplyParameters, User};
use tracing::warn;

use hush_core::types::{BotIdentity, InboundMessage, MentionSpan, Peer, ReplyRef};
use hush_store::types::DirectoryUser;
use hush_store::Store;
use hush_whisper::{
    detect, janitor, SubmittedContent, TriggerOutcome, WhisperError, WhisperService,
};

use crate::broadcast;
use crate::commands::{self, AdminCommand};
use crate::text;
use crate::transport::{mention_html, safe_delete, sanitize, TelegramTransport};

/// Main message handler. Routes group chatter to the trigger detector and
/// private messages to onboarding, administration or submission.
pub async fn handle_message(
    bot: Bot,
    msg: Message,
    service: Arc<WhisperService>,
    store: Arc<Store>,
    transport: Arc<TelegramTransport>,
    me: BotIdentity,
) -> ResponseResult<()> {
    if msg.chat.is_group() || msg.chat.is_supergroup() {
        handle_group_message(&bot, &msg, &service, &store, transport, &me).await;
    } else if msg.chat.is_private() {
        handle_private_message(&bot, &msg, &service, &store, &me).await;
    }
    Ok(())
}

async fn handle_group_message(
    bot: &Bot,
    msg: &Message,
    service: &WhisperService,
    store: &Store,
    transport: Arc<TelegramTransport>,
    me: &BotIdentity,
) {
    // Directory upkeep happens for every observed group message.
    let kind = if msg.chat.is_supergroup() {
        "supergroup"
    } else {
        "group"
    };
    if let Err(e) = store.upsert_chat(msg.chat.id.0, msg.chat.title(), kind) {
        warn!(error = %e, "chat upsert failed");
    }
    let Some(from) = msg.from.as_ref() else {
        return;
    };
    if from.is_bot {
        return;
    }
    upsert_user(store, from);

    let inbound = narrow(msg, store);
    match detect(&inbound, me) {
        TriggerOutcome::OpenPending { receiver, anchor } => {
            open_pending_flow(bot, msg, service, store, transport, me, receiver, anchor).await;
        }
        TriggerOutcome::OpenImmediate { receiver, text } => {
            inline_flow(bot, msg, service, me, receiver, &text).await;
        }
        TriggerOutcome::NeedsReply => {
            // Deliberate correction, not a silent no-op.
            if let Err(e) = bot
                .send_message(msg.chat.id, text::NEEDS_REPLY)
                .reply_parameters(ReplyParameters::new(msg.id))
                .await
            {
                warn!(error = %e, "needs-reply notice failed");
            }
        }
        TriggerOutcome::Ignore => {}
    }
}

#[allow(clippy::too_many_arguments)]
async fn open_pending_flow(
    bot: &Bot,
    msg: &Message,
    service: &WhisperService,
    store: &Store,
    transport: Arc<TelegramTransport>,
    me: &BotIdentity,
    receiver: Peer,
    anchor: i64,
) {
    let sender = sender_id(msg);
    if !service.eligible(sender).await {
        safe_delete(bot, msg.chat.id, msg.id).await;
        nudge_join(bot, sender, service, me).await;
        return;
    }

    // The reply target enters the directory too.
    if let Some(target) = msg.reply_to_message().and_then(|r| r.from.as_ref()) {
        upsert_user(store, target);
    }

    if let Err(e) = service.open_pending(msg.chat.id.0, sender, receiver.id, Some(anchor)) {
        warn!(error = %e, sender, "pending upsert failed");
        return;
    }

    let ttl_mins = service.config().pending_ttl_secs / 60;
    match bot
        .send_message(msg.chat.id, text::guide(&me.username, ttl_mins))
        .reply_parameters(ReplyParameters::new(MessageId(anchor as i32)))
        .await
    {
        Ok(guide) => {
            if let Err(e) = service.attach_guide(sender, guide.id.0 as i64) {
                warn!(error = %e, "guide ref attach failed");
            }
            janitor::schedule_cleanup(
                transport,
                msg.chat.id.0,
                guide.id.0 as i64,
                std::time::Duration::from_secs(service.config().guide_delete_secs),
            );
        }
        Err(e) => warn!(error = %e, "guide message failed"),
    }

    // The trigger itself disappears from the group.
    safe_delete(bot, msg.chat.id, msg.id).await;

    let confirm = text::window_confirm(
        &mention_html(receiver.id, &receiver.name),
        &sanitize(msg.chat.title().unwrap_or("group")),
        ttl_mins,
    );
    if let Err(e) = bot
        .send_message(ChatId(sender), confirm)
        .parse_mode(ParseMode::Html)
        .await
    {
        warn!(error = %e, sender, "window confirmation failed");
    }
}

async fn inline_flow(
    bot: &Bot,
    msg: &Message,
    service: &WhisperService,
    me: &BotIdentity,
    receiver: Peer,
    whisper_text: &str,
) {
    let sender = sender_id(msg);
    if !service.eligible(sender).await {
        safe_delete(bot, msg.chat.id, msg.id).await;
        nudge_join(bot, sender, service, me).await;
        return;
    }

    match service
        .submit_direct(msg.chat.id.0, sender, receiver.id, whisper_text)
        .await
    {
        Ok(_) => {
            // The inline trigger contains the whisper text; remove it.
            safe_delete(bot, msg.chat.id, msg.id).await;
        }
        Err(e) => warn!(error = %e, sender, "inline whisper failed"),
    }
}

async fn handle_private_message(
    bot: &Bot,
    msg: &Message,
    service: &WhisperService,
    store: &Store,
    me: &BotIdentity,
) {
    let Some(from) = msg.from.as_ref() else {
        return;
    };
    if from.is_bot {
        return;
    }
    upsert_user(store, from);

    let sender = sender_id(msg);
    let owner = service.config().owner_id;

    if let Some(t) = msg.text() {
        let trimmed = t.trim();
        if trimmed == "/start" || trimmed.starts_with("/start ") {
            start_flow(bot, msg, service, me).await;
            return;
        }
        if sender == owner {
            if let Some(command) = commands::parse(trimmed) {
                admin_flow(bot, msg, service, store, command).await;
                return;
            }
        }
        if trimmed.starts_with('/') {
            return;
        }
    }

    // An armed broadcast claims the owner's next message, whatever it is.
    if sender == owner {
        match store.take_operator_action(owner) {
            Ok(Some(action)) if action == "broadcast" => {
                send_plain(bot, msg.chat.id, text::BROADCAST_RUNNING).await;
                let delivered = broadcast::run(bot, store, msg.chat.id, msg.id).await;
                send_plain(bot, msg.chat.id, &text::broadcast_done(delivered)).await;
                return;
            }
            Ok(Some(other)) => warn!(action = %other, "unknown operator action dropped"),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "operator session lookup failed"),
        }
    }

    let content = match msg.text() {
        Some(t) => SubmittedContent::Text(t.to_string()),
        None => SubmittedContent::Other,
    };
    match service.submit(sender, &content).await {
        Ok(_) => send_plain(bot, msg.chat.id, text::SENT).await,
        Err(WhisperError::NotEligible) => {
            let channel = service.config().required_channel.clone();
            if let Err(e) = bot
                .send_message(msg.chat.id, text::join_prompt(&channel))
                .reply_markup(text::join_keyboard(&me.username))
                .await
            {
                warn!(error = %e, "join prompt failed");
            }
        }
        Err(WhisperError::NotTextOnly) => send_plain(bot, msg.chat.id, text::TEXT_ONLY).await,
        Err(WhisperError::NoPendingRequest) => send_plain(bot, msg.chat.id, text::NO_PENDING).await,
        Err(WhisperError::Notify(e)) => {
            warn!(error = %e, sender, "notification publish failed");
            send_plain(bot, msg.chat.id, text::SEND_FAILED).await;
        }
        Err(e) => {
            warn!(error = %e, sender, "whisper submission failed");
            send_plain(bot, msg.chat.id, text::GENERIC_ERROR).await;
        }
    }
}

async fn start_flow(bot: &Bot, msg: &Message, service: &WhisperService, me: &BotIdentity) {
    let sender = sender_id(msg);
    if service.eligible(sender).await {
        let ttl_mins = service.config().pending_ttl_secs / 60;
        if let Err(e) = bot
            .send_message(msg.chat.id, text::intro(ttl_mins))
            .reply_markup(text::post_join_keyboard(&me.username))
            .await
        {
            warn!(error = %e, "intro message failed");
        }
    } else {
        let channel = service.config().required_channel.clone();
        if let Err(e) = bot
            .send_message(msg.chat.id, text::join_prompt(&channel))
            .reply_markup(text::join_keyboard(&me.username))
            .await
        {
            warn!(error = %e, "join prompt failed");
        }
    }
}

async fn admin_flow(
    bot: &Bot,
    msg: &Message,
    service: &WhisperService,
    store: &Store,
    command: AdminCommand,
) {
    match command {
        AdminCommand::Stats => match service.stats() {
            Ok(s) => {
                send_plain(bot, msg.chat.id, &text::stats(s.users, s.groups, s.whispers)).await
            }
            Err(e) => {
                warn!(error = %e, "stats query failed");
                send_plain(bot, msg.chat.id, text::GENERIC_ERROR).await;
            }
        },
        AdminCommand::Broadcast => {
            match store.begin_operator_action(service.config().owner_id, "broadcast") {
                Ok(()) => send_plain(bot, msg.chat.id, text::BROADCAST_PROMPT).await,
                Err(e) => {
                    warn!(error = %e, "broadcast arming failed");
                    send_plain(bot, msg.chat.id, text::GENERIC_ERROR).await;
                }
            }
        }
        AdminCommand::ReportOpen {
            group_id,
            watcher_id,
        } => match service.open_report(group_id, watcher_id) {
            Ok(()) => {
                let reply = format!("Reports for group {group_id} opened for user {watcher_id}.");
                send_plain(bot, msg.chat.id, &reply).await;
            }
            Err(e) => {
                warn!(error = %e, "report open failed");
                send_plain(bot, msg.chat.id, text::GENERIC_ERROR).await;
            }
        },
        AdminCommand::ReportClose {
            group_id,
            watcher_id,
        } => match service.close_report(group_id, watcher_id) {
            Ok(existed) => {
                let reply = if existed {
                    format!("Reports for group {group_id} closed for user {watcher_id}.")
                } else {
                    format!("User {watcher_id} was not watching group {group_id}.")
                };
                send_plain(bot, msg.chat.id, &reply).await;
            }
            Err(e) => {
                warn!(error = %e, "report close failed");
                send_plain(bot, msg.chat.id, text::GENERIC_ERROR).await;
            }
        },
    }
}

/// Private nudge towards the required channel, sent when an ineligible
/// user triggers or reveals. Best effort: the user may have never opened
/// a private chat with the bot.
pub(crate) async fn nudge_join(
    bot: &Bot,
    user_id: i64,
    service: &WhisperService,
    me: &BotIdentity,
) {
    let channel = service.config().required_channel.clone();
    if channel.is_empty() {
        return;
    }
    if let Err(e) = bot
        .send_message(ChatId(user_id), text::join_nudge(&channel))
        .reply_markup(text::join_keyboard(&me.username))
        .await
    {
        warn!(error = %e, user_id, "join nudge failed");
    }
}

async fn send_plain(bot: &Bot, chat_id: ChatId, text: &str) {
    if let Err(e) = bot.send_message(chat_id, text).await {
        warn!(error = %e, chat = chat_id.0, "send failed");
    }
}

fn sender_id(msg: &Message) -> i64 {
    msg.from.as_ref().map(|u| u.id.0 as i64).unwrap_or(0)
}

fn peer_from_user(user: &User) -> Peer {
    Peer {
        id: user.id.0 as i64,
        name: user.first_name.clone(),
        is_bot: user.is_bot,
    }
}

fn upsert_user(store: &Store, user: &User) {
    let entry = DirectoryUser {
        user_id: user.id.0 as i64,
        username: user.username.clone(),
        first_name: Some(user.first_name.clone()),
        is_bot: user.is_bot,
    };
    if let Err(e) = store.upsert_user(&entry) {
        warn!(error = %e, user = entry.user_id, "user upsert failed");
    }
}

/// Reduce a Telegram message to the narrow inbound shape the core sees.
fn narrow(msg: &Message, store: &Store) -> InboundMessage {
    let text = msg.text().or(msg.caption()).unwrap_or("").to_string();
    let reply = msg.reply_to_message().map(|r| ReplyRef {
        message_id: r.id.0 as i64,
        author: r.from.as_ref().map(peer_from_user),
    });
    InboundMessage {
        sender: msg
            .from
            .as_ref()
            .map(peer_from_user)
            .unwrap_or(Peer {
                id: 0,
                name: String::new(),
                is_bot: false,
            }),
        chat_id: msg.chat.id.0,
        text: text.clone(),
        reply,
        mentions: collect_mentions(msg, &text, store),
    }
}

/// Extract mention spans. Rich `text_mention` entities carry the user and
/// also feed the directory; plain `@username` mentions are resolved through
/// the directory where possible.
fn collect_mentions(msg: &Message, text: &str, store: &Store) -> Vec<MentionSpan> {
    let entities = msg
        .entities()
        .or_else(|| msg.caption_entities())
        .unwrap_or(&[]);
    let mut spans = Vec::new();
    for entity in entities {
        match &entity.kind {
            MessageEntityKind::TextMention { user } => {
                upsert_user(store, user);
                spans.push(MentionSpan {
                    offset: entity.offset,
                    len: entity.length,
                    user: Some(peer_from_user(user)),
                    username: user.username.clone(),
                });
            }
            MessageEntityKind::Mention => {
                let raw = utf16_slice(text, entity.offset, entity.length);
                let username = raw.trim_start_matches('@').to_string();
                let user = store
                    .user_by_username(&username)
                    .ok()
                    .flatten()
                    .map(|u| Peer {
                        id: u.user_id,
                        name: u
                            .first_name
                            .or(u.username)
                            .unwrap_or_else(|| "user".to_string()),
                        is_bot: u.is_bot,
                    });
                spans.push(MentionSpan {
                    offset: entity.offset,
                    len: entity.length,
                    user,
                    username: Some(username),
                });
            }
            _ => {}
        }
    }
    spans
}

/// Slice by UTF-16 code unit offsets, as used by Telegram entities.
fn utf16_slice(text: &str, offset: usize, len: usize) -> String {
    let mut out = String::new();
    let mut pos = 0usize;
    for ch in text.chars() {
        if pos >= offset + len {
            break;
        }
        if pos >= offset {
            out.push(ch);
        }
        pos += ch.len_utf16();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf16_slice_ascii() {
        assert_eq!(utf16_slice("hello @bob!", 6, 4), "@bob");
    }

    #[test]
    fn utf16_slice_after_surrogate_pair() {
        // "🙈" occupies two UTF-16 units, so "@bob" starts at offset 3.
        assert_eq!(utf16_slice("🙈 @bob hi", 3, 4), "@bob");
    }

    #[test]
    fn utf16_slice_out_of_range_is_empty() {
        assert_eq!(utf16_slice("short", 10, 4), "");
    }
}
