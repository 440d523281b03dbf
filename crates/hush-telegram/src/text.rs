//! User-facing strings and inline keyboards, collected in one place.

use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

/// Callback payload of the "I joined" button.
pub const CHECKSUB_CALLBACK: &str = "checksub";

pub const NEEDS_REPLY: &str =
    "To send a whisper, reply to the target's message with one of: whisper / hush / psst.";

pub const NO_PENDING: &str = "You have no open whisper request. \
Reply to the target's message in the group with one of: whisper / hush / psst.";

pub const TEXT_ONLY: &str = "Whispers are text-only. Send plain text, no attachments.";

pub const SENT: &str = "Whisper sent ✅";

pub const SEND_FAILED: &str = "Could not deliver the whisper. Please try again.";

pub const GENERIC_ERROR: &str = "Something went wrong. Please try again.";

pub const REVEAL_DENIED: &str = "This message can only be viewed by its sender and receiver.";

pub const REVEAL_NOT_FOUND: &str = "Message not found.";

pub const JOIN_TO_REVEAL: &str =
    "You need to join the channel to view whispers. Check your private chat.";

pub const MEMBERSHIP_CONFIRMED: &str = "Membership confirmed ✅";

pub const MEMBERSHIP_MISSING: &str = "Not a member yet. Join the channel and try again.";

pub const BROADCAST_PROMPT: &str = "Send the banner (text/photo/video/file); \
it will be forwarded to every known user and group.";

pub const BROADCAST_RUNNING: &str = "Broadcasting (forward)…";

pub fn intro(ttl_mins: u64) -> String {
    format!(
        "Welcome to Hush!\n\n\
         In a group, reply to your target's message with one of \
         whisper / hush / psst, then send me the whisper text here in \
         private. Only the sender and the receiver can read it. \
         Submission window: {ttl_mins} minutes."
    )
}

pub fn join_prompt(channel: &str) -> String {
    format!(
        "Hi! 👋\n\nTo use the bot, first join the public channel:\n\
         👉 @{channel}\n\nthen press \"I joined ✅\"."
    )
}

pub fn join_nudge(channel: &str) -> String {
    format!("To use the bot, join @{channel} first, then press \"I joined ✅\".")
}

pub fn guide(bot_username: &str, ttl_mins: u64) -> String {
    format!(
        "Please send your whisper text to me in private: @{bot_username}\n\
         Time limit: {ttl_mins} minutes."
    )
}

pub fn window_confirm(receiver_mention: &str, group_title: &str, ttl_mins: u64) -> String {
    format!(
        "Whisper to {receiver_mention} in \"{group_title}\"\n\
         Send your text within the next {ttl_mins} minutes."
    )
}

pub fn full_text_delivery(escaped_text: &str) -> String {
    format!("Full whisper text:\n{escaped_text}")
}

pub fn stats(users: i64, groups: i64, whispers: i64) -> String {
    format!("👥 Users: {users}\n👥 Groups: {groups}\n✉️ Whispers: {whispers}")
}

pub fn broadcast_done(delivered: usize) -> String {
    format!("Broadcast finished. ({delivered} destinations)")
}

/// Keyboard shown before membership is confirmed.
pub fn join_keyboard(bot_username: &str) -> InlineKeyboardMarkup {
    let mut rows = vec![vec![InlineKeyboardButton::callback(
        "I joined ✅",
        CHECKSUB_CALLBACK,
    )]];
    if let Some(button) = add_to_group_button(bot_username) {
        rows.push(vec![button]);
    }
    InlineKeyboardMarkup::new(rows)
}

/// Keyboard shown once membership is confirmed: no "I joined" button.
pub fn post_join_keyboard(bot_username: &str) -> InlineKeyboardMarkup {
    let rows: Vec<Vec<InlineKeyboardButton>> = add_to_group_button(bot_username)
        .map(|b| vec![vec![b]])
        .unwrap_or_default();
    InlineKeyboardMarkup::new(rows)
}

fn add_to_group_button(bot_username: &str) -> Option<InlineKeyboardButton> {
    if bot_username.is_empty() {
        return None;
    }
    let url = reqwest::Url::parse(&format!("https://t.me/{bot_username}?startgroup=true")).ok()?;
    Some(InlineKeyboardButton::url("Add me to a group ➕", url))
}
