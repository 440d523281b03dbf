//! Callback-query handler: reveal buttons and the membership re-check.

use std::sync::Arc;

use teloxide::prelude::*;
use tracing::warn;

use hush_core::types::BotIdentity;
use hush_whisper::{Disclosure, WhisperError, WhisperService};

use crate::handler::nudge_join;
use crate::text;

pub async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    service: Arc<WhisperService>,
    me: BotIdentity,
) -> ResponseResult<()> {
    let Some(data) = q.data.clone() else {
        return Ok(());
    };
    let user_id = q.from.id.0 as i64;

    if data == text::CHECKSUB_CALLBACK {
        checksub_flow(&bot, &q, &service, &me, user_id).await;
        return Ok(());
    }

    if data.starts_with("show:") {
        reveal_flow(&bot, &q, &service, &me, user_id, &data).await;
    }
    Ok(())
}

async fn checksub_flow(
    bot: &Bot,
    q: &CallbackQuery,
    service: &WhisperService,
    me: &BotIdentity,
    user_id: i64,
) {
    if service.eligible(user_id).await {
        answer(bot, &q.id, text::MEMBERSHIP_CONFIRMED, false).await;
        let ttl_mins = service.config().pending_ttl_secs / 60;
        if let Err(e) = bot
            .send_message(ChatId(user_id), text::intro(ttl_mins))
            .reply_markup(text::post_join_keyboard(&me.username))
            .await
        {
            warn!(error = %e, user_id, "intro after checksub failed");
        }
    } else {
        answer(bot, &q.id, text::MEMBERSHIP_MISSING, true).await;
    }
}

async fn reveal_flow(
    bot: &Bot,
    q: &CallbackQuery,
    service: &WhisperService,
    me: &BotIdentity,
    user_id: i64,
    token: &str,
) {
    // Even a reveal requires channel membership.
    if !service.eligible(user_id).await {
        answer(bot, &q.id, text::JOIN_TO_REVEAL, true).await;
        nudge_join(bot, user_id, service, me).await;
        return;
    }

    match service.reveal(user_id, token).await {
        Ok(Disclosure::Disclosed { text }) => answer(bot, &q.id, &text, true).await,
        Ok(Disclosure::Denied) => answer(bot, &q.id, text::REVEAL_DENIED, true).await,
        Ok(Disclosure::NotFound) => answer(bot, &q.id, text::REVEAL_NOT_FOUND, true).await,
        // A token we never issued; stay silent like any other malformed input.
        Err(WhisperError::BadToken) => {}
        Err(e) => {
            warn!(error = %e, user_id, "reveal failed");
            answer(bot, &q.id, text::GENERIC_ERROR, true).await;
        }
    }
}

async fn answer(bot: &Bot, query_id: &str, text: &str, alert: bool) {
    let result = bot
        .answer_callback_query(query_id.to_string())
        .text(text)
        .show_alert(alert)
        .await;
    if let Err(e) = result {
        warn!(error = %e, "callback answer failed");
    }
}
