//! Telegram channel adapter.
//!
//! Wraps a teloxide `Bot` + `Dispatcher` and drives the long-polling event
//! loop until the process exits.

use std::sync::Arc;

use teloxide::prelude::*;
use tracing::{error, info};

use hush_core::types::BotIdentity;
use hush_store::Store;
use hush_whisper::WhisperService;

use crate::callback::handle_callback;
use crate::handler::handle_message;
use crate::transport::TelegramTransport;

/// Telegram channel adapter. Long polling — no public URL required.
pub struct TelegramAdapter {
    bot: Bot,
    service: Arc<WhisperService>,
    store: Arc<Store>,
    transport: Arc<TelegramTransport>,
}

impl TelegramAdapter {
    pub fn new(
        bot: Bot,
        service: Arc<WhisperService>,
        store: Arc<Store>,
        transport: Arc<TelegramTransport>,
    ) -> Self {
        Self {
            bot,
            service,
            store,
            transport,
        }
    }

    /// Connect to Telegram and drive the long-polling loop.
    ///
    /// Never returns — runs for the lifetime of the process.
    pub async fn run(self) {
        // The detector needs the bot's own identity to recognise mentions
        // and refuse the bot as a whisper target.
        let me = match self.bot.get_me().await {
            Ok(me) => BotIdentity {
                id: me.user.id.0 as i64,
                username: me.user.username.clone().unwrap_or_default(),
            },
            Err(e) => {
                error!(error = %e, "get_me failed; inline triggers will not resolve");
                BotIdentity {
                    id: 0,
                    username: String::new(),
                }
            }
        };

        info!(bot = %me.username, "Telegram: starting long-polling dispatcher");

        let handler = dptree::entry()
            .branch(Update::filter_message().endpoint(handle_message))
            .branch(Update::filter_callback_query().endpoint(handle_callback));

        Dispatcher::builder(self.bot.clone(), handler)
            .dependencies(dptree::deps![
                self.service,
                self.store,
                self.transport,
                me
            ])
            .default_handler(|_upd| async {})
            .build()
            .dispatch()
            .await;
    }
}
