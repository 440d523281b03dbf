use std::sync::Arc;

use anyhow::Context;
use teloxide::Bot;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "hush_bot=info,hush_telegram=info,hush_whisper=info,hush_store=info".into()
            }),
        )
        .init();

    // load config: explicit path > HUSH_CONFIG env > ~/.hush/hush.toml
    let config_path = std::env::var("HUSH_CONFIG").ok();
    let config = hush_core::HushConfig::load(config_path.as_deref())
        .context("config load failed (bot token and owner id are required)")?;

    // initialize SQLite database — single file for all subsystems
    let db_path = &config.database.path;
    ensure_parent_dir(db_path);
    info!(path = %db_path, "opening SQLite database");

    let db = rusqlite::Connection::open(db_path)?;
    db.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    hush_store::db::init_db(&db)?;
    info!("database migrations complete");

    let store = Arc::new(hush_store::Store::new(db));

    let bot = Bot::new(&config.telegram.bot_token);
    let transport = Arc::new(hush_telegram::TelegramTransport::new(bot.clone()));
    let gate = Arc::new(hush_telegram::ChannelGate::new(
        bot.clone(),
        &config.whisper.required_channel,
    ));
    let service = Arc::new(hush_whisper::WhisperService::new(
        Arc::clone(&store),
        transport.clone(),
        gate,
        config.whisper.clone(),
    ));

    hush_telegram::TelegramAdapter::new(bot, service, store, transport)
        .run()
        .await;
    Ok(())
}

fn ensure_parent_dir(path: &str) {
    if let Some(parent) = std::path::Path::new(path).parent() {
        let _ = std::fs::create_dir_all(parent);
    }
}
