use std::sync::Arc;

use tracing::info;

use meterbot_cbr::CbrClient;
use meterbot_core::{
    config::Config, conversation::ConversationEngine, ports::ConversationStore,
    store::InMemoryStore,
};
use meterbot_redis::RedisStore;
use meterbot_sheets::SheetsClient;

#[tokio::main]
async fn main() -> Result<(), meterbot_core::Error> {
    meterbot_core::logging::init("meterbot")?;

    let cfg = Arc::new(Config::load()?);
    let ttl = (!cfg.conversation_ttl.is_zero()).then_some(cfg.conversation_ttl);

    let store: Arc<dyn ConversationStore> = match &cfg.redis_url {
        Some(url) => Arc::new(RedisStore::connect(url, ttl).await?),
        None => {
            info!("REDIS_URL not set, keeping conversations in memory");
            Arc::new(InMemoryStore::new(ttl))
        }
    };

    let sheets = SheetsClient::new(
        cfg.spreadsheet.clone(),
        &cfg.google_credentials.read()?,
        cfg.http_timeout,
    )?;
    let rates = CbrClient::new(cfg.currency_endpoint.clone(), cfg.http_timeout)?;

    let engine = Arc::new(ConversationEngine::new(store, Arc::new(sheets)));

    meterbot_telegram::router::run_polling(cfg, engine, Arc::new(rates))
        .await
        .map_err(|e| meterbot_core::Error::External(format!("telegram bot failed: {e}")))?;

    Ok(())
}
