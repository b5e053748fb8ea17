use std::sync::Arc;

use teloxide::{dispatching::Dispatcher, dptree, prelude::*, types::BotCommand};
use tracing::{info, warn};

use meterbot_core::{
    commands::CommandRouter, config::Config, conversation::ConversationEngine,
    messaging::port::MessagingPort, rates::RatesSource,
};

use crate::handlers;
use crate::TelegramMessenger;

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub engine: Arc<ConversationEngine>,
    pub router: Arc<CommandRouter>,
    pub messenger: Arc<dyn MessagingPort>,
    pub rates: Arc<dyn RatesSource>,
}

pub async fn run_polling(
    cfg: Arc<Config>,
    engine: Arc<ConversationEngine>,
    rates: Arc<dyn RatesSource>,
) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.telegram_bot_token.clone());

    match bot.get_me().await {
        Ok(me) => info!(username = %me.username(), "meterbot started"),
        Err(e) => warn!(error = %e, "get_me failed"),
    }
    info!(allowed_users = cfg.allowed_users.len(), "allow-list loaded");

    let router = Arc::new(CommandRouter::default());
    register_commands(&bot, &router).await;

    let state = Arc::new(AppState {
        cfg,
        engine,
        router,
        messenger: Arc::new(TelegramMessenger::new(bot.clone())),
        rates,
    });

    let handler = dptree::entry().branch(Update::filter_message().endpoint(handlers::handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .build()
        .dispatch()
        .await;

    Ok(())
}

/// Publish the command menu. Failure only costs the menu, so it is logged.
async fn register_commands(bot: &Bot, router: &CommandRouter) {
    let commands: Vec<BotCommand> = router
        .commands()
        .iter()
        .map(|c| BotCommand::new(c.name, c.description))
        .collect();

    if let Err(e) = bot.set_my_commands(commands).await {
        warn!(error = %e, "set_my_commands failed");
    }
}
