use std::sync::Arc;

use teloxide::{dispatching::Dispatcher as UpdateDispatcher, dptree, prelude::*};
use tracing::info;

use modbot_core::{
    background::Background,
    config::Config,
    dispatcher::Dispatcher,
    evidence::ChannelEvidence,
    exchange::ExchangeClient,
    ports::{Collaborators, Persistence, Transport},
    registry::StoreRegistry,
    report::ChannelReporter,
    store::{ConfigStore, DedupGuards},
};

use crate::handlers;
use crate::{TelegramPrivilege, TelegramTransport};

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
}

/// Wire every collaborator around one bot and build the command dispatcher.
pub fn build_dispatcher(
    bot: Bot,
    cfg: Arc<Config>,
    store: Arc<ConfigStore>,
    persistence: Arc<dyn Persistence>,
    background: Background,
) -> Dispatcher {
    let transport: Arc<dyn Transport> = Arc::new(TelegramTransport::new(bot.clone()));
    let exchange = Arc::new(ExchangeClient::new(
        transport.clone(),
        cfg.exchange_channel_id,
        cfg.sender.clone(),
        cfg.project_name.clone(),
        cfg.project_link.clone(),
    ));

    let collab = Collaborators {
        transport: transport.clone(),
        privilege: Arc::new(TelegramPrivilege::new(bot)),
        registry: Arc::new(StoreRegistry::new(store.clone(), persistence.clone())),
        persistence,
        evidence: Arc::new(ChannelEvidence::new(
            transport.clone(),
            cfg.logging_channel_id,
            cfg.project_name.clone(),
        )),
        escalation: exchange.clone(),
        sessions: exchange,
        reporter: Arc::new(ChannelReporter::new(
            transport,
            background.clone(),
            cfg.debug_channel_id,
            cfg.project_name.clone(),
        )),
    };

    Dispatcher::new(
        cfg,
        store,
        Arc::new(DedupGuards::new()),
        collab,
        background,
    )
}

pub async fn run_polling(
    cfg: Arc<Config>,
    store: Arc<ConfigStore>,
    persistence: Arc<dyn Persistence>,
) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.bot_token.clone());

    if let Ok(me) = bot.get_me().await {
        info!(username = %me.username(), "bot started");
    }
    info!(
        sender = %cfg.sender,
        version = %cfg.version,
        prefixes = ?cfg.prefixes,
        "dispatcher ready"
    );

    let background = Background::new();
    let dispatcher = Arc::new(build_dispatcher(
        bot.clone(),
        cfg,
        store,
        persistence,
        background.clone(),
    ));
    let state = Arc::new(AppState { dispatcher });

    let handler =
        dptree::entry().branch(Update::filter_message().endpoint(handlers::handle_message));

    // No per-chat ordering: duplicate and overlapping commands are handled
    // concurrently and deduplicated by the core guards.
    UpdateDispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .distribution_function(|_| None::<std::convert::Infallible>)
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    info!(pending = background.pending(), "draining background tasks");
    background.idle().await;
    Ok(())
}
