mod commands;
mod config;
mod distributor;
mod error;
mod handlers;
mod messenger;
mod scheduler;
mod storages;
#[cfg(test)]
mod testing;

use std::{net::SocketAddr, sync::Arc};

use clap::Parser;
use config::Args;
use distributor::Distributor;
use handlers::{handle_photo_message, handle_text_message};
use messenger::{MessengerTrait, TelegramMessenger};
use storages::{PersistentBlobStorage, PersistentKvStorage, Storage, StorageTrait};
use teloxide::{prelude::*, update_listeners::webhooks, utils::command::BotCommands};

use crate::commands::Command;

#[tokio::main]
async fn main() {
    let args = Args::parse();

    pretty_env_logger::formatted_timed_builder()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();
    log::info!("Starting photocast bot...");

    let settings = match args.load_settings() {
        Ok(settings) => Arc::new(settings),
        Err(e) => {
            log::error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };
    log::info!("Configuration: {:?}", settings);

    let bot = Bot::new(settings.bot_token.clone());

    // Initialize storage based on CLI arguments
    let storage = if let Some(data_dir) = &settings.data_dir {
        log::info!("Using persistent storage in directory: {:?}", data_dir);
        Storage::new()
            .kv_storage(PersistentKvStorage::new(data_dir.join("state")))
            .blob_storage(PersistentBlobStorage::new(data_dir.join("blobs")))
    } else {
        log::info!("Using in-memory storage, state is lost on restart");
        Storage::new()
    };
    let storage: Arc<dyn StorageTrait> = Arc::new(storage);

    let registry = Arc::new(storage.clone().recipient_registry());
    let messenger: Arc<dyn MessengerTrait> =
        Arc::new(TelegramMessenger::new(bot.clone(), settings.admin_id.into()));
    let distributor = Arc::new(Distributor::new(
        registry.clone(),
        storage.clone().progress_storage(),
        storage.clone().as_blob_storage(),
        messenger,
        settings.distribution.clone(),
    ));

    scheduler::spawn_schedule(
        distributor.clone(),
        settings.first_post_delay,
        settings.post_interval,
    );

    if let Err(e) = bot.set_my_commands(Command::bot_commands()).await {
        log::warn!("Failed to register bot commands: {}", e);
    }

    let handler = dptree::entry().branch(
        Update::filter_message()
            .branch(dptree::filter(|msg: Message| msg.photo().is_some()).endpoint(handle_photo_message))
            .branch(dptree::filter(|msg: Message| msg.text().is_some()).endpoint(handle_text_message)),
    );

    let mut dispatcher = Dispatcher::builder(bot.clone(), handler)
        .dependencies(dptree::deps![storage, registry, distributor, settings.clone()])
        .enable_ctrlc_handler()
        .build();

    match &settings.webhook {
        Some(webhook) => {
            let addr = SocketAddr::from(([0, 0, 0, 0], webhook.port));
            let url = match webhook.url.parse() {
                Ok(url) => url,
                Err(e) => {
                    log::error!("Invalid webhook URL {}: {}", webhook.url, e);
                    std::process::exit(1);
                }
            };
            log::info!("Receiving updates by webhook {} on {}", webhook.url, addr);
            let listener = match webhooks::axum(bot, webhooks::Options::new(addr, url)).await {
                Ok(listener) => listener,
                Err(e) => {
                    log::error!("Failed to set up webhook: {}", e);
                    std::process::exit(1);
                }
            };
            dispatcher
                .dispatch_with_listener(
                    listener,
                    LoggingErrorHandler::with_custom_text("An error from the update listener"),
                )
                .await;
        }
        None => {
            log::info!("Receiving updates by long polling");
            dispatcher.dispatch().await;
        }
    }
}
