use std::{collections::HashMap, process, sync::Arc};

use admin::AdminAuth;
use config::Config;
use db::get_db_pool;
use handlers::{handle_callback_query, handle_command, handle_message, AppState, Command};
use store::PgStore;
use tokio::sync::Mutex;
mod admin;
mod availability;
mod booking;
mod booking_id;
mod calendar;
mod clock;
mod config;
mod db;
mod error;
mod handlers;
mod models;
mod notify;
mod pricing;
mod store;
use teloxide::{
    dispatching::{HandlerExt, UpdateFilterExt},
    prelude::*,
    types::CallbackQuery,
};

extern crate pretty_env_logger;
#[macro_use] extern crate log;

#[tokio::main]
async fn main() {
    pretty_env_logger::init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Configuration error: {}", e);
            process::exit(1);
        }
    };
    let pool = match get_db_pool(&config).await {
        Ok(pool) => pool,
        Err(e) => {
            error!("Failed to connect to DB: {}", e);
            process::exit(1);
        }
    };

    let state = Arc::new(AppState {
        store: Arc::new(PgStore::new(pool)),
        auth: AdminAuth::new(config.admin_password.clone(), config.admin_session_ttl),
        messaging_base_url: config.messaging_base_url.clone(),
        sessions: Mutex::new(HashMap::new()),
    });
    let bot = Bot::from_env();

    let handler = dptree::entry()
        .branch(Update::filter_message().filter_command::<Command>().endpoint({
            let state = state.clone();

            move |bot: Bot, msg: Message, cmd: Command| {
                let state = state.clone();

                async move {
                    if let Err(e) = handle_command(bot, msg, cmd, state).await {
                        error!("Command handler failed: {}", e);
                    }
                    respond(())
                }
            }
        }))
        .branch(Update::filter_message().endpoint({
            let state = state.clone();

            move |bot: Bot, msg: Message| {
                let state = state.clone();

                async move {
                    if let Err(e) = handle_message(bot, msg, state).await {
                        error!("Message handler failed: {}", e);
                    }
                    respond(())
                }
            }
        }))
        .branch(Update::filter_callback_query().endpoint({
            let state = state.clone();

            move |q: CallbackQuery, bot: Bot| {
                let state = state.clone();

                async move {
                    if let Err(e) = handle_callback_query(bot, q, state).await {
                        error!("Callback handler failed: {}", e);
                    }
                    respond(())
                }
            }
        }));

    info!("Starting studio booking bot");
    Dispatcher::builder(bot, handler)
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}
