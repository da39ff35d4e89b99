use anyhow::Result;
use dotenvy::dotenv;
use std::sync::Arc;
use teloxide::prelude::*;

use kopilka::cli::{Cli, Commands};
use kopilka::core::{init_logger, Config};
use kopilka::storage::create_pool;
use kopilka::telegram::{
    create_bot, run_webapp_server, schema, setup_bot_commands, HandlerDeps, WebAppState,
};

/// Main entry point for the bot and the Mini App server.
///
/// # Errors
/// Returns an error if initialization fails (configuration, logging,
/// database, bot creation).
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    // Load environment variables from .env if present
    let _ = dotenv();

    let config = Config::from_env()?;
    init_logger(&config.log_file_path)?;

    // Catch panics from spawned tasks so they end up in the log instead of
    // dying silently on stderr.
    std::panic::set_hook(Box::new(|panic_info| {
        log::error!("Panic caught: {:?}", panic_info);
        if let Some(location) = panic_info.location() {
            log::error!(
                "Panic at {}:{}:{}",
                location.file(),
                location.line(),
                location.column()
            );
        }
    }));

    match cli.command {
        Some(Commands::Run { port }) => run_bot(config, port).await,
        Some(Commands::Migrate) => {
            // create_pool runs pending migrations as a side effect.
            create_pool(&config.database_path)?;
            log::info!("Migrations applied to {}", config.database_path);
            Ok(())
        }
        None => run_bot(config, None).await,
    }
}

/// Run the Telegram bot and the Mini App web server until shutdown.
async fn run_bot(mut config: Config, port_override: Option<u16>) -> Result<()> {
    if let Some(port) = port_override {
        config.webapp_port = port;
    }
    let config = Arc::new(config);

    log::info!("Starting bot...");

    let db_pool = Arc::new(
        create_pool(&config.database_path)
            .map_err(|e| anyhow::anyhow!("Failed to create database pool: {}", e))?,
    );

    let bot = create_bot(&config);

    if let Err(e) = setup_bot_commands(&bot).await {
        log::warn!("Failed to set bot commands: {}. Continuing anyway.", e);
    }

    // Mini App server runs alongside the dispatcher.
    {
        let state = WebAppState {
            db_pool: Arc::clone(&db_pool),
            bot: bot.clone(),
            config: Arc::clone(&config),
        };
        let port = config.webapp_port;
        tokio::spawn(async move {
            if let Err(e) = run_webapp_server(port, state).await {
                log::error!("Mini App web server error: {}", e);
            }
        });
    }

    let deps = HandlerDeps {
        db_pool: Arc::clone(&db_pool),
        config: Arc::clone(&config),
    };

    log::info!("Starting bot in long polling mode");
    log::info!("📡 Ready to receive updates!");

    Dispatcher::builder(bot, schema())
        .dependencies(dptree::deps![deps])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    log::info!("Dispatcher shutdown gracefully");
    Ok(())
}
