//! Timetable Bot - Main Entry Point
//!
//! A Telegram bot that finds university timetables by name and notifies
//! subscribers when a timetable changes.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use timetable_bot::commands::CommandHandler;
use timetable_bot::config::Settings;
use timetable_bot::notify::Notifier;
use timetable_bot::queue::ChangeQueue;
use timetable_bot::store::{CachedStore, EntityStore, JsonEntityStore};
use timetable_bot::telegram::{Messenger, TelegramMessenger, run_dispatcher};
use timetable_bot::worker::{ChangeWorker, WorkerMessage};

/// Telegram bot for university timetables and change notifications.
#[derive(Parser, Debug)]
#[command(name = "timetable_bot")]
#[command(about = "Search timetables and get notified about changes")]
#[command(version)]
struct Args {
    /// Path to the .env file for environment variables.
    #[arg(long, default_value = ".env")]
    env_file: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Receive changes through a push consumer instead of polling.
    #[arg(long)]
    consume: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load environment variables
    let env_loaded = dotenvy::from_filename(&args.env_file);

    let settings = Settings::from_env().context("Failed to load settings from environment")?;

    let level = if settings.debug { "debug" } else { args.log_level.as_str() };
    init_logging(level);

    if let Err(e) = env_loaded {
        debug!("Could not load .env file ({}): {}", args.env_file, e);
    }

    // Entity store
    let json_store = JsonEntityStore::load(
        &settings.store.store_path,
        settings.store.subscriptions_path.clone(),
    )
    .await
    .with_context(|| {
        format!(
            "Failed to load timetables from {}",
            settings.store.store_path.display()
        )
    })?;
    let store: Arc<dyn EntityStore> =
        Arc::new(CachedStore::new(json_store).with_ttl(settings.store.cache_ttl));

    // Telegram
    let telegram = TelegramMessenger::connect(
        &settings.telegram.bot_token,
        settings.telegram.send_interval,
    )
    .await
    .context("Failed to connect to Telegram")?;
    let bot = telegram.bot();
    let messenger: Arc<dyn Messenger> = Arc::new(telegram);

    // Change queue
    let queue = Arc::new(ChangeQueue::new(
        settings.queue.uri.clone(),
        settings.queue.queue_name.clone(),
    ));
    if let Err(e) = queue.connect().await {
        warn!("Change queue unavailable at startup, will retry: {}", e);
    }

    let notifier = Arc::new(Notifier::new(Arc::clone(&store), Arc::clone(&messenger)));
    let command_handler = Arc::new(CommandHandler::new(Arc::clone(&store), messenger));

    info!("Starting timetable bot...");

    let (worker_tx, worker_handle) = if args.consume {
        queue
            .consume(notifier)
            .await
            .context("Failed to start the change consumer")?;
        (None, None)
    } else {
        let (tx, rx) = mpsc::channel::<WorkerMessage>(1);
        let worker = ChangeWorker::new(queue.clone(), notifier)
            .with_poll_interval(settings.queue.poll_interval);
        let handle = tokio::spawn(async move {
            worker.run(rx).await;
        });
        (Some(tx), Some(handle))
    };

    info!("Bot is running. Use Ctrl+C to stop.");
    run_dispatcher(bot, command_handler).await;

    info!("Shutting down...");
    if let Some(tx) = worker_tx {
        let _ = tx.send(WorkerMessage::Shutdown).await;
    }
    if let Some(handle) = worker_handle
        && let Err(e) = handle.await
    {
        warn!("Change worker ended abnormally: {}", e);
    }
    queue.close().await;

    info!("Goodbye!");
    Ok(())
}

/// Initializes the tracing subscriber. `RUST_LOG` overrides `level`.
fn init_logging(level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
