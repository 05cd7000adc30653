//! Publishes timetable change events from a JSON file to the change queue.
//!
//! The file holds a JSON array of events in the queue's tagged wire format.
//! Every event is decoded before anything is sent, so a bad file publishes
//! nothing.

use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::Parser;
use serde_json::Value;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use timetable_bot::model::TimetableChangeData;
use timetable_bot::queue::{ChangeQueue, DEFAULT_QUEUE_NAME, codec};

/// Change event publisher.
#[derive(Parser, Debug)]
#[command(name = "publish_changes")]
#[command(about = "Publishes timetable change events to RabbitMQ")]
#[command(version)]
struct Args {
    /// Path to a JSON array of change events.
    #[arg(short, long)]
    file: String,

    /// Path to the .env file for environment variables.
    #[arg(long, default_value = ".env")]
    env_file: String,

    /// AMQP URI, defaults to `RABBITMQ_URI`.
    #[arg(long)]
    uri: Option<String>,

    /// Queue name, defaults to `QUEUE_NAME` or the bot's default queue.
    #[arg(short, long)]
    queue: Option<String>,

    /// Decode the file without publishing.
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    if let Err(e) = dotenvy::from_filename(&args.env_file) {
        debug!("Could not load .env file ({}): {}", args.env_file, e);
    }

    match run(&args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: &Args) -> Result<()> {
    let raw = tokio::fs::read_to_string(&args.file)
        .await
        .with_context(|| format!("Failed to read {}", args.file))?;
    let events = parse_events(&raw)?;

    info!("Loaded {} change event(s) from {}", events.len(), args.file);
    for event in &events {
        debug!(
            "'{}': {} lesson change(s)",
            event.entity.name,
            event.lesson_changes().len()
        );
    }

    if args.dry_run {
        info!("Dry run, nothing published");
        return Ok(());
    }

    let uri = match &args.uri {
        Some(uri) => uri.clone(),
        None => std::env::var("RABBITMQ_URI")
            .context("RABBITMQ_URI is not set and --uri was not given")?,
    };
    let queue_name = args
        .queue
        .clone()
        .or_else(|| std::env::var("QUEUE_NAME").ok())
        .unwrap_or_else(|| DEFAULT_QUEUE_NAME.to_owned());

    let queue = ChangeQueue::new(uri, queue_name);
    let result = queue.publish(&events).await;
    queue.close().await;

    result.context("Failed to publish changes")
}

/// Decodes every element of a JSON array of wire-format events.
fn parse_events(raw: &str) -> Result<Vec<TimetableChangeData>> {
    let value: Value = serde_json::from_str(raw).context("File is not valid JSON")?;
    let Value::Array(items) = value else {
        bail!("Expected a JSON array of change events");
    };

    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            codec::decode_value(item).with_context(|| format!("Event #{} is invalid", index + 1))
        })
        .collect()
}
