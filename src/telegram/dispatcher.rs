//! Long-polling update loop that answers private messages.

use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::types::{BotCommand as MenuCommand, ParseMode};
use tracing::{debug, info, warn};

use super::no_preview;
use crate::commands::{BotCommand, CommandHandler};

/// Publishes the command menu shown by Telegram clients.
///
/// # Errors
///
/// Returns the Bot API error if the menu cannot be set.
pub async fn register_commands(bot: &Bot) -> ResponseResult<()> {
    let commands: Vec<MenuCommand> = BotCommand::all_commands()
        .into_iter()
        .map(|(command, _, description)| MenuCommand::new(command, description))
        .collect();

    bot.set_my_commands(commands).await?;
    debug!("Command menu registered");
    Ok(())
}

/// Receives updates until Ctrl+C and answers every private text message.
pub async fn run_dispatcher(bot: Bot, handler: Arc<CommandHandler>) {
    if let Err(e) = register_commands(&bot).await {
        warn!("Failed to register the command menu: {}", e);
    }

    info!("Listening for messages...");

    let schema = Update::filter_message().endpoint(on_message);
    Dispatcher::builder(bot, schema)
        .dependencies(dptree::deps![handler])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    info!("Update dispatcher stopped");
}

async fn on_message(bot: Bot, msg: Message, handler: Arc<CommandHandler>) -> ResponseResult<()> {
    if !msg.chat.is_private() {
        return Ok(());
    }
    let Some(text) = msg.text() else {
        return Ok(());
    };

    let Some(result) = handler.try_handle(msg.chat.id.0, text).await else {
        debug!("Ignoring message from {}", msg.chat.id);
        return Ok(());
    };

    bot.send_message(msg.chat.id, result.message)
        .parse_mode(ParseMode::Html)
        .link_preview_options(no_preview())
        .await?;
    Ok(())
}
