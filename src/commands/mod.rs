//! Command handling module.
//!
//! Turns private-chat messages into replies: plain text is a timetable
//! search, slash commands manage subscriptions.

mod handler;
mod types;

pub use handler::CommandHandler;
pub use types::{BotCommand, CommandResult};
