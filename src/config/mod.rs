//! Configuration module for the timetable bot.
//!
//! Settings come from environment variables, optionally loaded from a
//! `.env` file by the binary before [`Settings::from_env`] runs.

mod settings;

pub use settings::{ConfigError, QueueConfig, Settings, StoreConfig, TelegramConfig};
