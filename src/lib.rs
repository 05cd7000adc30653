//! Timetable Bot Library
//!
//! A Telegram bot for university timetables.
//!
//! This crate provides the core functionality for:
//! - Resolving free-text queries to groups, professors and auditoriums
//! - Consuming timetable change events from RabbitMQ
//! - Rendering change notifications and delivering them to subscribers
//! - Answering search and subscription commands in private chats

pub mod commands;
pub mod config;
pub mod model;
pub mod notify;
pub mod queue;
pub mod search;
pub mod store;
pub mod telegram;
pub mod worker;
