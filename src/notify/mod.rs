//! Change notifications: HTML rendering and per-subscriber delivery.

mod dispatch;
mod render;

pub use dispatch::{DeliveryReport, Notifier};
pub use render::{LinkBuilder, MAX_MESSAGE_CHARS, escape, linked, linked_list, render};
