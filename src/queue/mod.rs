//! Change queue: wire codec, delivery handling and the AMQP client.

mod client;
pub mod codec;
mod disposition;

pub use client::{ChangeQueue, DEFAULT_QUEUE_NAME, QueueError};
pub use codec::CodecError;
pub use disposition::{ChangeHandler, Disposition, dispose};
