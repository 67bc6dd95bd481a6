pub mod amqp;

use crate::config::AckMode;
use crate::core::error::Result;
use crate::core::message::Message;

use async_trait::async_trait;

/// A queue that hands out one message at a time.
#[async_trait]
pub trait MessageSource: Send {
    /// Fetches the next message from `queue` without waiting for one.
    /// Returns `Ok(None)` when the queue is currently empty.
    async fn fetch(&mut self, queue: &str, ack: AckMode) -> Result<Option<Message>>;

    /// Releases the broker session. Failures are logged, never returned.
    async fn close(&mut self);
}

pub use amqp::{AmqpConnectionConfig, AmqpSource};
