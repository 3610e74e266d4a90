//! Delivery of posts to the destination chat.

pub mod format;
pub mod telegram;

use async_trait::async_trait;
use thiserror::Error;

use crate::source::Post;

pub use telegram::TelegramSink;

/// A post that could not be delivered.
///
/// One error covers one post; the batch continues past it.
#[derive(Debug, Error)]
#[error("failed to deliver post {post_id}: {message}")]
pub struct DeliveryError {
    pub post_id: String,
    pub message: String,
}

impl DeliveryError {
    pub fn new(post_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            post_id: post_id.into(),
            message: message.into(),
        }
    }
}

/// Capability interface to the destination channel.
#[async_trait]
pub trait DeliverySink: Send + Sync {
    /// Deliver one post. Implementations must be isolated per call: nothing
    /// about one post's failure may affect the next call.
    async fn deliver(&self, post: &Post) -> Result<(), DeliveryError>;
}
