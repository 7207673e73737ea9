//! Delivery channel clients
//!
//! Each client makes exactly one delivery attempt per [`SendJob`] and reports
//! the result as a [`SendError`] instead of raising. Clients are long-lived
//! and shared across executions.

mod error;
mod mailer;
mod messenger;
mod mime;
mod smtp;

pub use error::SendError;
pub use mailer::Mailer;
pub use messenger::{Messenger, normalize_phone};
pub use mime::Attachment;

use crate::dispatch::SendJob;
use crate::types::Channel;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One-shot delivery through a single channel
#[async_trait]
pub trait ChannelClient: Send + Sync {
    /// The channel this client delivers through
    fn channel(&self) -> Channel;

    /// Attempt delivery of one job; at most one external attempt, no retries
    async fn send(&self, job: &SendJob) -> Result<(), SendError>;
}

/// Outcome of a channel connectivity check
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionCheck {
    /// Whether the channel is usable
    pub success: bool,
    /// Human-readable detail
    pub message: String,
}
