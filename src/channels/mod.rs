//! Channel abstraction for message I/O.
//!
//! A channel turns a transport into a stream of [`ChannelEvent`]s and renders
//! [`OutboundAction`]s back. Only the local CLI harness lives here; real
//! messaging transports plug in behind the same trait.

pub mod cli;

pub use cli::CliChannel;

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::error::ChannelError;
use crate::router::{InboundMessage, OperatorAvailability, OutboundAction};

/// Something a channel delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    Message(InboundMessage),
    SetAvailability(OperatorAvailability),
    ShowStats,
}

pub type MessageStream = Pin<Box<dyn Stream<Item = ChannelEvent> + Send>>;

#[async_trait]
pub trait Channel: Send + Sync {
    fn name(&self) -> &str;

    /// Begin receiving. The stream ends when the transport closes.
    async fn start(&self) -> Result<MessageStream, ChannelError>;

    /// Deliver the router's decision for `msg`.
    async fn respond(
        &self,
        msg: &InboundMessage,
        action: &OutboundAction,
    ) -> Result<(), ChannelError>;
}
