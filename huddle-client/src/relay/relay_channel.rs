use async_trait::async_trait;
use huddle_core::{RelayAddress, RelayMessage};
use std::fmt;
use tokio::sync::mpsc;

use crate::error::RelayError;

/// Relay-assigned handle of one stored message, used to remove it.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct MessageRef(pub String);

impl fmt::Display for MessageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A message that was inserted at a subscribed address.
#[derive(Debug, Clone)]
pub struct RelayDelivery {
    pub address: RelayAddress,
    pub message_ref: MessageRef,
    pub message: RelayMessage,
}

/// Ordered, multi-subscriber message store the negotiation runs over.
///
/// Delivery is FIFO per address. A new subscription first receives every
/// message already stored at the address, then live inserts.
#[async_trait]
pub trait RelayChannel: Send + Sync {
    async fn publish(
        &self,
        address: &RelayAddress,
        message: RelayMessage,
    ) -> Result<MessageRef, RelayError>;

    async fn subscribe(
        &self,
        address: &RelayAddress,
    ) -> Result<mpsc::UnboundedReceiver<RelayDelivery>, RelayError>;

    /// Returns `false` when the message was already gone.
    async fn remove(
        &self,
        address: &RelayAddress,
        message_ref: &MessageRef,
    ) -> Result<bool, RelayError>;
}
