use async_trait::async_trait;
use huddle_client::{MemoryRelay, MessageRef, RelayChannel, RelayDelivery, RelayError};
use huddle_core::{RelayAddress, RelayMessage};
use tokio::sync::mpsc;

/// Relay that delivers every direct message twice, like a store that
/// re-fires "inserted" after a reconnect.
#[derive(Clone, Default)]
pub struct FlakyRelay {
    inner: MemoryRelay,
}

impl FlakyRelay {
    pub fn new(inner: MemoryRelay) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl RelayChannel for FlakyRelay {
    async fn publish(
        &self,
        address: &RelayAddress,
        message: RelayMessage,
    ) -> Result<MessageRef, RelayError> {
        self.inner.publish(address, message).await
    }

    async fn subscribe(
        &self,
        address: &RelayAddress,
    ) -> Result<mpsc::UnboundedReceiver<RelayDelivery>, RelayError> {
        let mut source = self.inner.subscribe(address).await?;
        if address.is_broadcast() {
            return Ok(source);
        }

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            while let Some(delivery) = source.recv().await {
                if tx.send(delivery.clone()).is_err() || tx.send(delivery).is_err() {
                    break;
                }
            }
        });
        Ok(rx)
    }

    async fn remove(
        &self,
        address: &RelayAddress,
        message_ref: &MessageRef,
    ) -> Result<bool, RelayError> {
        self.inner.remove(address, message_ref).await
    }
}
