use async_trait::async_trait;
use dashmap::DashMap;
use huddle_core::{RelayAddress, RelayMessage};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::error::RelayError;
use crate::relay::{MessageRef, RelayChannel, RelayDelivery};

#[derive(Default)]
struct AddressLog {
    entries: Vec<(MessageRef, RelayMessage)>,
    subscribers: Vec<mpsc::UnboundedSender<RelayDelivery>>,
}

struct MemoryRelayInner {
    logs: DashMap<RelayAddress, AddressLog>,
    next_ref: AtomicU64,
    closed: AtomicBool,
}

/// In-process relay with the semantics of a realtime key/value store:
/// every address is a log, subscribers get existing entries replayed.
///
/// Cloning shares the same store, so every participant of a test or a
/// demo room holds its own handle.
#[derive(Clone)]
pub struct MemoryRelay {
    inner: Arc<MemoryRelayInner>,
}

impl MemoryRelay {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MemoryRelayInner {
                logs: DashMap::new(),
                next_ref: AtomicU64::new(0),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Messages currently stored at `address`, oldest first.
    pub fn messages(&self, address: &RelayAddress) -> Vec<RelayMessage> {
        self.inner
            .logs
            .get(address)
            .map(|log| log.entries.iter().map(|(_, m)| m.clone()).collect())
            .unwrap_or_default()
    }

    /// Drops every subscription; further operations fail with `Closed`.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        for mut log in self.inner.logs.iter_mut() {
            log.subscribers.clear();
        }
    }

    fn ensure_open(&self) -> Result<(), RelayError> {
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(RelayError::Closed);
        }
        Ok(())
    }
}

impl Default for MemoryRelay {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RelayChannel for MemoryRelay {
    async fn publish(
        &self,
        address: &RelayAddress,
        message: RelayMessage,
    ) -> Result<MessageRef, RelayError> {
        self.ensure_open()?;

        let seq = self.inner.next_ref.fetch_add(1, Ordering::SeqCst);
        let message_ref = MessageRef(format!("m{:08}", seq));

        // The shard lock is held while fanning out, which keeps delivery
        // order equal to publish order for this address.
        let mut log = self.inner.logs.entry(address.clone()).or_default();
        log.entries.push((message_ref.clone(), message.clone()));
        log.subscribers.retain(|tx| {
            tx.send(RelayDelivery {
                address: address.clone(),
                message_ref: message_ref.clone(),
                message: message.clone(),
            })
            .is_ok()
        });

        trace!("Published {} to {}", message_ref, address);
        Ok(message_ref)
    }

    async fn subscribe(
        &self,
        address: &RelayAddress,
    ) -> Result<mpsc::UnboundedReceiver<RelayDelivery>, RelayError> {
        self.ensure_open()?;

        let (tx, rx) = mpsc::unbounded_channel();
        let mut log = self.inner.logs.entry(address.clone()).or_default();

        for (message_ref, message) in &log.entries {
            let _ = tx.send(RelayDelivery {
                address: address.clone(),
                message_ref: message_ref.clone(),
                message: message.clone(),
            });
        }
        log.subscribers.push(tx);

        debug!(
            "Subscribed to {} ({} stored messages replayed)",
            address,
            log.entries.len()
        );
        Ok(rx)
    }

    async fn remove(
        &self,
        address: &RelayAddress,
        message_ref: &MessageRef,
    ) -> Result<bool, RelayError> {
        self.ensure_open()?;

        let Some(mut log) = self.inner.logs.get_mut(address) else {
            return Ok(false);
        };
        let Some(pos) = log.entries.iter().position(|(r, _)| r == message_ref) else {
            return Ok(false);
        };
        log.entries.remove(pos);
        Ok(true)
    }
}
