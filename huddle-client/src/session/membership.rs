use huddle_core::{ClientId, RelayMessage, RequestOfferMessage, RoomName};
use std::collections::{HashSet, VecDeque};
use tokio::sync::mpsc;
use tracing::info;

use crate::clock::Clock;
use crate::error::RelayError;
use crate::relay::{MessageRef, RelayChannel, RelayDelivery};

/// Who we are in the room and since when.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomJoinState {
    pub identity: ClientId,
    pub entered_at: u64,
}

impl RoomJoinState {
    /// Our own announcement and announcements older than our entry never
    /// start a connection.
    pub fn admits(&self, request: &RequestOfferMessage) -> bool {
        request.from != self.identity && request.timestamp >= self.entered_at
    }
}

pub struct Subscriptions {
    pub broadcast: mpsc::UnboundedReceiver<RelayDelivery>,
    pub direct: mpsc::UnboundedReceiver<RelayDelivery>,
}

/// Subscribes to the room's broadcast and our direct address, then
/// announces ourselves with a `RequestOffer`.
pub async fn enter_room(
    relay: &dyn RelayChannel,
    room: &RoomName,
    identity: &ClientId,
    clock: &dyn Clock,
) -> Result<(RoomJoinState, Subscriptions), RelayError> {
    let join = RoomJoinState {
        identity: identity.clone(),
        entered_at: clock.now_millis(),
    };

    let broadcast = relay.subscribe(&room.broadcast()).await?;
    let direct = relay.subscribe(&room.direct(identity)).await?;

    let request = RequestOfferMessage {
        from: identity.clone(),
        timestamp: clock.now_millis(),
    };
    relay
        .publish(&room.broadcast(), RelayMessage::from(request))
        .await?;

    info!("{} entered room {} at {}", identity, room, join.entered_at);
    Ok((join, Subscriptions { broadcast, direct }))
}

/// How many handled direct messages a session remembers.
pub const INBOX_MEMORY: usize = 1024;

/// Remembers which direct messages were already handled, so a
/// redelivery of a removed message does nothing.
///
/// Only the most recent `capacity` refs are kept. Redeliveries arrive
/// shortly after the original, and refs are never reused.
#[derive(Debug)]
pub struct DirectInbox {
    capacity: usize,
    consumed: HashSet<MessageRef>,
    order: VecDeque<MessageRef>,
}

impl DirectInbox {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            consumed: HashSet::new(),
            order: VecDeque::new(),
        }
    }

    pub fn is_consumed(&self, message_ref: &MessageRef) -> bool {
        self.consumed.contains(message_ref)
    }

    pub fn mark_consumed(&mut self, message_ref: MessageRef) {
        if !self.consumed.insert(message_ref.clone()) {
            return;
        }
        self.order.push_back(message_ref);

        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.consumed.remove(&oldest);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl Default for DirectInbox {
    fn default() -> Self {
        Self::with_capacity(INBOX_MEMORY)
    }
}
