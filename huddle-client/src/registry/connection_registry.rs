use huddle_core::ClientId;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

use crate::error::{EngineStep, NegotiationError};
use crate::media::LocalMediaSource;
use crate::negotiation::{NegotiationMachine, NegotiationPhase, NegotiationRole, PeerSnapshot};
use crate::transport::{EngineFactory, EngineTag, TransportEvent};

/// The one map from remote peer to its negotiation machine.
///
/// Owned by the session loop; nothing else keeps per-peer state.
pub struct ConnectionRegistry {
    /// Sender id stamped on outbound SDP messages.
    local_id: ClientId,

    /// At most one machine per remote peer.
    machines: HashMap<ClientId, NegotiationMachine>,

    /// Builds an engine for each new machine.
    factory: Arc<dyn EngineFactory>,

    /// Attached to every engine before it negotiates.
    source: LocalMediaSource,

    /// Cloned into each engine; the session loop holds the receiver.
    events_tx: mpsc::Sender<TransportEvent>,

    /// Last engine instance handed out. Never reused, so events from a
    /// replaced engine can be told apart.
    next_instance: u64,
}

impl ConnectionRegistry {
    pub fn new(
        local_id: ClientId,
        factory: Arc<dyn EngineFactory>,
        source: LocalMediaSource,
        events_tx: mpsc::Sender<TransportEvent>,
    ) -> Self {
        Self {
            local_id,
            machines: HashMap::new(),
            factory,
            source,
            events_tx,
            next_instance: 0,
        }
    }

    /// Existing machine for `peer_id` whatever its role, or a new one
    /// playing `role`.
    pub async fn get_or_create(
        &mut self,
        peer_id: &ClientId,
        role: NegotiationRole,
    ) -> Result<&mut NegotiationMachine, NegotiationError> {
        match self.machines.entry(peer_id.clone()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                self.next_instance += 1;
                let tag = EngineTag {
                    peer_id: peer_id.clone(),
                    instance: self.next_instance,
                };
                let machine = build_machine(
                    &self.local_id,
                    tag,
                    role,
                    self.factory.as_ref(),
                    &self.source,
                    &self.events_tx,
                )
                .await?;
                Ok(entry.insert(machine))
            }
        }
    }

    /// Machine for `peer_id`, if one was created.
    pub fn get(&mut self, peer_id: &ClientId) -> Option<&mut NegotiationMachine> {
        self.machines.get_mut(peer_id)
    }

    /// Machine the event's engine belongs to; `None` for engines that were
    /// replaced in the meantime.
    pub fn get_by_tag(&mut self, tag: &EngineTag) -> Option<&mut NegotiationMachine> {
        self.machines
            .get_mut(&tag.peer_id)
            .filter(|machine| machine.tag().instance == tag.instance)
    }

    /// Closes the current machine for `peer_id` and starts over with `role`.
    /// Only used to resolve two peers initiating at the same time.
    pub async fn replace(
        &mut self,
        peer_id: &ClientId,
        role: NegotiationRole,
    ) -> Result<&mut NegotiationMachine, NegotiationError> {
        if let Some(old) = self.machines.remove(peer_id) {
            info!("Replacing {:?} machine for {}", old.role(), peer_id);
            old.close().await;
        }
        self.get_or_create(peer_id, role).await
    }

    /// Current phase of the machine for `peer_id`.
    pub fn phase_of(&self, peer_id: &ClientId) -> Option<NegotiationPhase> {
        self.machines.get(peer_id).map(|m| m.phase())
    }

    /// Role the machine for `peer_id` plays.
    pub fn role_of(&self, peer_id: &ClientId) -> Option<NegotiationRole> {
        self.machines.get(peer_id).map(|m| m.role())
    }

    pub fn len(&self) -> usize {
        self.machines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.machines.is_empty()
    }

    /// Read-only view of every machine, ordered by peer id.
    pub fn snapshot(&self) -> Vec<PeerSnapshot> {
        let mut peers: Vec<_> = self.machines.values().map(|m| m.snapshot()).collect();
        peers.sort_by(|a, b| a.peer_id.cmp(&b.peer_id));
        peers
    }

    /// Closes every engine and empties the registry.
    pub async fn close_all(&mut self) {
        for (_, machine) in self.machines.drain() {
            machine.close().await;
        }
    }
}

async fn build_machine(
    local_id: &ClientId,
    tag: EngineTag,
    role: NegotiationRole,
    factory: &dyn EngineFactory,
    source: &LocalMediaSource,
    events_tx: &mpsc::Sender<TransportEvent>,
) -> Result<NegotiationMachine, NegotiationError> {
    let engine = factory
        .create(tag.clone(), events_tx.clone())
        .await
        .map_err(|e| NegotiationError::engine(EngineStep::Create, e))?;

    NegotiationMachine::new(local_id.clone(), tag, role, engine, source).await
}
