use huddle_core::{ClientId, RelayMessage, SdpKind, SdpMessage};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::error::{EngineStep, NegotiationError, SessionError};
use crate::media::{LocalMediaSource, RemoteMediaSource};
use crate::negotiation::{NegotiationMachine, NegotiationPhase, NegotiationRole};
use crate::transport::{EngineFactory, EngineTag, TransportEvent};

// The offering side learns the peer's id only from the answer.
const UNNAMED_PEER: &str = "remote";

/// Negotiation with exactly one peer, where the offer and answer are
/// carried between the two sides by hand as single-line JSON.
pub struct ManualSession {
    local_id: ClientId,
    source: LocalMediaSource,
    factory: Arc<dyn EngineFactory>,
    machine: Option<NegotiationMachine>,
    events_tx: mpsc::Sender<TransportEvent>,
    events_rx: mpsc::Receiver<TransportEvent>,
}

impl ManualSession {
    pub fn new(local_id: ClientId, source: LocalMediaSource, factory: Arc<dyn EngineFactory>) -> Self {
        let (events_tx, events_rx) = mpsc::channel(64);
        Self {
            local_id,
            source,
            factory,
            machine: None,
            events_tx,
            events_rx,
        }
    }

    pub fn local_id(&self) -> &ClientId {
        &self.local_id
    }

    pub fn local_source(&self) -> &LocalMediaSource {
        &self.source
    }

    pub fn phase(&self) -> NegotiationPhase {
        self.machine
            .as_ref()
            .map_or(NegotiationPhase::Idle, |m| m.phase())
    }

    pub fn remote_source(&self) -> Option<&RemoteMediaSource> {
        self.machine.as_ref().and_then(|m| m.remote_source())
    }

    /// Returns the offer text once candidate gathering has finished.
    pub async fn create_offer(&mut self) -> Result<String, SessionError> {
        if self.machine.is_some() {
            return Err(SessionError::InvalidState("negotiation already started"));
        }

        let peer_id = ClientId::from(UNNAMED_PEER);
        let machine = self.create_machine(&peer_id, NegotiationRole::Initiator).await?;
        let ready = machine
            .start_offer()
            .await
            .map_err(|source| negotiation_error(&peer_id, source))?;

        let offer = match ready {
            Some(message) => message,
            None => self.wait_outbound().await?,
        };
        info!("Offer ready ({} bytes of SDP)", offer.sdp.len());
        encode(offer)
    }

    /// Applies a pasted offer and returns the answer text.
    pub async fn receive_offer(&mut self, text: &str) -> Result<String, SessionError> {
        if self.machine.is_some() {
            return Err(SessionError::InvalidState(
                "this session already started a negotiation",
            ));
        }

        let offer = decode(text, SdpKind::Offer)?;
        let peer_id = offer.from.clone();
        let machine = self.create_machine(&peer_id, NegotiationRole::Responder).await?;
        let ready = machine
            .accept_offer(offer.sdp)
            .await
            .map_err(|source| negotiation_error(&peer_id, source))?;

        let answer = match ready {
            Some(message) => message,
            None => self.wait_outbound().await?,
        };
        info!("Answer for {} ready", peer_id);
        encode(answer)
    }

    /// Applies a pasted answer to the offer this session created.
    pub async fn receive_answer(&mut self, text: &str) -> Result<(), SessionError> {
        let answer = decode(text, SdpKind::Answer)?;
        let machine = match self.machine.as_mut() {
            Some(m) if m.role() == NegotiationRole::Initiator => m,
            _ => return Err(SessionError::InvalidState("no offer was created")),
        };

        machine
            .apply_answer(answer.sdp)
            .await
            .map_err(|source| negotiation_error(&answer.from, source))?;
        info!("Applied answer from {}", answer.from);
        Ok(())
    }

    /// Processes engine events until the peer's media arrived.
    pub async fn wait_connected(&mut self, timeout: Duration) -> Result<(), SessionError> {
        if self.machine.is_none() {
            return Err(SessionError::InvalidState("negotiation not started"));
        }

        let wait = async {
            while self.phase() != NegotiationPhase::Connected {
                if self.phase() == NegotiationPhase::Failed {
                    return Err(SessionError::InvalidState("negotiation failed"));
                }
                self.next_event().await?;
            }
            Ok::<(), SessionError>(())
        };

        tokio::time::timeout(timeout, wait)
            .await
            .map_err(|_| SessionError::Timeout("connection"))?
    }

    pub async fn close(&mut self) {
        if let Some(machine) = self.machine.take() {
            machine.close().await;
        }
    }

    async fn create_machine(
        &mut self,
        peer_id: &ClientId,
        role: NegotiationRole,
    ) -> Result<&mut NegotiationMachine, SessionError> {
        let tag = EngineTag {
            peer_id: peer_id.clone(),
            instance: 1,
        };
        let engine = self
            .factory
            .create(tag.clone(), self.events_tx.clone())
            .await
            .map_err(|e| negotiation_error(peer_id, NegotiationError::engine(EngineStep::Create, e)))?;

        let machine = NegotiationMachine::new(self.local_id.clone(), tag, role, engine, &self.source)
            .await
            .map_err(|source| negotiation_error(peer_id, source))?;
        Ok(self.machine.insert(machine))
    }

    async fn wait_outbound(&mut self) -> Result<SdpMessage, SessionError> {
        loop {
            if let Some(message) = self.next_event().await? {
                return Ok(message);
            }
        }
    }

    async fn next_event(&mut self) -> Result<Option<SdpMessage>, SessionError> {
        let event = self.events_rx.recv().await.ok_or(SessionError::Stopped)?;
        let Some(machine) = self.machine.as_mut() else {
            return Ok(None);
        };

        match event {
            TransportEvent::GatheringComplete(_) => {
                let peer_id = machine.peer_id().clone();
                machine
                    .on_gathering_complete()
                    .await
                    .map_err(|source| negotiation_error(&peer_id, source))
            }
            TransportEvent::RemoteSourceArrived(_, source) => {
                if let Some(source) = machine.on_remote_source(source) {
                    info!("Remote {:?} source {} arrived", source.kind, source.stream_id);
                }
                Ok(None)
            }
            TransportEvent::CandidateGenerated(..) => Ok(None),
            TransportEvent::Disconnected(tag) => {
                debug!("Connection {} closed", tag);
                Ok(None)
            }
        }
    }
}

fn negotiation_error(peer_id: &ClientId, source: NegotiationError) -> SessionError {
    SessionError::Negotiation {
        peer_id: peer_id.clone(),
        source,
    }
}

fn encode(message: SdpMessage) -> Result<String, SessionError> {
    Ok(RelayMessage::from(message).to_json()?)
}

fn decode(text: &str, expected: SdpKind) -> Result<SdpMessage, SessionError> {
    let message = RelayMessage::from_json(text.trim())?;
    match message.into_sdp() {
        Some(sdp) if sdp.kind == expected => Ok(sdp),
        _ => Err(SessionError::InvalidState(match expected {
            SdpKind::Offer => "pasted text is not an offer",
            SdpKind::Answer => "pasted text is not an answer",
        })),
    }
}
