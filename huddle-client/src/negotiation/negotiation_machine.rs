use huddle_core::{ClientId, SdpKind, SdpMessage, SessionDescription};
use tracing::{debug, error, info};

use crate::error::{EngineStep, NegotiationError};
use crate::media::{LocalMediaSource, RemoteMediaSource};
use crate::negotiation::{NegotiationPhase, NegotiationRole};
use crate::transport::{ConnectionEngine, EngineTag};

/// Read-only view of one machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerSnapshot {
    pub peer_id: ClientId,
    pub role: NegotiationRole,
    pub phase: NegotiationPhase,
    pub has_local_description: bool,
    pub has_remote_description: bool,
    pub candidate_gathering_complete: bool,
}

/// Offer/answer negotiation with one remote peer.
///
/// Every method runs one transition to completion, awaiting the engine
/// calls it needs in order. The single outbound SDP message is only
/// produced after the engine reported that candidate gathering finished.
pub struct NegotiationMachine {
    local_id: ClientId,
    /// Remote peer plus the engine instance serving it.
    tag: EngineTag,
    role: NegotiationRole,
    phase: NegotiationPhase,
    engine: Box<dyn ConnectionEngine>,
    /// Replaced by the engine's copy, candidates included, when emitted.
    local_description: Option<SessionDescription>,
    /// Set at most once.
    remote_description: Option<SessionDescription>,
    candidate_gathering_complete: bool,
    /// First remote media only; later tracks are not reported.
    remote_source: Option<RemoteMediaSource>,
}

impl NegotiationMachine {
    /// Attaches `source` to the engine; a machine never exists without it.
    pub async fn new(
        local_id: ClientId,
        tag: EngineTag,
        role: NegotiationRole,
        engine: Box<dyn ConnectionEngine>,
        source: &LocalMediaSource,
    ) -> Result<Self, NegotiationError> {
        if let Err(e) = engine.attach_local_source(source).await {
            let _ = engine.close().await;
            return Err(NegotiationError::engine(EngineStep::AttachLocalSource, e));
        }

        debug!("Created {:?} machine for {}", role, tag);
        Ok(Self {
            local_id,
            tag,
            role,
            phase: NegotiationPhase::Idle,
            engine,
            local_description: None,
            remote_description: None,
            candidate_gathering_complete: false,
            remote_source: None,
        })
    }

    pub fn peer_id(&self) -> &ClientId {
        &self.tag.peer_id
    }

    pub fn tag(&self) -> &EngineTag {
        &self.tag
    }

    pub fn role(&self) -> NegotiationRole {
        self.role
    }

    pub fn phase(&self) -> NegotiationPhase {
        self.phase
    }

    pub fn remote_source(&self) -> Option<&RemoteMediaSource> {
        self.remote_source.as_ref()
    }

    pub fn snapshot(&self) -> PeerSnapshot {
        PeerSnapshot {
            peer_id: self.tag.peer_id.clone(),
            role: self.role,
            phase: self.phase,
            has_local_description: self.local_description.is_some(),
            has_remote_description: self.remote_description.is_some(),
            candidate_gathering_complete: self.candidate_gathering_complete,
        }
    }

    /// Initiator: create and set the local offer, then wait for gathering.
    pub async fn start_offer(&mut self) -> Result<Option<SdpMessage>, NegotiationError> {
        self.expect(NegotiationRole::Initiator, NegotiationPhase::Idle, "start offer")?;
        self.set_phase(NegotiationPhase::OfferCreating);

        let offer = match self.engine.create_offer().await {
            Ok(offer) => offer,
            Err(e) => return Err(self.fail(EngineStep::CreateOffer, e)),
        };
        if let Err(e) = self.engine.set_local_description(offer.clone()).await {
            return Err(self.fail(EngineStep::SetLocalDescription, e));
        }
        self.local_description = Some(offer);
        self.set_phase(NegotiationPhase::CandidateGathering);

        self.emit_if_gathered().await
    }

    /// Responder: apply the remote offer, create and set the local answer.
    pub async fn accept_offer(&mut self, sdp: String) -> Result<Option<SdpMessage>, NegotiationError> {
        self.expect(NegotiationRole::Responder, NegotiationPhase::Idle, "offer")?;
        self.set_phase(NegotiationPhase::AnswerCreating);

        let offer = SessionDescription::offer(sdp);
        if let Err(e) = self.engine.set_remote_description(offer.clone()).await {
            return Err(self.fail(EngineStep::SetRemoteDescription, e));
        }
        self.remote_description = Some(offer);

        let answer = match self.engine.create_answer().await {
            Ok(answer) => answer,
            Err(e) => return Err(self.fail(EngineStep::CreateAnswer, e)),
        };
        if let Err(e) = self.engine.set_local_description(answer.clone()).await {
            return Err(self.fail(EngineStep::SetLocalDescription, e));
        }
        self.local_description = Some(answer);
        self.set_phase(NegotiationPhase::CandidateGathering);

        self.emit_if_gathered().await
    }

    /// Initiator: apply the peer's answer.
    pub async fn apply_answer(&mut self, sdp: String) -> Result<(), NegotiationError> {
        if self.role != NegotiationRole::Initiator
            || self.phase != NegotiationPhase::AwaitingAnswer
            || self.remote_description.is_some()
        {
            return Err(self.unexpected("answer"));
        }

        let answer = SessionDescription::answer(sdp);
        if let Err(e) = self.engine.set_remote_description(answer.clone()).await {
            return Err(self.fail(EngineStep::SetRemoteDescription, e));
        }
        self.remote_description = Some(answer);
        self.try_connect();
        Ok(())
    }

    /// The engine found its last candidate. Returns the outbound message
    /// once the local description is in place; repeated events are ignored.
    pub async fn on_gathering_complete(&mut self) -> Result<Option<SdpMessage>, NegotiationError> {
        if self.phase.is_terminal() || self.candidate_gathering_complete {
            return Ok(None);
        }
        self.candidate_gathering_complete = true;
        self.emit_if_gathered().await
    }

    /// Records the remote media. Returns it the first time only.
    pub fn on_remote_source(&mut self, source: RemoteMediaSource) -> Option<RemoteMediaSource> {
        if self.phase == NegotiationPhase::Failed || self.remote_source.is_some() {
            return None;
        }
        self.remote_source = Some(source.clone());
        self.try_connect();
        Some(source)
    }

    pub async fn close(&self) {
        if let Err(e) = self.engine.close().await {
            debug!("Closing engine {} failed: {:#}", self.tag, e);
        }
    }

    async fn emit_if_gathered(&mut self) -> Result<Option<SdpMessage>, NegotiationError> {
        if self.phase != NegotiationPhase::CandidateGathering || !self.candidate_gathering_complete {
            return Ok(None);
        }

        // The engine's copy now carries every gathered candidate.
        let description = match self.engine.local_description().await {
            Some(d) => d,
            None => match self.local_description.clone() {
                Some(d) => d,
                None => {
                    error!("No local description for {} after gathering", self.tag);
                    self.set_phase(NegotiationPhase::Failed);
                    return Err(NegotiationError::MissingLocalDescription);
                }
            },
        };

        let kind = match self.role {
            NegotiationRole::Initiator => SdpKind::Offer,
            NegotiationRole::Responder => SdpKind::Answer,
        };
        let message = SdpMessage {
            from: self.local_id.clone(),
            kind,
            sdp: description.sdp.clone(),
        };
        self.local_description = Some(description);

        match self.role {
            NegotiationRole::Initiator => {
                self.set_phase(NegotiationPhase::OfferReady);
                self.set_phase(NegotiationPhase::AwaitingAnswer);
            }
            NegotiationRole::Responder => {
                self.set_phase(NegotiationPhase::AnswerReady);
                self.try_connect();
            }
        }
        Ok(Some(message))
    }

    fn try_connect(&mut self) {
        let own_half_done = match self.role {
            NegotiationRole::Initiator => {
                self.phase == NegotiationPhase::AwaitingAnswer && self.remote_description.is_some()
            }
            NegotiationRole::Responder => self.phase == NegotiationPhase::AnswerReady,
        };
        if own_half_done && self.remote_source.is_some() {
            self.set_phase(NegotiationPhase::Connected);
        }
    }

    fn expect(
        &self,
        role: NegotiationRole,
        phase: NegotiationPhase,
        event: &'static str,
    ) -> Result<(), NegotiationError> {
        if self.role != role || self.phase != phase {
            return Err(self.unexpected(event));
        }
        Ok(())
    }

    fn unexpected(&self, event: &'static str) -> NegotiationError {
        NegotiationError::UnexpectedEvent {
            phase: self.phase,
            event,
        }
    }

    fn fail(&mut self, step: EngineStep, err: anyhow::Error) -> NegotiationError {
        let err = NegotiationError::engine(step, err);
        error!("Negotiation with {} failed: {}", self.tag, err);
        self.set_phase(NegotiationPhase::Failed);
        err
    }

    fn set_phase(&mut self, phase: NegotiationPhase) {
        info!(
            "{:?} {} : {:?} -> {:?}",
            self.role, self.tag, self.phase, phase
        );
        self.phase = phase;
    }
}
