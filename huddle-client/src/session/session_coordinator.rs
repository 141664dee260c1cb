use huddle_core::{ClientId, RelayMessage, RoomName, SdpKind, SdpMessage};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::{GlarePolicy, SessionConfig};
use crate::error::{NegotiationError, SessionError};
use crate::media::{LocalMediaSource, MediaSource, SyntheticMediaSource};
use crate::negotiation::{NegotiationPhase, NegotiationRole};
use crate::registry::ConnectionRegistry;
use crate::relay::{RelayChannel, RelayDelivery};
use crate::session::{
    DirectInbox, LoggingObserver, RoomJoinState, SessionCommand, SessionHandle, SessionObserver,
    enter_room,
};
use crate::transport::{EngineFactory, TransportEvent, WebRtcEngineFactory};

/// Collaborators a session runs against. Everything except the relay has
/// a default: synthetic media, `webrtc` engines, log-only observer and
/// the system clock.
#[derive(Clone)]
pub struct SessionDeps {
    relay: Arc<dyn RelayChannel>,
    media: Arc<dyn MediaSource>,
    engines: Option<Arc<dyn EngineFactory>>,
    observer: Arc<dyn SessionObserver>,
    clock: Arc<dyn Clock>,
}

impl SessionDeps {
    pub fn new(relay: Arc<dyn RelayChannel>) -> Self {
        Self {
            relay,
            media: Arc::new(SyntheticMediaSource),
            engines: None,
            observer: Arc::new(LoggingObserver),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_media(mut self, media: Arc<dyn MediaSource>) -> Self {
        self.media = media;
        self
    }

    pub fn with_engines(mut self, engines: Arc<dyn EngineFactory>) -> Self {
        self.engines = Some(engines);
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn SessionObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

/// One participant's presence in one room.
///
/// Reacts to relay deliveries, engine events and handle commands, one at a
/// time and each to completion.
pub struct SessionCoordinator {
    /// Our identity in the room.
    local_id: ClientId,

    room: RoomName,

    /// What to do when a peer we offered to offers back.
    glare_policy: GlarePolicy,

    /// Entry time used to filter stale `RequestOffer`s.
    join: RoomJoinState,

    /// Media attached to every engine this session creates.
    local_source: LocalMediaSource,

    /// Where offers and answers are published and removed.
    relay: Arc<dyn RelayChannel>,

    /// Receives remote media, connections and failures.
    observer: Arc<dyn SessionObserver>,

    /// One negotiation machine per remote peer.
    registry: ConnectionRegistry,

    /// Direct messages already handled.
    inbox: DirectInbox,

    /// Peers already reported through `on_connected`.
    connected: HashSet<ClientId>,

    /// Commands from the `SessionHandle`s.
    command_rx: mpsc::Receiver<SessionCommand>,

    /// `RequestOffer`s on the room's broadcast address.
    broadcast_rx: mpsc::UnboundedReceiver<RelayDelivery>,

    /// Offers and answers addressed to us.
    direct_rx: mpsc::UnboundedReceiver<RelayDelivery>,

    /// Events from every engine the registry created.
    transport_rx: mpsc::Receiver<TransportEvent>,
}

impl SessionCoordinator {
    /// Acquires local media and enters the room. The returned coordinator
    /// does nothing until [`SessionCoordinator::run`] is polled.
    pub async fn start(
        config: SessionConfig,
        local_id: ClientId,
        deps: SessionDeps,
    ) -> Result<(SessionHandle, Self), SessionError> {
        // 1. Local media must exist before any engine does
        let local_source = deps.media.acquire(config.constraints).await?;

        // 2. Registry with one event channel shared by all engines
        let engines = match deps.engines {
            Some(engines) => engines,
            None => Arc::new(WebRtcEngineFactory::new(config.transport.clone())),
        };
        let (transport_tx, transport_rx) = mpsc::channel(256);
        let registry = ConnectionRegistry::new(
            local_id.clone(),
            engines,
            local_source.clone(),
            transport_tx,
        );

        // 3. Subscribe, then announce ourselves
        let (join, subscriptions) = enter_room(
            deps.relay.as_ref(),
            &config.room,
            &local_id,
            deps.clock.as_ref(),
        )
        .await?;

        // 4. Command channel for the handles
        let (command_tx, command_rx) = mpsc::channel(32);
        let handle = SessionHandle::new(local_id.clone(), command_tx);

        let coordinator = Self {
            local_id,
            room: config.room,
            glare_policy: config.glare_policy,
            join,
            local_source,
            relay: deps.relay,
            observer: deps.observer,
            registry,
            inbox: DirectInbox::default(),
            connected: HashSet::new(),
            command_rx,
            broadcast_rx: subscriptions.broadcast,
            direct_rx: subscriptions.direct,
            transport_rx,
        };
        Ok((handle, coordinator))
    }

    pub fn local_source(&self) -> &LocalMediaSource {
        &self.local_source
    }

    pub async fn run(mut self) {
        info!("Session {} in room {} started", self.local_id, self.room);

        loop {
            tokio::select! {
                // 1. Commands from handles
                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(SessionCommand::Snapshot { reply }) => {
                            let _ = reply.send(self.registry.snapshot());
                        }
                        Some(SessionCommand::Shutdown) => {
                            info!("Shutdown requested for session {}", self.local_id);
                            break;
                        }
                        None => {
                            info!("All session handles dropped. Shutting down.");
                            break;
                        }
                    }
                }

                // 2. Someone entered the room
                delivery = self.broadcast_rx.recv() => {
                    match delivery {
                        Some(d) => self.handle_broadcast(d).await,
                        None => {
                            warn!("Broadcast subscription closed unexpectedly");
                            break;
                        }
                    }
                }

                // 3. Offer or answer for us
                delivery = self.direct_rx.recv() => {
                    match delivery {
                        Some(d) => self.handle_direct(d).await,
                        None => {
                            warn!("Direct subscription closed unexpectedly");
                            break;
                        }
                    }
                }

                // 4. Engine events (gathering, remote media)
                Some(event) = self.transport_rx.recv() => {
                    self.handle_transport_event(event).await;
                }
            }
        }

        self.registry.close_all().await;
        info!("Session {} finished", self.local_id);
    }

    async fn handle_broadcast(&mut self, delivery: RelayDelivery) {
        let Some(request) = delivery.message.into_request_offer() else {
            warn!(
                "Ignoring non request-offer message {} on {}",
                delivery.message_ref, delivery.address
            );
            return;
        };

        if !self.join.admits(&request) {
            debug!(
                "Filtered request from {} at {} (entered at {})",
                request.from, request.timestamp, self.join.entered_at
            );
            return;
        }

        self.initiate(request.from).await;
    }

    async fn initiate(&mut self, peer_id: ClientId) {
        let result = match self
            .registry
            .get_or_create(&peer_id, NegotiationRole::Initiator)
            .await
        {
            Ok(machine)
                if machine.role() == NegotiationRole::Initiator
                    && machine.phase() == NegotiationPhase::Idle =>
            {
                machine.start_offer().await
            }
            Ok(machine) => {
                debug!(
                    "Already negotiating with {} as {:?} ({:?})",
                    peer_id,
                    machine.role(),
                    machine.phase()
                );
                return;
            }
            Err(e) => Err(e),
        };

        self.after_step(&peer_id, result).await;
    }

    async fn handle_direct(&mut self, delivery: RelayDelivery) {
        if self.inbox.is_consumed(&delivery.message_ref) {
            debug!("Skipping already consumed {}", delivery.message_ref);
            return;
        }

        match delivery.message.clone().into_sdp() {
            Some(message) => self.dispatch_sdp(message).await,
            None => warn!(
                "Dropping {} on direct address {}: not an offer or answer",
                delivery.message_ref, delivery.address
            ),
        }

        self.consume(&delivery).await;
    }

    async fn dispatch_sdp(&mut self, message: SdpMessage) {
        match message.kind {
            SdpKind::Offer => self.handle_offer(message.from, message.sdp).await,
            SdpKind::Answer => self.handle_answer(message.from, message.sdp).await,
        }
    }

    async fn handle_offer(&mut self, peer_id: ClientId, sdp: String) {
        if self.in_glare_with(&peer_id) {
            if self.local_id < peer_id {
                info!("Both sides offered; {} yields to {}", self.local_id, peer_id);
                let result = match self
                    .registry
                    .replace(&peer_id, NegotiationRole::Responder)
                    .await
                {
                    Ok(machine) => machine.accept_offer(sdp).await,
                    Err(e) => Err(e),
                };
                self.after_step(&peer_id, result).await;
            } else {
                info!("Both sides offered; keeping own offer to {}", peer_id);
            }
            return;
        }

        let result = match self
            .registry
            .get_or_create(&peer_id, NegotiationRole::Responder)
            .await
        {
            Ok(machine) => machine.accept_offer(sdp).await,
            Err(e) => Err(e),
        };
        self.after_step(&peer_id, result).await;
    }

    async fn handle_answer(&mut self, peer_id: ClientId, sdp: String) {
        let result = match self.registry.get(&peer_id) {
            Some(machine) => machine.apply_answer(sdp).await.map(|()| None),
            None => {
                warn!("Dropping answer from untracked peer {}", peer_id);
                return;
            }
        };
        self.after_step(&peer_id, result).await;
    }

    async fn handle_transport_event(&mut self, event: TransportEvent) {
        if self.registry.get_by_tag(event.tag()).is_none() {
            debug!("Ignoring event from replaced engine {}", event.tag());
            return;
        }

        match event {
            TransportEvent::CandidateGenerated(tag, candidate) => {
                trace!("Candidate for {}: {}", tag, candidate);
            }

            TransportEvent::GatheringComplete(tag) => {
                let result = match self.registry.get_by_tag(&tag) {
                    Some(machine) => machine.on_gathering_complete().await,
                    None => return,
                };
                self.after_step(&tag.peer_id, result).await;
            }

            TransportEvent::RemoteSourceArrived(tag, source) => {
                let first = self
                    .registry
                    .get_by_tag(&tag)
                    .and_then(|machine| machine.on_remote_source(source));
                if let Some(source) = first {
                    self.observer
                        .on_remote_source(tag.peer_id.clone(), source)
                        .await;
                }
                self.report_connected(&tag.peer_id).await;
            }

            TransportEvent::Disconnected(tag) => {
                info!("Connection {} closed", tag);
            }
        }
    }

    /// Publishes what a transition produced and reports its outcome.
    async fn after_step(
        &mut self,
        peer_id: &ClientId,
        result: Result<Option<SdpMessage>, NegotiationError>,
    ) {
        match result {
            Ok(Some(message)) => self.send_direct(peer_id, message).await,
            Ok(None) => {}
            Err(e) if e.is_protocol_violation() => {
                warn!("Dropped message for {}: {}", peer_id, e);
            }
            Err(e) => {
                error!("Negotiation with {} failed: {}", peer_id, e);
                self.observer
                    .on_negotiation_failed(peer_id.clone(), e)
                    .await;
            }
        }

        self.report_connected(peer_id).await;
    }

    async fn report_connected(&mut self, peer_id: &ClientId) {
        if self.registry.phase_of(peer_id) != Some(NegotiationPhase::Connected) {
            return;
        }
        if self.connected.insert(peer_id.clone()) {
            self.observer.on_connected(peer_id.clone()).await;
        }
    }

    fn in_glare_with(&self, peer_id: &ClientId) -> bool {
        self.glare_policy == GlarePolicy::SmallerIdYields
            && self.registry.role_of(peer_id) == Some(NegotiationRole::Initiator)
            && self.registry.phase_of(peer_id) != Some(NegotiationPhase::Connected)
    }

    async fn send_direct(&self, peer_id: &ClientId, message: SdpMessage) {
        let address = self.room.direct(peer_id);
        let kind = message.kind;

        match self.relay.publish(&address, RelayMessage::from(message)).await {
            Ok(message_ref) => debug!("Sent {} to {} as {}", kind, address, message_ref),
            Err(e) => error!("Failed to send {} to {}: {}", kind, address, e),
        }
    }

    async fn consume(&mut self, delivery: &RelayDelivery) {
        match self
            .relay
            .remove(&delivery.address, &delivery.message_ref)
            .await
        {
            Ok(true) => trace!("Removed {} from {}", delivery.message_ref, delivery.address),
            Ok(false) => debug!("{} was already removed", delivery.message_ref),
            Err(e) => warn!(
                "Failed to remove {} from {}: {}",
                delivery.message_ref, delivery.address, e
            ),
        }
        self.inbox.mark_consumed(delivery.message_ref.clone());
    }
}
