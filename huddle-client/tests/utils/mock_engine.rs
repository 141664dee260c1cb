use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use huddle_client::{
    ConnectionEngine, EngineFactory, EngineStep, EngineTag, LocalMediaSource, RemoteMediaSource,
    TransportEvent,
};
use huddle_core::{ClientId, MediaKind, SessionDescription};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// When engines report the end of candidate gathering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatheringMode {
    /// Right after the local description is set.
    Immediate,
    /// Only when the test calls [`MockNetwork::complete_gathering`].
    Manual,
}

struct EngineState {
    tag: EngineTag,
    events: mpsc::Sender<TransportEvent>,
    stream_id: String,
    local: Option<SessionDescription>,
    remote_uid: Option<u64>,
    gathered: bool,
    announced: bool,
    closed: bool,
}

struct NetworkState {
    mode: GatheringMode,
    next_uid: u64,
    engines: HashMap<u64, EngineState>,
}

/// Shared medium for mock engines.
///
/// Two engines are paired when each one's remote description is the
/// other's local description; both then receive `RemoteSourceArrived`.
#[derive(Clone)]
pub struct MockNetwork {
    state: Arc<Mutex<NetworkState>>,
}

impl MockNetwork {
    pub fn new() -> Self {
        Self::with_gathering(GatheringMode::Immediate)
    }

    pub fn with_gathering(mode: GatheringMode) -> Self {
        Self {
            state: Arc::new(Mutex::new(NetworkState {
                mode,
                next_uid: 0,
                engines: HashMap::new(),
            })),
        }
    }

    /// Engine factory for the participant `owner`.
    pub fn factory(&self, owner: impl Into<ClientId>) -> MockEngineFactory {
        MockEngineFactory {
            owner: owner.into(),
            network: self.clone(),
            failures: Arc::new(Mutex::new(Vec::new())),
            created: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Finishes gathering for every engine that has a local description.
    pub async fn complete_gathering(&self) {
        let pending: Vec<_> = {
            let mut state = self.state.lock().unwrap();
            state
                .engines
                .values_mut()
                .filter(|e| e.local.is_some() && !e.gathered && !e.closed)
                .map(|e| {
                    e.gathered = true;
                    (e.events.clone(), e.tag.clone())
                })
                .collect()
        };

        for (events, tag) in pending {
            let _ = events.send(TransportEvent::GatheringComplete(tag)).await;
        }
    }

    /// Completes what is pending and gathers immediately from now on.
    pub async fn release_gathering(&self) {
        self.state.lock().unwrap().mode = GatheringMode::Immediate;
        self.complete_gathering().await;
    }

    pub fn closed_engines(&self) -> usize {
        let state = self.state.lock().unwrap();
        state.engines.values().filter(|e| e.closed).count()
    }

    fn register(&self, tag: EngineTag, events: mpsc::Sender<TransportEvent>) -> u64 {
        let mut state = self.state.lock().unwrap();
        state.next_uid += 1;
        let uid = state.next_uid;
        state.engines.insert(
            uid,
            EngineState {
                tag,
                events,
                stream_id: String::new(),
                local: None,
                remote_uid: None,
                gathered: false,
                announced: false,
                closed: false,
            },
        );
        uid
    }

    fn with_engine<T>(&self, uid: u64, f: impl FnOnce(&mut EngineState) -> T) -> Option<T> {
        let mut state = self.state.lock().unwrap();
        state.engines.get_mut(&uid).map(f)
    }

    fn mode(&self) -> GatheringMode {
        self.state.lock().unwrap().mode
    }

    async fn announce_if_paired(&self, uid: u64) {
        let deliveries = {
            let mut state = self.state.lock().unwrap();
            let Some(me) = state.engines.get(&uid) else {
                return;
            };
            let Some(other_uid) = me.remote_uid else {
                return;
            };
            let Some(other) = state.engines.get(&other_uid) else {
                return;
            };
            let paired = me.local.is_some()
                && other.local.is_some()
                && other.remote_uid == Some(uid)
                && !me.closed
                && !other.closed;
            if !paired {
                return;
            }

            let mut deliveries = Vec::new();
            for (to, from) in [(uid, other_uid), (other_uid, uid)] {
                let stream_id = state.engines[&from].stream_id.clone();
                let Some(target) = state.engines.get_mut(&to) else {
                    continue;
                };
                if target.announced {
                    continue;
                }
                target.announced = true;
                let source = RemoteMediaSource {
                    stream_id,
                    track_id: "audio".to_owned(),
                    kind: MediaKind::Audio,
                    track: None,
                };
                deliveries.push((
                    target.events.clone(),
                    TransportEvent::RemoteSourceArrived(target.tag.clone(), source),
                ));
            }
            deliveries
        };

        for (events, event) in deliveries {
            let _ = events.send(event).await;
        }
    }
}

impl Default for MockNetwork {
    fn default() -> Self {
        Self::new()
    }
}

/// Creates [`MockEngine`]s for one participant.
#[derive(Clone)]
pub struct MockEngineFactory {
    owner: ClientId,
    network: MockNetwork,
    failures: Arc<Mutex<Vec<(Option<ClientId>, EngineStep)>>>,
    created: Arc<AtomicUsize>,
}

impl MockEngineFactory {
    /// Every engine of this factory rejects `step`.
    pub fn fail_on(self, step: EngineStep) -> Self {
        self.failures.lock().unwrap().push((None, step));
        self
    }

    /// Only the engine towards `peer` rejects `step`.
    pub fn fail_for(self, peer: impl Into<ClientId>, step: EngineStep) -> Self {
        self.failures
            .lock()
            .unwrap()
            .push((Some(peer.into()), step));
        self
    }

    pub fn created_count(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    fn should_fail(&self, peer: &ClientId, step: EngineStep) -> bool {
        self.failures
            .lock()
            .unwrap()
            .iter()
            .any(|(target, s)| *s == step && target.as_ref().is_none_or(|t| t == peer))
    }
}

#[async_trait]
impl EngineFactory for MockEngineFactory {
    async fn create(
        &self,
        tag: EngineTag,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<Box<dyn ConnectionEngine>> {
        if self.should_fail(&tag.peer_id, EngineStep::Create) {
            bail!("mock engine creation refused for {}", tag);
        }

        self.created.fetch_add(1, Ordering::SeqCst);
        let uid = self.network.register(tag.clone(), events.clone());
        Ok(Box::new(MockEngine {
            uid,
            tag,
            events,
            factory: self.clone(),
        }))
    }
}

pub struct MockEngine {
    uid: u64,
    tag: EngineTag,
    events: mpsc::Sender<TransportEvent>,
    factory: MockEngineFactory,
}

impl MockEngine {
    fn check(&self, step: EngineStep) -> Result<()> {
        if self.factory.should_fail(&self.tag.peer_id, step) {
            bail!("mock engine refused to {}", step);
        }
        Ok(())
    }

    fn render(&self, kind: &str) -> String {
        format!(
            "v=0\r\no=mock {} 1 IN IP4 127.0.0.1\r\ns={}-{}\r\nt=0 0\r\nm=audio 9 UDP/TLS/RTP/SAVPF 111\r\n",
            self.uid, self.factory.owner, kind
        )
    }

    fn network(&self) -> &MockNetwork {
        &self.factory.network
    }
}

fn origin_uid(sdp: &str) -> Result<u64> {
    let line = sdp
        .lines()
        .find(|l| l.starts_with("o=mock "))
        .context("no mock origin line")?;
    line.split_whitespace()
        .nth(1)
        .context("origin line without id")?
        .parse()
        .context("origin id is not a number")
}

fn with_candidates(mut description: SessionDescription, uid: u64) -> SessionDescription {
    description.sdp.push_str(&format!(
        "a=candidate:1 1 udp 2130706431 127.0.0.1 {} typ host\r\na=end-of-candidates\r\n",
        40000 + uid
    ));
    description
}

#[async_trait]
impl ConnectionEngine for MockEngine {
    async fn attach_local_source(&self, source: &LocalMediaSource) -> Result<()> {
        self.check(EngineStep::AttachLocalSource)?;
        self.network()
            .with_engine(self.uid, |e| e.stream_id = source.stream_id.clone());
        Ok(())
    }

    async fn create_offer(&self) -> Result<SessionDescription> {
        self.check(EngineStep::CreateOffer)?;
        Ok(SessionDescription::offer(self.render("offer")))
    }

    async fn create_answer(&self) -> Result<SessionDescription> {
        self.check(EngineStep::CreateAnswer)?;
        let has_remote = self
            .network()
            .with_engine(self.uid, |e| e.remote_uid.is_some())
            .unwrap_or(false);
        if !has_remote {
            bail!("answer requested before the remote offer was set");
        }
        Ok(SessionDescription::answer(self.render("answer")))
    }

    async fn set_local_description(&self, description: SessionDescription) -> Result<()> {
        self.check(EngineStep::SetLocalDescription)?;
        let immediate = self.network().mode() == GatheringMode::Immediate;
        self.network().with_engine(self.uid, |e| {
            e.local = Some(description);
            e.gathered = immediate;
        });

        if immediate {
            let _ = self
                .events
                .send(TransportEvent::GatheringComplete(self.tag.clone()))
                .await;
        }
        self.network().announce_if_paired(self.uid).await;
        Ok(())
    }

    async fn set_remote_description(&self, description: SessionDescription) -> Result<()> {
        self.check(EngineStep::SetRemoteDescription)?;
        let remote_uid = origin_uid(&description.sdp)?;
        self.network()
            .with_engine(self.uid, |e| e.remote_uid = Some(remote_uid));
        self.network().announce_if_paired(self.uid).await;
        Ok(())
    }

    async fn local_description(&self) -> Option<SessionDescription> {
        let uid = self.uid;
        self.network()
            .with_engine(uid, |e| {
                let local = e.local.clone()?;
                Some(if e.gathered {
                    with_candidates(local, uid)
                } else {
                    local
                })
            })
            .flatten()
    }

    async fn close(&self) -> Result<()> {
        self.network().with_engine(self.uid, |e| e.closed = true);
        Ok(())
    }
}
