use huddle_core::ClientId;
use std::fmt;

use crate::media::RemoteMediaSource;

/// Identifies the engine an event came from.
///
/// `instance` differs between two engines created for the same peer, so
/// events from a replaced engine can be told apart.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EngineTag {
    pub peer_id: ClientId,
    pub instance: u64,
}

impl fmt::Display for EngineTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.peer_id, self.instance)
    }
}

/// Events a connection engine reports back to the session loop.
#[derive(Debug)]
pub enum TransportEvent {
    /// One local candidate; unused under vanilla ICE.
    CandidateGenerated(EngineTag, String),

    /// No further local candidates will be found.
    GatheringComplete(EngineTag),

    /// The remote peer's media started arriving.
    RemoteSourceArrived(EngineTag, RemoteMediaSource),

    /// The underlying connection failed or closed.
    Disconnected(EngineTag),
}

impl TransportEvent {
    pub fn tag(&self) -> &EngineTag {
        match self {
            TransportEvent::CandidateGenerated(tag, _)
            | TransportEvent::GatheringComplete(tag)
            | TransportEvent::RemoteSourceArrived(tag, _)
            | TransportEvent::Disconnected(tag) => tag,
        }
    }
}
