use huddle_core::ClientId;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::negotiation::NegotiationPhase;

/// The connection-engine call that was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineStep {
    Create,
    AttachLocalSource,
    CreateOffer,
    CreateAnswer,
    SetLocalDescription,
    SetRemoteDescription,
}

impl fmt::Display for EngineStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EngineStep::Create => "create engine",
            EngineStep::AttachLocalSource => "attach local source",
            EngineStep::CreateOffer => "create offer",
            EngineStep::CreateAnswer => "create answer",
            EngineStep::SetLocalDescription => "set local description",
            EngineStep::SetRemoteDescription => "set remote description",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NegotiationError {
    #[error("{step} failed: {reason}")]
    Engine { step: EngineStep, reason: String },

    #[error("{event} is not accepted in phase {phase:?}")]
    UnexpectedEvent {
        phase: NegotiationPhase,
        event: &'static str,
    },

    #[error("engine reported gathering complete without a local description")]
    MissingLocalDescription,
}

impl NegotiationError {
    pub fn engine(step: EngineStep, err: anyhow::Error) -> Self {
        NegotiationError::Engine {
            step,
            reason: format!("{:#}", err),
        }
    }

    /// Protocol violations leave the machine untouched; everything else fails it.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(self, NegotiationError::UnexpectedEvent { .. })
    }
}

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("relay is closed")]
    Closed,
}

#[derive(Debug, Error)]
pub enum AcquisitionError {
    #[error("no audio or video requested")]
    NothingRequested,
}

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("failed to access identity file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("identity file {0} is empty")]
    Empty(PathBuf),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Acquisition(#[from] AcquisitionError),

    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error(transparent)]
    Relay(#[from] RelayError),

    #[error("negotiation with {peer_id} failed: {source}")]
    Negotiation {
        peer_id: ClientId,
        #[source]
        source: NegotiationError,
    },

    #[error("malformed signaling text: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("{0}")]
    InvalidState(&'static str),

    #[error("timed out waiting for {0}")]
    Timeout(&'static str),

    #[error("session has stopped")]
    Stopped,
}
