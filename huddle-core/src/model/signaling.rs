use crate::model::client_id::ClientId;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceServerConfig {
    pub urls: Vec<String>,
    pub username: Option<String>,
    pub credential: Option<String>,
}

impl IceServerConfig {
    pub fn stun(url: impl Into<String>) -> Self {
        Self {
            urls: vec![url.into()],
            username: None,
            credential: None,
        }
    }
}

/// Everything that travels through the relay.
///
/// `RequestOffer` goes to the room's broadcast address, `Offer` and
/// `Answer` to a single client's direct address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelayMessage {
    RequestOffer { from: ClientId, timestamp: u64 },
    Offer { from: ClientId, sdp: String },
    Answer { from: ClientId, sdp: String },
}

impl RelayMessage {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn sender(&self) -> &ClientId {
        match self {
            RelayMessage::RequestOffer { from, .. }
            | RelayMessage::Offer { from, .. }
            | RelayMessage::Answer { from, .. } => from,
        }
    }

    /// Splits off the SDP part of a direct message; `None` for broadcast requests.
    pub fn into_sdp(self) -> Option<SdpMessage> {
        match self {
            RelayMessage::Offer { from, sdp } => Some(SdpMessage {
                from,
                kind: SdpKind::Offer,
                sdp,
            }),
            RelayMessage::Answer { from, sdp } => Some(SdpMessage {
                from,
                kind: SdpKind::Answer,
                sdp,
            }),
            RelayMessage::RequestOffer { .. } => None,
        }
    }

    pub fn into_request_offer(self) -> Option<RequestOfferMessage> {
        match self {
            RelayMessage::RequestOffer { from, timestamp } => {
                Some(RequestOfferMessage { from, timestamp })
            }
            _ => None,
        }
    }
}

/// Presence announcement published once on room entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestOfferMessage {
    pub from: ClientId,
    pub timestamp: u64,
}

impl From<RequestOfferMessage> for RelayMessage {
    fn from(msg: RequestOfferMessage) -> Self {
        RelayMessage::RequestOffer {
            from: msg.from,
            timestamp: msg.timestamp,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpKind {
    Offer,
    Answer,
}

impl fmt::Display for SdpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SdpKind::Offer => f.write_str("offer"),
            SdpKind::Answer => f.write_str("answer"),
        }
    }
}

/// A complete offer or answer addressed to one peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SdpMessage {
    pub from: ClientId,
    pub kind: SdpKind,
    pub sdp: String,
}

impl From<SdpMessage> for RelayMessage {
    fn from(msg: SdpMessage) -> Self {
        match msg.kind {
            SdpKind::Offer => RelayMessage::Offer {
                from: msg.from,
                sdp: msg.sdp,
            },
            SdpKind::Answer => RelayMessage::Answer {
                from: msg.from,
                sdp: msg.sdp,
            },
        }
    }
}

/// Session description as handed to and returned by a connection engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    pub kind: SdpKind,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Answer,
            sdp: sdp.into(),
        }
    }
}
