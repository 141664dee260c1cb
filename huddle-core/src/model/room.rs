use crate::model::client_id::ClientId;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Serialize, Deserialize, Clone, Hash, Eq, PartialEq)]
#[serde(transparent)]
pub struct RoomName(String);

impl RoomName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn broadcast(&self) -> RelayAddress {
        RelayAddress::Broadcast { room: self.clone() }
    }

    pub fn direct(&self, client: &ClientId) -> RelayAddress {
        RelayAddress::Direct {
            room: self.clone(),
            client: client.clone(),
        }
    }
}

impl fmt::Display for RoomName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Location of a message log on the relay.
///
/// `Broadcast` is an append-only log read by every room member, `Direct`
/// is one client's mailbox whose entries are removed once consumed.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub enum RelayAddress {
    Broadcast { room: RoomName },
    Direct { room: RoomName, client: ClientId },
}

impl RelayAddress {
    pub fn room(&self) -> &RoomName {
        match self {
            RelayAddress::Broadcast { room } | RelayAddress::Direct { room, .. } => room,
        }
    }

    pub fn is_broadcast(&self) -> bool {
        matches!(self, RelayAddress::Broadcast { .. })
    }
}

impl fmt::Display for RelayAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayAddress::Broadcast { room } => write!(f, "rooms/{}/broadcast", room),
            RelayAddress::Direct { room, client } => {
                write!(f, "rooms/{}/users/{}/direct", room, client)
            }
        }
    }
}
