mod client_id;
mod media;
mod room;
mod signaling;

pub use client_id::ClientId;
pub use media::{MediaConstraints, MediaKind};
pub use room::{RelayAddress, RoomName};
pub use signaling::{
    IceServerConfig, RelayMessage, RequestOfferMessage, SdpKind, SdpMessage, SessionDescription,
};
