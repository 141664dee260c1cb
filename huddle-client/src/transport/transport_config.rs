use huddle_core::IceServerConfig;

/// ICE servers handed to every peer connection.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub ice_servers: Vec<IceServerConfig>,
}

impl TransportConfig {
    /// Host candidates only; enough for peers on one machine or LAN.
    pub fn local_only() -> Self {
        Self {
            ice_servers: Vec::new(),
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            ice_servers: vec![
                IceServerConfig::stun("stun:stun.l.google.com:19302"),
                IceServerConfig::stun("stun:stun1.l.google.com:19302"),
                IceServerConfig::stun("stun:stun2.l.google.com:19302"),
            ],
        }
    }
}
