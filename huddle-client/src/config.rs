use huddle_core::{MediaConstraints, RoomName};

use crate::transport::TransportConfig;

/// How a session reacts when a peer it already initiated towards sends
/// its own offer (both sides initiated at the same time).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GlarePolicy {
    /// Drop the incoming offer; both machines wait for an answer forever.
    #[default]
    Ignore,
    /// The side with the lexicographically smaller id drops its own offer
    /// and answers; the larger side drops the incoming offer.
    SmallerIdYields,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub room: RoomName,
    pub transport: TransportConfig,
    pub constraints: MediaConstraints,
    pub glare_policy: GlarePolicy,
}

impl SessionConfig {
    pub fn new(room: impl Into<String>) -> Self {
        Self {
            room: RoomName::new(room),
            ..Default::default()
        }
    }

    pub fn with_transport(mut self, transport: TransportConfig) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_constraints(mut self, constraints: MediaConstraints) -> Self {
        self.constraints = constraints;
        self
    }

    pub fn with_glare_policy(mut self, policy: GlarePolicy) -> Self {
        self.glare_policy = policy;
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            room: RoomName::new("default"),
            transport: TransportConfig::default(),
            constraints: MediaConstraints::default(),
            glare_policy: GlarePolicy::default(),
        }
    }
}
