use async_trait::async_trait;
use huddle_core::ClientId;
use tracing::{error, info};

use crate::error::NegotiationError;
use crate::media::RemoteMediaSource;

/// What a running session reports to its owner.
#[async_trait]
pub trait SessionObserver: Send + Sync + 'static {
    /// Called once per peer, when its media first arrives.
    async fn on_remote_source(&self, peer_id: ClientId, source: RemoteMediaSource);

    async fn on_connected(&self, peer_id: ClientId);

    async fn on_negotiation_failed(&self, peer_id: ClientId, error: NegotiationError);
}

/// Observer that only writes to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingObserver;

#[async_trait]
impl SessionObserver for LoggingObserver {
    async fn on_remote_source(&self, peer_id: ClientId, source: RemoteMediaSource) {
        info!(
            "Remote {:?} source {} from {}",
            source.kind, source.stream_id, peer_id
        );
    }

    async fn on_connected(&self, peer_id: ClientId) {
        info!("Connected to {}", peer_id);
    }

    async fn on_negotiation_failed(&self, peer_id: ClientId, error: NegotiationError) {
        error!("Negotiation with {} failed: {}", peer_id, error);
    }
}
