use anyhow::Result;
use async_trait::async_trait;
use huddle_core::SessionDescription;
use tokio::sync::mpsc;

use crate::media::LocalMediaSource;
use crate::transport::{EngineTag, TransportEvent};

/// One peer connection as the negotiation machine sees it.
///
/// Calls are awaited one at a time by the owning machine. Asynchronous
/// outcomes (candidates, gathering completion, remote media) are sent as
/// [`TransportEvent`]s on the channel given to the factory.
#[async_trait]
pub trait ConnectionEngine: Send + Sync {
    async fn attach_local_source(&self, source: &LocalMediaSource) -> Result<()>;

    async fn create_offer(&self) -> Result<SessionDescription>;

    async fn create_answer(&self) -> Result<SessionDescription>;

    async fn set_local_description(&self, description: SessionDescription) -> Result<()>;

    async fn set_remote_description(&self, description: SessionDescription) -> Result<()>;

    /// Current local description, including every gathered candidate.
    async fn local_description(&self) -> Option<SessionDescription>;

    async fn close(&self) -> Result<()>;
}

#[async_trait]
pub trait EngineFactory: Send + Sync {
    async fn create(
        &self,
        tag: EngineTag,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<Box<dyn ConnectionEngine>>;
}
