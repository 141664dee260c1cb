use huddle_core::ClientId;
use tokio::sync::{mpsc, oneshot};

use crate::error::SessionError;
use crate::negotiation::PeerSnapshot;

/// Requests the session loop accepts from its handles.
#[derive(Debug)]
pub enum SessionCommand {
    /// Current state of every tracked peer, ordered by peer id.
    Snapshot {
        reply: oneshot::Sender<Vec<PeerSnapshot>>,
    },

    /// Leave the event loop and close all engines.
    Shutdown,
}

/// Cloneable access to a running session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    local_id: ClientId,
    command_tx: mpsc::Sender<SessionCommand>,
}

impl SessionHandle {
    pub(crate) fn new(local_id: ClientId, command_tx: mpsc::Sender<SessionCommand>) -> Self {
        Self {
            local_id,
            command_tx,
        }
    }

    pub fn local_id(&self) -> &ClientId {
        &self.local_id
    }

    pub async fn snapshot(&self) -> Result<Vec<PeerSnapshot>, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.command_tx
            .send(SessionCommand::Snapshot { reply })
            .await
            .map_err(|_| SessionError::Stopped)?;
        rx.await.map_err(|_| SessionError::Stopped)
    }

    /// No-op when the loop already stopped.
    pub async fn shutdown(&self) {
        let _ = self.command_tx.send(SessionCommand::Shutdown).await;
    }

    pub fn is_running(&self) -> bool {
        !self.command_tx.is_closed()
    }
}
