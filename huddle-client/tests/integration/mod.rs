
use huddle_client::{RelayChannel, SessionConfig, SessionCoordinator, SessionDeps, SessionHandle};
use huddle_core::{ClientId, RoomName};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::Level;

use crate::utils::{ManualClock, MockEngineFactory, MockNetwork, RecordingObserver};

pub const ROOM: &str = "demo";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// One running session plus what the test needs to look at it.
pub struct TestParticipant {
    pub id: ClientId,
    pub handle: SessionHandle,
    pub observer: RecordingObserver,
    pub engines: MockEngineFactory,
    pub task: JoinHandle<()>,
}

impl TestParticipant {
    pub async fn stop(self) {
        self.handle.shutdown().await;
        let _ = self.task.await;
    }
}

pub async fn create_test_session(
    id: &str,
    relay: Arc<dyn RelayChannel>,
    network: &MockNetwork,
    clock: &ManualClock,
) -> TestParticipant {
    create_session_with(id, SessionConfig::new(ROOM), relay, network.factory(id), clock).await
}

pub async fn create_session_with(
    id: &str,
    config: SessionConfig,
    relay: Arc<dyn RelayChannel>,
    engines: MockEngineFactory,
    clock: &ManualClock,
) -> TestParticipant {
    let observer = RecordingObserver::new();
    let deps = SessionDeps::new(relay)
        .with_engines(Arc::new(engines.clone()))
        .with_observer(Arc::new(observer.clone()))
        .with_clock(Arc::new(clock.clone()));

    let (handle, coordinator) = SessionCoordinator::start(config, ClientId::from(id), deps)
        .await
        .expect("Failed to start session");

    let task = tokio::spawn(async move {
        coordinator.run().await;
    });

    TestParticipant {
        id: ClientId::from(id),
        handle,
        observer,
        engines,
        task,
    }
}

pub fn room() -> RoomName {
    RoomName::new(ROOM)
}
