use huddle_client::{
    EngineStep, MemoryRelay, NegotiationError, NegotiationPhase, RelayChannel, SessionConfig,
};
use std::sync::Arc;

use crate::integration::{ROOM, create_session_with, create_test_session, init_tracing};
use crate::utils::{CONNECTION_TIMEOUT_MS, ManualClock, MockNetwork, wait_for_phase};

#[tokio::test]
async fn test_engine_failure_only_affects_that_peer() {
    init_tracing();

    let store = MemoryRelay::new();
    let relay: Arc<dyn RelayChannel> = Arc::new(store.clone());
    let network = MockNetwork::new();
    let clock = ManualClock::at(10);

    let a = create_session_with(
        "a",
        SessionConfig::new(ROOM),
        relay.clone(),
        network.factory("a").fail_for("b", EngineStep::CreateOffer),
        &clock,
    )
    .await;
    clock.set(20);
    let b = create_test_session("b", relay.clone(), &network, &clock).await;

    wait_for_phase(&a.handle, &b.id, NegotiationPhase::Failed, CONNECTION_TIMEOUT_MS)
        .await
        .expect("A's machine for B should fail");
    assert!(a.observer.wait_for_failure(&b.id, CONNECTION_TIMEOUT_MS).await);

    let failures = a.observer.failures_for(&b.id).await;
    assert_eq!(failures.len(), 1);
    assert!(matches!(
        failures[0],
        NegotiationError::Engine {
            step: EngineStep::CreateOffer,
            ..
        }
    ));

    clock.set(30);
    let c = create_test_session("c", relay.clone(), &network, &clock).await;

    wait_for_phase(&a.handle, &c.id, NegotiationPhase::Connected, CONNECTION_TIMEOUT_MS)
        .await
        .expect("A should still connect to C");
    wait_for_phase(&b.handle, &c.id, NegotiationPhase::Connected, CONNECTION_TIMEOUT_MS)
        .await
        .expect("B should connect to C");
    assert!(c.observer.wait_for_connected(2, CONNECTION_TIMEOUT_MS).await);

    // The failed machine stays failed and is not retried.
    let snapshot = a.handle.snapshot().await.unwrap();
    assert_eq!(snapshot.len(), 2);
    assert_eq!(snapshot[0].peer_id, b.id);
    assert_eq!(snapshot[0].phase, NegotiationPhase::Failed);
    assert!(b.handle.snapshot().await.unwrap().iter().all(|p| p.peer_id != a.id));

    a.stop().await;
    b.stop().await;
    c.stop().await;
}

#[tokio::test]
async fn test_attach_failure_leaves_registry_empty() {
    init_tracing();

    let store = MemoryRelay::new();
    let relay: Arc<dyn RelayChannel> = Arc::new(store.clone());
    let network = MockNetwork::new();
    let clock = ManualClock::at(10);

    let a = create_session_with(
        "a",
        SessionConfig::new(ROOM),
        relay.clone(),
        network.factory("a").fail_on(EngineStep::AttachLocalSource),
        &clock,
    )
    .await;
    clock.set(20);
    let b = create_test_session("b", relay.clone(), &network, &clock).await;

    assert!(a.observer.wait_for_failure(&b.id, CONNECTION_TIMEOUT_MS).await);
    assert!(a.handle.snapshot().await.unwrap().is_empty());
    assert_eq!(network.closed_engines(), 1);

    a.stop().await;
    b.stop().await;
}
