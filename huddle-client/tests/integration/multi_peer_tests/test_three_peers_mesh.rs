use huddle_client::{MemoryRelay, NegotiationPhase, NegotiationRole, RelayChannel};
use std::sync::Arc;

use crate::integration::{create_test_session, init_tracing};
use crate::utils::{CONNECTION_TIMEOUT_MS, ManualClock, MockNetwork, settle};

#[tokio::test]
async fn test_three_peers_join() {
    init_tracing();

    let relay: Arc<dyn RelayChannel> = Arc::new(MemoryRelay::new());
    let network = MockNetwork::new();
    let clock = ManualClock::at(10);

    let p1 = create_test_session("p1", relay.clone(), &network, &clock).await;
    clock.set(20);
    let p2 = create_test_session("p2", relay.clone(), &network, &clock).await;
    clock.set(30);
    let p3 = create_test_session("p3", relay.clone(), &network, &clock).await;

    for (peer, name) in [(&p1, "1"), (&p2, "2"), (&p3, "3")] {
        assert!(
            peer.observer.wait_for_connected(2, CONNECTION_TIMEOUT_MS).await,
            "Peer {} should connect to both others",
            name
        );
    }
    settle().await;

    for peer in [&p1, &p2, &p3] {
        let snapshot = peer.handle.snapshot().await.unwrap();
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.iter().all(|p| p.phase == NegotiationPhase::Connected));
        assert_eq!(peer.observer.failure_count().await, 0);
        assert_eq!(peer.engines.created_count(), 2);
    }

    // Whoever was in the room first makes the offer.
    let p1_view = p1.handle.snapshot().await.unwrap();
    assert!(p1_view.iter().all(|p| p.role == NegotiationRole::Initiator));
    let p3_view = p3.handle.snapshot().await.unwrap();
    assert!(p3_view.iter().all(|p| p.role == NegotiationRole::Responder));

    for peer in [&p1, &p2, &p3] {
        for other in [&p1, &p2, &p3] {
            if peer.id != other.id {
                assert_eq!(peer.observer.remote_sources_from(&other.id).await, 1);
            }
        }
    }

    p1.stop().await;
    p2.stop().await;
    p3.stop().await;
}
