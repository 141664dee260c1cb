use huddle_client::{MemoryRelay, NegotiationPhase, NegotiationRole, RelayChannel};
use huddle_core::{ClientId, RelayMessage};
use std::sync::Arc;

use crate::integration::{create_test_session, init_tracing, room};
use crate::utils::{
    CONNECTION_TIMEOUT_MS, ManualClock, MockNetwork, SIGNAL_TIMEOUT_MS, settle, wait_for_messages,
    wait_for_phase,
};

#[tokio::test]
async fn test_self_and_stale_requests() {
    init_tracing();

    let relay = MemoryRelay::new();
    let network = MockNetwork::new();
    let clock = ManualClock::at(10);

    // Left behind by someone who is long gone.
    relay
        .publish(
            &room().broadcast(),
            RelayMessage::RequestOffer {
                from: ClientId::from("old"),
                timestamp: 10,
            },
        )
        .await
        .unwrap();

    clock.set(100);
    let a = create_test_session("a", Arc::new(relay.clone()), &network, &clock).await;

    // Live, but stamped before A entered.
    relay
        .publish(
            &room().broadcast(),
            RelayMessage::RequestOffer {
                from: ClientId::from("late"),
                timestamp: 99,
            },
        )
        .await
        .unwrap();

    settle().await;
    assert!(a.handle.snapshot().await.unwrap().is_empty());
    assert_eq!(a.engines.created_count(), 0);

    relay
        .publish(
            &room().broadcast(),
            RelayMessage::RequestOffer {
                from: ClientId::from("b"),
                timestamp: 150,
            },
        )
        .await
        .unwrap();

    let b = ClientId::from("b");
    let peer = wait_for_phase(&a.handle, &b, NegotiationPhase::AwaitingAnswer, CONNECTION_TIMEOUT_MS)
        .await
        .expect("A should offer to B");
    assert_eq!(peer.role, NegotiationRole::Initiator);

    let offers = wait_for_messages(&relay, &room().direct(&b), 1, SIGNAL_TIMEOUT_MS)
        .await
        .unwrap();
    assert!(matches!(&offers[0], RelayMessage::Offer { from, .. } if from == &a.id));

    assert_eq!(a.handle.snapshot().await.unwrap().len(), 1);
    assert!(relay.messages(&room().direct(&ClientId::from("old"))).is_empty());
    assert!(relay.messages(&room().direct(&ClientId::from("late"))).is_empty());

    a.stop().await;
}
