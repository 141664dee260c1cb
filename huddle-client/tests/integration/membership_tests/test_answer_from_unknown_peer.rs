use huddle_client::{MemoryRelay, RelayChannel};
use huddle_core::{ClientId, RelayMessage};
use std::sync::Arc;

use crate::integration::{create_test_session, init_tracing, room};
use crate::utils::{ManualClock, MockNetwork, SIGNAL_TIMEOUT_MS, settle, wait_until_empty};

#[tokio::test]
async fn test_answer_from_unknown_peer_is_dropped() {
    init_tracing();

    let relay = MemoryRelay::new();
    let network = MockNetwork::new();
    let clock = ManualClock::at(100);

    let a = create_test_session("a", Arc::new(relay.clone()), &network, &clock).await;
    let inbox = room().direct(&a.id);

    relay
        .publish(
            &inbox,
            RelayMessage::Answer {
                from: ClientId::from("ghost"),
                sdp: "v=0\r\n".to_owned(),
            },
        )
        .await
        .unwrap();

    wait_until_empty(&relay, &inbox, SIGNAL_TIMEOUT_MS)
        .await
        .expect("the answer should be consumed");

    settle().await;
    assert!(a.handle.snapshot().await.unwrap().is_empty());
    assert_eq!(a.observer.failure_count().await, 0);
    assert!(a.handle.is_running());

    a.stop().await;
}

#[tokio::test]
async fn test_non_sdp_direct_message_is_removed() {
    init_tracing();

    let relay = MemoryRelay::new();
    let network = MockNetwork::new();
    let clock = ManualClock::at(100);

    let a = create_test_session("a", Arc::new(relay.clone()), &network, &clock).await;
    let inbox = room().direct(&a.id);

    relay
        .publish(
            &inbox,
            RelayMessage::RequestOffer {
                from: ClientId::from("b"),
                timestamp: 500,
            },
        )
        .await
        .unwrap();

    wait_until_empty(&relay, &inbox, SIGNAL_TIMEOUT_MS)
        .await
        .expect("the message should be removed");

    // A request on a direct address never starts a negotiation.
    settle().await;
    assert!(a.handle.snapshot().await.unwrap().is_empty());
    assert_eq!(a.engines.created_count(), 0);

    a.stop().await;
}
