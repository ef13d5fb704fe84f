mod common;

use std::sync::Arc;

use common::*;
use fe2o3_amqp_broker::{acceptor::ConnectionAcceptor, frames::amqp::FrameBody};
use fe2o3_amqp_types::{
    definitions::{ErrorCondition, LinkError, SessionError},
    messaging::{DeliveryState, Message},
    performatives::{End, Flow},
};
use tokio::sync::Semaphore;

#[tokio::test]
async fn transfer_beyond_credit_detaches() {
    let gate = Arc::new(Semaphore::new(0));
    let acceptor = ConnectionAcceptor::builder()
        .container_id("broker")
        .link_credit(1)
        .build(MemoryRouter::with_queues(&["queue"]).gated(gate.clone()));
    let (_handle, mut client) = connect(&acceptor).await;
    client.begin(0).await;
    let (_, flow) = client.attach(0, relay_attach(0, accepted_only())).await;
    assert_eq!(expect_link_credit(flow, 0), 1);

    // the first delivery holds the only credit while it is routed
    let message = Message::new("hello").with_to("queue");
    client.transfer(0, 0, true, None, &message).await;
    client.transfer(0, 0, true, None, &message).await;

    let error = expect_detach(client.recv().await, 0);
    assert_eq!(
        error.condition,
        ErrorCondition::from(LinkError::TransferLimitExceeded)
    );
    gate.add_permits(1);
}

#[tokio::test]
async fn credit_is_topped_up() {
    let acceptor = ConnectionAcceptor::builder()
        .container_id("broker")
        .link_credit(4)
        .build(MemoryRouter::with_queues(&["queue"]));
    let (_handle, mut client) = connect(&acceptor).await;
    client.begin(0).await;
    client.attach(0, fixed_attach(0, "queue", accepted_only())).await;

    let message = Message::new("hello");
    let mut ids = Vec::new();
    for _ in 0..3 {
        ids.push(client.transfer(0, 0, false, None, &message).await);
    }

    let mut settled = Vec::new();
    let mut credit = None;
    while settled.len() < 3 || credit.is_none() {
        match client.recv().await {
            FrameBody::Disposition(disposition) => {
                assert!(matches!(disposition.state, Some(DeliveryState::Accepted(_))));
                settled.push(disposition.first);
            }
            FrameBody::Flow(flow) => credit = Some(expect_link_credit(FrameBody::Flow(flow), 0)),
            other => panic!("unexpected {:?}", other),
        }
    }
    assert_eq!(settled, ids);
    assert!(credit.unwrap_or_default() > 1);
}

#[tokio::test]
async fn transfer_beyond_incoming_window_ends_session() {
    let acceptor = ConnectionAcceptor::builder()
        .container_id("broker")
        .incoming_window(1)
        .build(MemoryRouter::with_queues(&["queue"]));
    let (_handle, mut client) = connect(&acceptor).await;
    let begin = client.begin(0).await;
    assert_eq!(begin.incoming_window, 1);
    client.attach(0, relay_attach(0, accepted_only())).await;

    let message = Message::new("hello").with_to("queue");
    client.transfer(0, 0, true, None, &message).await;
    client.transfer(0, 0, true, None, &message).await;

    match client.recv().await {
        FrameBody::End(End { error: Some(error) }) => assert_eq!(
            error.condition,
            ErrorCondition::from(SessionError::WindowViolation)
        ),
        other => panic!("unexpected {:?}", other),
    }

    // the connection survives the session
    client.send(0, End { error: None }).await;
    let begin = client.begin(1).await;
    assert_eq!(begin.remote_channel, Some(1));
}

#[tokio::test]
async fn echo_is_answered_with_session_state() {
    let acceptor = ConnectionAcceptor::new("broker", MemoryRouter::default());
    let (_handle, mut client) = connect(&acceptor).await;
    let begin = client.begin(0).await;

    client
        .send(
            0,
            Flow {
                next_incoming_id: Some(0),
                incoming_window: 10,
                next_outgoing_id: 0,
                outgoing_window: 10,
                echo: true,
                ..Default::default()
            },
        )
        .await;
    match client.recv().await {
        FrameBody::Flow(flow) => {
            assert_eq!(flow.handle, None);
            assert_eq!(flow.next_incoming_id, Some(0));
            assert_eq!(flow.incoming_window, begin.incoming_window);
            assert!(!flow.echo);
        }
        other => panic!("unexpected {:?}", other),
    }
}
