mod common;

use common::*;
use fe2o3_amqp_broker::{
    acceptor::ConnectionAcceptor,
    connection::SendError,
    frames::amqp::FrameBody,
    ConnectionEvent, ConnectionHandle, LinkRef,
};
use fe2o3_amqp_types::{
    definitions::{AmqpError, ErrorCondition, Role},
    messaging::{Accepted, DeliveryState, Message},
    performatives::{Disposition, End, Flow, Transfer},
};

async fn next_event(handle: &mut ConnectionHandle) -> ConnectionEvent {
    tokio::time::timeout(TIMEOUT, handle.next_event())
        .await
        .expect("no event in time")
        .expect("event loop stopped")
}

/// Attaches a link receiving from `queue` and returns its reference
async fn attach_receiver(handle: &mut ConnectionHandle, client: &mut TestClient) -> LinkRef {
    client.begin(0).await;
    client.send(0, receiver_attach(0, "queue")).await;
    match client.recv().await {
        FrameBody::Attach(attach) => {
            assert_eq!(attach.role, Role::Sender);
            assert_eq!(attach.initial_delivery_count, Some(0));
        }
        other => panic!("unexpected {:?}", other),
    }
    match next_event(handle).await {
        ConnectionEvent::SenderAttached {
            link,
            name,
            address,
        } => {
            assert_eq!(name, "queue-receiver");
            assert_eq!(address, "queue");
            link
        }
        other => panic!("unexpected {:?}", other),
    }
}

fn accept(first: u32) -> Disposition {
    Disposition {
        role: Role::Receiver,
        first,
        last: None,
        settled: true,
        state: Some(DeliveryState::Accepted(Accepted {})),
        batchable: false,
    }
}

async fn recv_transfer(client: &mut TestClient) -> (Transfer, bytes::Bytes) {
    match client.recv().await {
        FrameBody::Transfer {
            performative,
            payload,
        } => (performative, payload),
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test]
async fn message_is_sent_and_settled_by_peer() {
    let acceptor = ConnectionAcceptor::new("broker", MemoryRouter::with_queues(&["queue"]));
    let (mut handle, mut client) = connect(&acceptor).await;
    let link = attach_receiver(&mut handle, &mut client).await;

    client.send(0, link_flow(0, 0, 10)).await;
    assert_eq!(
        next_event(&mut handle).await,
        ConnectionEvent::Credit { link, credit: 10 }
    );

    let message = Message::new("outgoing");
    let tag = handle.send(link, message.clone(), false).await.unwrap();
    let (transfer, payload) = recv_transfer(&mut client).await;
    assert_eq!(transfer.delivery_id, Some(0));
    assert_eq!(transfer.delivery_tag, Some(tag.clone()));
    assert_eq!(transfer.settled, Some(false));
    assert_eq!(Message::decode(&payload).unwrap(), message);

    client.send(0, accept(0)).await;
    assert_eq!(
        next_event(&mut handle).await,
        ConnectionEvent::Disposition {
            link,
            delivery_tag: tag,
            settled: true,
            state: Some(DeliveryState::Accepted(Accepted {})),
        }
    );

    // a settled delivery cannot be settled again
    client.send(0, accept(0)).await;
    match client.recv().await {
        FrameBody::End(End { error: Some(error) }) => assert_eq!(
            error.condition,
            ErrorCondition::from(AmqpError::IllegalState)
        ),
        other => panic!("unexpected {:?}", other),
    }
    assert!(matches!(
        next_event(&mut handle).await,
        ConnectionEvent::SenderDetached { error: Some(_), .. }
    ));
}

#[tokio::test]
async fn message_waits_for_credit() {
    let acceptor = ConnectionAcceptor::new("broker", MemoryRouter::with_queues(&["queue"]));
    let (mut handle, mut client) = connect(&acceptor).await;
    let link = attach_receiver(&mut handle, &mut client).await;

    let tag = handle
        .send(link, Message::new("queued"), true)
        .await
        .unwrap();

    client.send(0, link_flow(0, 0, 1)).await;
    let (transfer, _) = recv_transfer(&mut client).await;
    assert_eq!(transfer.delivery_tag, Some(tag));
    assert_eq!(transfer.settled, Some(true));
    assert_eq!(
        next_event(&mut handle).await,
        ConnectionEvent::Credit { link, credit: 0 }
    );
}

#[tokio::test]
async fn drain_without_messages_consumes_credit() {
    let acceptor = ConnectionAcceptor::new("broker", MemoryRouter::with_queues(&["queue"]));
    let (mut handle, mut client) = connect(&acceptor).await;
    attach_receiver(&mut handle, &mut client).await;

    let mut flow = link_flow(0, 0, 5);
    flow.drain = true;
    client.send(0, flow).await;
    match client.recv().await {
        FrameBody::Flow(Flow {
            delivery_count: Some(5),
            link_credit: Some(0),
            ..
        }) => {}
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test]
async fn large_message_is_split_across_frames() {
    let acceptor = ConnectionAcceptor::builder()
        .container_id("broker")
        .max_frame_size(512)
        .build(MemoryRouter::with_queues(&["queue"]));
    let (mut handle, mut client) = connect(&acceptor).await;
    let link = attach_receiver(&mut handle, &mut client).await;
    client.send(0, link_flow(0, 0, 1)).await;

    let body = "x".repeat(2000);
    let message = Message::new(body.as_str());
    handle.send(link, message.clone(), false).await.unwrap();

    let mut payload = Vec::new();
    let mut frames = 0;
    loop {
        let (transfer, chunk) = recv_transfer(&mut client).await;
        if frames == 0 {
            assert_eq!(transfer.delivery_id, Some(0));
        }
        frames += 1;
        payload.extend_from_slice(&chunk);
        if !transfer.more {
            break;
        }
    }
    assert!(frames > 1);
    assert_eq!(Message::decode(&payload).unwrap(), message);
}

#[tokio::test]
async fn split_message_stays_within_the_incoming_window() {
    let acceptor = ConnectionAcceptor::builder()
        .container_id("broker")
        .max_frame_size(512)
        .build(MemoryRouter::with_queues(&["queue"]));
    let (mut handle, mut client) = connect(&acceptor).await;
    let link = attach_receiver(&mut handle, &mut client).await;

    let mut flow = link_flow(0, 0, 1);
    flow.incoming_window = 1;
    client.send(0, flow).await;
    assert_eq!(
        next_event(&mut handle).await,
        ConnectionEvent::Credit { link, credit: 1 }
    );

    let body = "x".repeat(2000);
    let message = Message::new(body.as_str());
    handle.send(link, message.clone(), false).await.unwrap();

    let (first, chunk) = recv_transfer(&mut client).await;
    assert!(first.more);
    assert_eq!(first.delivery_id, Some(0));
    let mut payload = chunk.to_vec();
    assert!(
        tokio::time::timeout(std::time::Duration::from_millis(200), client.recv_frame())
            .await
            .is_err(),
        "a frame was sent beyond the incoming window"
    );

    // the window opens again, no new credit is needed to finish the delivery
    let mut flow = link_flow(0, 1, 0);
    flow.next_incoming_id = Some(1);
    client.send(0, flow).await;

    loop {
        let (transfer, chunk) = recv_transfer(&mut client).await;
        assert_eq!(transfer.delivery_id, None);
        payload.extend_from_slice(&chunk);
        if !transfer.more {
            break;
        }
    }
    assert_eq!(Message::decode(&payload).unwrap(), message);
}

#[tokio::test]
async fn detach_reports_unsettled_deliveries() {
    let acceptor = ConnectionAcceptor::new("broker", MemoryRouter::with_queues(&["queue"]));
    let (mut handle, mut client) = connect(&acceptor).await;
    let link = attach_receiver(&mut handle, &mut client).await;
    client.send(0, link_flow(0, 0, 1)).await;
    next_event(&mut handle).await;

    let sent = handle.send(link, Message::new("a"), false).await.unwrap();
    let queued = handle.send(link, Message::new("b"), false).await.unwrap();
    recv_transfer(&mut client).await;

    client.detach(0, 0).await;
    assert!(matches!(client.recv().await, FrameBody::Detach(_)));
    assert_eq!(
        next_event(&mut handle).await,
        ConnectionEvent::SenderDetached {
            link,
            unsettled: vec![sent, queued],
            error: None,
        }
    );

    assert!(matches!(
        handle.send(link, Message::new("c"), false).await,
        Err(SendError::LinkNotFound(_))
    ));
}

#[tokio::test]
async fn unknown_source_is_refused() {
    let acceptor = ConnectionAcceptor::new("broker", MemoryRouter::default());
    let (_handle, mut client) = connect(&acceptor).await;
    client.begin(0).await;

    let (attach, detach) = client.attach(0, receiver_attach(0, "queue")).await;
    assert!(attach.source.is_none());
    let error = expect_detach(detach, 0);
    assert_eq!(error.condition, ErrorCondition::from(AmqpError::NotFound));
}
