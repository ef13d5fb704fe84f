mod common;

use common::*;
use fe2o3_amqp_broker::{
    acceptor::ConnectionAcceptor,
    connection::{Error, OpenError},
    frames::amqp::{split_transfer, FrameBody},
};
use fe2o3_amqp_codec::primitives::Binary;
use fe2o3_amqp_types::{
    definitions::{self, AmqpError, ConnectionError, ErrorCondition, Handle},
    messaging::Message,
    performatives::{Close, End, Transfer},
};
use tokio_test::io::Builder;

fn acceptor() -> ConnectionAcceptor<MemoryRouter> {
    ConnectionAcceptor::new("broker", MemoryRouter::with_queues(&["queue"]))
}

#[tokio::test]
async fn sasl_header_is_answered_and_rejected() {
    let mock = Builder::new()
        .read(b"AMQP\x03\x01\x00\x00")
        .write(b"AMQP\x00\x01\x00\x00")
        .build();

    match acceptor().accept(mock).await {
        Err(OpenError::ProtocolHeaderMismatch(header)) => {
            assert_eq!(&header, b"AMQP\x03\x01\x00\x00")
        }
        other => panic!("unexpected {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn stream_closed_before_open() {
    let mock = Builder::new()
        .read(b"AMQP\x00\x01\x00\x00")
        .write(b"AMQP\x00\x01\x00\x00")
        .build();

    assert!(matches!(
        acceptor().accept(mock).await,
        Err(OpenError::ConnectionClosed)
    ));
}

#[tokio::test]
async fn open_advertises_configuration() {
    let acceptor = ConnectionAcceptor::builder()
        .container_id("configured")
        .max_frame_size(4096)
        .channel_max(7)
        .idle_time_out(30_000u32)
        .build(MemoryRouter::default());
    let (_handle, client) = connect(&acceptor).await;

    assert_eq!(client.open.container_id, "configured");
    assert_eq!(client.open.max_frame_size, 4096);
    assert_eq!(client.open.channel_max, 7);
    assert_eq!(client.open.idle_time_out, Some(30_000));
}

#[tokio::test]
async fn close_of_peer_is_answered() {
    let acceptor = acceptor();
    let (mut handle, mut client) = connect(&acceptor).await;
    client.begin(0).await;

    client.close().await;
    match client.recv().await {
        FrameBody::Close(Close { error: None }) => {}
        other => panic!("unexpected {:?}", other),
    }
    handle.on_close().await.unwrap();
    assert!(client.is_closed_by_broker().await);
    assert!(handle.next_event().await.is_none());
}

#[tokio::test]
async fn close_with_error_of_peer_is_returned() {
    let acceptor = acceptor();
    let (mut handle, mut client) = connect(&acceptor).await;

    let error = definitions::Error::new(AmqpError::InternalError, Some("bye".into()), None);
    client.send(0, Close::new(Some(error.clone()))).await;
    client.recv().await;

    match handle.on_close().await {
        Err(Error::Remote(remote)) => assert_eq!(remote, error),
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test]
async fn local_close_waits_for_peer() {
    let acceptor = acceptor();
    let (mut handle, mut client) = connect(&acceptor).await;

    let closing = tokio::spawn(async move { handle.close().await });
    match client.recv().await {
        FrameBody::Close(Close { error: None }) => {}
        other => panic!("unexpected {:?}", other),
    }
    client.close().await;
    closing.await.unwrap().unwrap();
}

#[tokio::test]
async fn local_close_with_error_is_returned() {
    let acceptor = acceptor();
    let (mut handle, mut client) = connect(&acceptor).await;

    let closing = tokio::spawn(async move {
        handle
            .close_with_error(definitions::Error::with_condition(
                ConnectionError::ConnectionForced,
            ))
            .await
    });
    match client.recv().await {
        FrameBody::Close(Close { error: Some(error) }) => assert_eq!(
            error.condition,
            ErrorCondition::from(ConnectionError::ConnectionForced)
        ),
        other => panic!("unexpected {:?}", other),
    }
    client.close().await;
    assert!(matches!(closing.await.unwrap(), Err(Error::Local(_))));
}

#[tokio::test]
async fn dropping_the_handle_closes_the_connection() {
    let acceptor = acceptor();
    let (handle, mut client) = connect(&acceptor).await;
    drop(handle);
    assert!(matches!(client.recv().await, FrameBody::Close(_)));
}

#[tokio::test]
async fn frame_on_unknown_channel_is_a_framing_error() {
    let acceptor = acceptor();
    let (mut handle, mut client) = connect(&acceptor).await;

    client.send(3, End { error: None }).await;
    match client.recv().await {
        FrameBody::Close(Close { error: Some(error) }) => assert_eq!(
            error.condition,
            ErrorCondition::from(ConnectionError::FramingError)
        ),
        other => panic!("unexpected {:?}", other),
    }

    // frames other than close are discarded until the peer closes
    client.send(0, begin(None)).await;
    client.close().await;
    assert!(matches!(handle.on_close().await, Err(Error::Local(_))));
    assert!(client.is_closed_by_broker().await);
}

#[tokio::test]
async fn oversized_frame_is_a_framing_error() {
    let acceptor = ConnectionAcceptor::builder()
        .container_id("small-frames")
        .max_frame_size(512)
        .build(MemoryRouter::with_queues(&["queue"]));
    let (_handle, mut client) = connect(&acceptor).await;
    client.begin(0).await;
    client.attach(0, relay_attach(0, accepted_only())).await;

    let body = "x".repeat(2048);
    let message = Message::new(body.as_str()).with_to("queue");
    client.transfer(0, 0, true, None, &message).await;

    match client.recv().await {
        FrameBody::Close(Close { error: Some(error) }) => assert_eq!(
            error.condition,
            ErrorCondition::from(ConnectionError::FramingError)
        ),
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test]
async fn frames_at_the_max_frame_size_are_reassembled() {
    let acceptor = ConnectionAcceptor::builder()
        .container_id("small-frames")
        .max_frame_size(512)
        .build(MemoryRouter::with_queues(&["queue"]));
    let (_handle, mut client) = connect(&acceptor).await;
    assert_eq!(client.open.max_frame_size, 512);
    client.begin(0).await;
    client.attach(0, relay_attach(0, accepted_only())).await;

    let body = "x".repeat(2048);
    let message = Message::new(body.as_str()).with_to("queue");
    let mut transfer = Transfer::new(Handle(0));
    transfer.delivery_id = Some(0);
    transfer.delivery_tag = Some(Binary::from(vec![0]));
    transfer.message_format = Some(0);
    transfer.settled = Some(true);
    let frames = split_transfer(transfer, message.encode().unwrap(), 512).unwrap();
    assert_eq!(frames.len(), 5);

    for (performative, payload) in frames {
        client
            .send(
                0,
                FrameBody::Transfer {
                    performative,
                    payload,
                },
            )
            .await;
    }

    let received = acceptor.router().wait_for("queue", 1).await;
    assert_eq!(received[0].body, message.body);
}

#[tokio::test]
async fn second_open_is_illegal() {
    let acceptor = acceptor();
    let (_handle, mut client) = connect(&acceptor).await;

    client
        .send(0, fe2o3_amqp_types::performatives::Open::new("again"))
        .await;
    match client.recv().await {
        FrameBody::Close(Close { error: Some(error) }) => assert_eq!(
            error.condition,
            ErrorCondition::from(AmqpError::IllegalState)
        ),
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test]
async fn end_of_peer_is_answered() {
    let acceptor = acceptor();
    let (_handle, mut client) = connect(&acceptor).await;
    let begin = client.begin(0).await;
    assert_eq!(begin.remote_channel, Some(0));

    client.send(0, End { error: None }).await;
    assert!(matches!(client.recv().await, FrameBody::End(End { error: None })));

    // the channel can be reused
    let begin = client.begin(0).await;
    assert_eq!(begin.remote_channel, Some(0));
}
