#![allow(dead_code)]

use std::{collections::HashMap, sync::Arc, time::Duration};

use fe2o3_amqp_broker::{
    acceptor::ConnectionAcceptor,
    frames::amqp::{Frame, FrameBody},
    router::{Resolution, Router, RoutingTarget},
    transport::Transport,
    ConnectionHandle,
};
use fe2o3_amqp_codec::primitives::{Array, Binary, Symbol};
use fe2o3_amqp_types::{
    definitions::{
        self, ErrorCondition, Handle, ReceiverSettleMode, Role, SenderSettleMode,
    },
    messaging::{
        outcome_symbols, Accepted, DeliveryState, Message, Outcome, Source, Target,
        TargetArchetype,
    },
    performatives::{Attach, Begin, Close, Detach, Disposition, Flow, Open, Transfer},
    transaction::{
        Coordinator, Declare, Discharge, TransactionId, TransactionalState, TxnCapability,
    },
};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt, DuplexStream},
    sync::Semaphore,
};

pub const TIMEOUT: Duration = Duration::from_secs(5);

/// Queues held in memory. Forwarding can be held back with a gate.
#[derive(Debug, Default)]
pub struct MemoryRouter {
    queues: Mutex<HashMap<String, Vec<Message>>>,
    outcome: Mutex<Option<Outcome>>,
    gate: Option<Arc<Semaphore>>,
}

impl MemoryRouter {
    pub fn with_queues(names: &[&str]) -> Self {
        let router = Self::default();
        for name in names {
            router.queues.lock().insert(name.to_string(), Vec::new());
        }
        router
    }

    /// Every forward waits for a permit of the gate
    pub fn gated(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Answers every forward with the outcome instead of queueing the message
    pub fn answer_with(&self, outcome: Outcome) {
        *self.outcome.lock() = Some(outcome);
    }

    pub fn received(&self, name: &str) -> Vec<Message> {
        self.queues.lock().get(name).cloned().unwrap_or_default()
    }

    /// Waits until the queue holds `count` messages
    pub async fn wait_for(&self, name: &str, count: usize) -> Vec<Message> {
        let poll = async {
            loop {
                let received = self.received(name);
                if received.len() >= count {
                    return received;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        };
        tokio::time::timeout(TIMEOUT, poll)
            .await
            .expect("queue did not fill up in time")
    }
}

impl Router for MemoryRouter {
    async fn resolve(&self, address: &str) -> Resolution {
        match self.queues.lock().contains_key(address) {
            true => Resolution::Routed(RoutingTarget::new(address)),
            false => Resolution::NotFound,
        }
    }

    async fn forward(&self, target: &RoutingTarget, message: Message) -> Outcome {
        if let Some(gate) = &self.gate {
            gate.acquire().await.expect("gate closed").forget();
        }
        if let Some(outcome) = self.outcome.lock().clone() {
            return outcome;
        }
        match self.queues.lock().get_mut(target.name()) {
            Some(queue) => {
                queue.push(message);
                Outcome::Accepted(Accepted {})
            }
            None => Outcome::Rejected(Default::default()),
        }
    }
}

/// The peer side of an accepted connection, speaking raw frames
pub struct TestClient {
    transport: Transport<DuplexStream>,
    /// Open sent by the broker
    pub open: Open,
    next_delivery_id: u32,
}

impl TestClient {
    pub async fn open(mut io: DuplexStream) -> Self {
        io.write_all(b"AMQP\x00\x01\x00\x00").await.unwrap();
        let mut header = [0u8; 8];
        io.read_exact(&mut header).await.unwrap();
        assert_eq!(&header, b"AMQP\x00\x01\x00\x00");

        let transport = Transport::bind(io, u32::MAX as usize);
        let mut client = Self {
            transport,
            open: Open::new("test-client"),
            next_delivery_id: 0,
        };
        client.send(0, Open::new("test-client")).await;
        client.open = match client.recv().await {
            FrameBody::Open(open) => open,
            other => panic!("expected open, found {:?}", other),
        };
        client
    }

    pub async fn send(&mut self, channel: u16, body: impl Into<FrameBody>) {
        self.transport
            .send(Frame::new(channel, body))
            .await
            .expect("failed to send frame");
    }

    /// Next frame body of any channel
    pub async fn recv(&mut self) -> FrameBody {
        self.recv_frame().await.into_body()
    }

    pub async fn recv_frame(&mut self) -> Frame {
        match tokio::time::timeout(TIMEOUT, self.transport.next()).await {
            Ok(Some(Ok(frame))) => frame,
            Ok(Some(Err(err))) => panic!("transport error {:?}", err),
            Ok(None) => panic!("connection closed by broker"),
            Err(_) => panic!("no frame within {:?}", TIMEOUT),
        }
    }

    /// Whether the broker closed the stream
    pub async fn is_closed_by_broker(&mut self) -> bool {
        matches!(
            tokio::time::timeout(TIMEOUT, self.transport.next()).await,
            Ok(None) | Ok(Some(Err(_)))
        )
    }

    pub async fn begin(&mut self, channel: u16) -> Begin {
        self.send(channel, begin(None)).await;
        match self.recv().await {
            FrameBody::Begin(begin) => begin,
            other => panic!("expected begin, found {:?}", other),
        }
    }

    /// Attaches a link and returns the attach of the broker with the frame that followed it,
    /// the granted credit of an accepted receiving link or the detach of a refused one
    pub async fn attach(&mut self, channel: u16, attach: Attach) -> (Attach, FrameBody) {
        self.send(channel, attach).await;
        let reply = match self.recv().await {
            FrameBody::Attach(attach) => attach,
            other => panic!("expected attach, found {:?}", other),
        };
        let next = self.recv().await;
        (reply, next)
    }

    pub async fn transfer(
        &mut self,
        channel: u16,
        handle: u32,
        settled: bool,
        state: Option<DeliveryState>,
        message: &Message,
    ) -> u32 {
        let delivery_id = self.next_delivery_id;
        self.next_delivery_id = self.next_delivery_id.wrapping_add(1);

        let mut transfer = Transfer::new(Handle(handle));
        transfer.delivery_id = Some(delivery_id);
        transfer.delivery_tag = Some(Binary::from(delivery_id.to_be_bytes().to_vec()));
        transfer.message_format = Some(0);
        transfer.settled = Some(settled);
        transfer.state = state;
        let payload = message.encode().expect("failed to encode message");
        self.send(
            channel,
            FrameBody::Transfer {
                performative: transfer,
                payload,
            },
        )
        .await;
        delivery_id
    }

    /// Declares a transaction on an attached coordinator link
    pub async fn declare(&mut self, channel: u16, handle: u32) -> TransactionId {
        let delivery_id = self
            .transfer(channel, handle, false, None, &Declare::default().into())
            .await;
        let txn_id = match self.recv().await {
            FrameBody::Disposition(Disposition {
                first,
                settled: true,
                state: Some(DeliveryState::Declared(declared)),
                ..
            }) if first == delivery_id => declared.txn_id,
            other => panic!("expected declared, found {:?}", other),
        };
        expect_link_credit(self.recv().await, handle);
        txn_id
    }

    pub async fn discharge(&mut self, channel: u16, handle: u32, txn_id: TransactionId, fail: bool) -> u32 {
        let discharge = Discharge { txn_id, fail };
        self.transfer(channel, handle, false, None, &discharge.into())
            .await
    }

    pub async fn detach(&mut self, channel: u16, handle: u32) {
        self.send(
            channel,
            Detach {
                handle: Handle(handle),
                closed: true,
                error: None,
            },
        )
        .await;
    }

    pub async fn close(&mut self) {
        self.send(0, Close::new(None)).await;
    }
}

/// Accepts the client end of an in-memory stream
pub async fn connect<R: Router>(acceptor: &ConnectionAcceptor<R>) -> (ConnectionHandle, TestClient) {
    let (client, server) = tokio::io::duplex(1024 * 1024);
    let (handle, client) = tokio::join!(acceptor.accept(server), TestClient::open(client));
    (handle.expect("accept failed"), client)
}

pub fn begin(remote_channel: Option<u16>) -> Begin {
    Begin {
        remote_channel,
        next_outgoing_id: 0,
        incoming_window: 100,
        outgoing_window: 100,
        handle_max: Handle(63),
        offered_capabilities: None,
        desired_capabilities: None,
        properties: None,
    }
}

pub fn outcomes(symbols: &[&str]) -> Source {
    Source {
        outcomes: Some(Array(symbols.iter().map(|s| Symbol::from(*s)).collect())),
        ..Default::default()
    }
}

pub fn accepted_and_rejected() -> Source {
    outcomes(&[outcome_symbols::ACCEPTED, outcome_symbols::REJECTED])
}

pub fn accepted_only() -> Source {
    outcomes(&[outcome_symbols::ACCEPTED])
}

/// Attach of a link sending to the broker
pub fn sender_attach(handle: u32, name: &str, target: Option<TargetArchetype>, source: Source) -> Attach {
    Attach {
        name: name.to_string(),
        handle: Handle(handle),
        role: Role::Sender,
        snd_settle_mode: SenderSettleMode::Mixed,
        rcv_settle_mode: ReceiverSettleMode::First,
        source: Some(source),
        target,
        unsettled: None,
        incomplete_unsettled: false,
        initial_delivery_count: Some(0),
        max_message_size: None,
        offered_capabilities: None,
        desired_capabilities: None,
        properties: None,
    }
}

pub fn relay_attach(handle: u32, source: Source) -> Attach {
    sender_attach(handle, "relay", Some(Target::default().into()), source)
}

pub fn fixed_attach(handle: u32, address: &str, source: Source) -> Attach {
    sender_attach(
        handle,
        address,
        Some(Target::with_address(address).into()),
        source,
    )
}

pub fn coordinator_attach(handle: u32, source: Source) -> Attach {
    let coordinator = Coordinator::new([TxnCapability::LocalTransactions]);
    sender_attach(handle, "txn-controller", Some(coordinator.into()), source)
}

/// Attach of a link receiving from the broker
pub fn receiver_attach(handle: u32, address: &str) -> Attach {
    Attach {
        name: format!("{}-receiver", address),
        handle: Handle(handle),
        role: Role::Receiver,
        snd_settle_mode: SenderSettleMode::Unsettled,
        rcv_settle_mode: ReceiverSettleMode::First,
        source: Some(Source::with_address(address)),
        target: Some(Target::default().into()),
        unsettled: None,
        incomplete_unsettled: false,
        initial_delivery_count: None,
        max_message_size: None,
        offered_capabilities: None,
        desired_capabilities: None,
        properties: None,
    }
}

pub fn link_flow(handle: u32, delivery_count: u32, link_credit: u32) -> Flow {
    Flow {
        next_incoming_id: Some(0),
        incoming_window: 100,
        next_outgoing_id: 0,
        outgoing_window: 100,
        handle: Some(Handle(handle)),
        delivery_count: Some(delivery_count),
        link_credit: Some(link_credit),
        ..Default::default()
    }
}

pub fn transactional(txn_id: &TransactionId) -> Option<DeliveryState> {
    Some(DeliveryState::TransactionalState(TransactionalState {
        txn_id: txn_id.clone(),
        outcome: None,
    }))
}

/// Returns the credit of a link flow for the handle
pub fn expect_link_credit(body: FrameBody, handle: u32) -> u32 {
    match body {
        FrameBody::Flow(Flow {
            handle: Some(h),
            link_credit: Some(credit),
            ..
        }) if h.0 == handle => credit,
        other => panic!("expected credit for handle {}, found {:?}", handle, other),
    }
}

pub fn expect_detach(body: FrameBody, handle: u32) -> definitions::Error {
    match body {
        FrameBody::Detach(Detach {
            handle: h,
            closed: true,
            error: Some(error),
        }) if h.0 == handle => error,
        other => panic!("expected detach of handle {}, found {:?}", handle, other),
    }
}

pub fn expect_disposition(body: FrameBody, delivery_id: u32) -> DeliveryState {
    match body {
        FrameBody::Disposition(Disposition {
            role: Role::Receiver,
            first,
            settled: true,
            state: Some(state),
            ..
        }) if first == delivery_id => state,
        other => panic!("expected disposition of {}, found {:?}", delivery_id, other),
    }
}

pub fn condition(error: &definitions::Error) -> &ErrorCondition {
    &error.condition
}
