//! Sessions begun by the peer
//!
//! A session multiplexes links by handle and keeps the transfer windows of both directions.
//! Complete deliveries are queued on their link and routed one at a time. Routing that
//! needs the [`crate::router::Router`] leaves the session as a [`RouteRequest`] and comes
//! back through [`Session::on_route_completion`].

use std::collections::HashMap;

use fe2o3_amqp_codec::Error as CodecError;
use fe2o3_amqp_types::{
    definitions::{
        self, AmqpError, DeliveryNumber, DeliveryTag, Handle, LinkError, ReceiverSettleMode, Role,
    },
    messaging::{Accepted, DeliveryState, Message, Outcome, TargetArchetype},
    performatives::{Attach, Begin, Detach, Disposition, End, Flow, Transfer},
    states::{LinkState, SessionState},
    transaction::{ControlMessage, TransactionError, TransactionId, TransactionalState},
};
use slab::Slab;
use tracing::{debug, error, instrument, trace, warn};

use crate::{
    acceptor::{AcceptorConfig, SessionConfig},
    connection::{Outbox, SendError},
    event::ConnectionEvent,
    frames::amqp::{split_transfer, Frame, FrameBody},
    link::{
        delivery::{Delivery, UnsettledEntry, UnsettledMap},
        state::LinkFlow,
        Link, LinkKind, OutgoingDelivery, PartialDelivery,
    },
    router::{
        policy::{on_routing_failure, FailureAction},
        LinkRef, Resolution, RouteCompletion, RouteJob, RouteRequest, RouteResult, RoutingTarget,
    },
    transaction::{
        coordinator::{ControlAction, Coordinator},
        TransactionManager,
    },
    util::serial_lt,
    Payload,
};

mod error;

pub use error::Error;

/// Connection state a session needs while handling a frame
#[derive(Debug)]
pub(crate) struct SessionContext<'a> {
    pub outbox: &'a mut Outbox,
    pub transactions: &'a mut TransactionManager,
    pub config: &'a AcceptorConfig,
    pub next_link_id: &'a mut u64,
    pub max_frame_size: usize,
}

/// What happens to the head of a link's queue
enum Step {
    /// Handled, the next delivery may be processed
    Done,

    /// Waits for the routing job
    Route(Delivery, RouteJob),

    /// Waits for pending enlistments of a transaction
    Park(Delivery),

    /// The link was detached
    Detached,
}

enum Attaching {
    Accept(LinkKind),
    Resolve(String),
    Refuse(definitions::Error),
}

fn not_found(description: impl Into<String>) -> definitions::Error {
    definitions::Error::new(AmqpError::NotFound, Some(description.into()), None)
}

fn not_implemented(description: impl Into<String>) -> definitions::Error {
    definitions::Error::new(AmqpError::NotImplemented, Some(description.into()), None)
}

fn internal_error(description: impl Into<String>) -> definitions::Error {
    definitions::Error::new(AmqpError::InternalError, Some(description.into()), None)
}

fn decode_error(err: &CodecError) -> definitions::Error {
    definitions::Error::new(AmqpError::DecodeError, Some(err.to_string()), None)
}

fn rollback_error(description: impl Into<String>) -> definitions::Error {
    definitions::Error::new(
        TransactionError::TransactionRollback,
        Some(description.into()),
        None,
    )
}

/// A session of the connection
#[derive(Debug)]
pub struct Session {
    state: SessionState,
    local_channel: u16,
    remote_channel: u16,

    next_outgoing_id: DeliveryNumber,
    incoming_window: u32,
    outgoing_window: u32,
    next_incoming_id: DeliveryNumber,
    remote_incoming_window: u32,
    remote_outgoing_window: u32,
    config: SessionConfig,

    /// Keyed by output handle
    links: Slab<Link>,
    input_handles: HashMap<u32, usize>,

    incoming_unsettled: UnsettledMap,
    outgoing_unsettled: UnsettledMap,
}

impl Session {
    pub(crate) fn new(
        local_channel: u16,
        remote_channel: u16,
        begin: &Begin,
        config: &SessionConfig,
    ) -> Self {
        Self {
            state: SessionState::BeginReceived,
            local_channel,
            remote_channel,
            next_outgoing_id: 0,
            incoming_window: config.incoming_window,
            outgoing_window: config.outgoing_window,
            next_incoming_id: begin.next_outgoing_id,
            remote_incoming_window: begin.incoming_window,
            remote_outgoing_window: begin.outgoing_window,
            config: config.clone(),
            links: Slab::new(),
            input_handles: HashMap::new(),
            incoming_unsettled: UnsettledMap::new(),
            outgoing_unsettled: UnsettledMap::new(),
        }
    }

    /// State of the session
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Channel of the frames sent by this session
    pub fn local_channel(&self) -> u16 {
        self.local_channel
    }

    /// Channel of the frames received for this session
    pub fn remote_channel(&self) -> u16 {
        self.remote_channel
    }

    /// Number of links holding a handle
    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    pub(crate) fn is_discarding(&self) -> bool {
        self.state == SessionState::Discarding
    }

    fn send(&self, ctx: &mut SessionContext<'_>, body: impl Into<FrameBody>) {
        let frame = Frame::new(self.local_channel, body);
        trace!(channel = self.local_channel, frame = ?frame.body(), "queued");
        ctx.outbox.frames.push(frame);
    }

    fn flow(&mut self, link: Option<LinkFlow>) -> Flow {
        self.incoming_window = self.config.incoming_window;
        self.outgoing_window = self.config.outgoing_window;
        let mut flow = Flow {
            next_incoming_id: Some(self.next_incoming_id),
            incoming_window: self.incoming_window,
            next_outgoing_id: self.next_outgoing_id,
            outgoing_window: self.outgoing_window,
            ..Default::default()
        };
        if let Some(link) = link {
            flow.handle = Some(link.handle);
            flow.delivery_count = Some(link.delivery_count);
            flow.link_credit = Some(link.link_credit);
            flow.available = link.available;
            flow.drain = link.drain;
            flow.echo = link.echo;
        }
        flow
    }

    fn send_flow(&mut self, ctx: &mut SessionContext<'_>, link: Option<LinkFlow>) {
        let flow = self.flow(link);
        self.send(ctx, flow);
    }

    fn link_key(&self, handle: Handle) -> Result<usize, Error> {
        self.input_handles
            .get(&handle.0)
            .copied()
            .filter(|key| self.links.contains(*key))
            .ok_or(Error::UnattachedHandle(handle))
    }

    /// Replies to the begin of the peer
    pub(crate) fn begin(&mut self, ctx: &mut SessionContext<'_>) {
        let begin = Begin {
            remote_channel: Some(self.remote_channel),
            next_outgoing_id: self.next_outgoing_id,
            incoming_window: self.incoming_window,
            outgoing_window: self.outgoing_window,
            handle_max: Handle(self.config.handle_max),
            offered_capabilities: None,
            desired_capabilities: None,
            properties: None,
        };
        self.send(ctx, begin);
        self.state = SessionState::Mapped;
        debug!(
            local_channel = self.local_channel,
            remote_channel = self.remote_channel,
            "mapped"
        );
    }

    // =========================================================================
    // Attach and detach
    // =========================================================================

    #[instrument(skip_all, fields(channel = self.local_channel, name = %attach.name, handle = attach.handle.0))]
    pub(crate) fn on_attach(
        &mut self,
        ctx: &mut SessionContext<'_>,
        attach: Attach,
    ) -> Result<(), Error> {
        let input_handle = attach.handle;
        if input_handle.0 > self.config.handle_max {
            return Err(Error::HandleMaxExceeded {
                handle: input_handle,
                handle_max: self.config.handle_max,
            });
        }
        if self.input_handles.contains_key(&input_handle.0) {
            return Err(Error::HandleInUse(input_handle));
        }

        let id = *ctx.next_link_id;
        *ctx.next_link_id = id.wrapping_add(1);
        let key = self
            .links
            .insert(Link::new(id, attach, ctx.config.link.max_message_size));
        self.input_handles.insert(input_handle.0, key);

        let link = &mut self.links[key];
        let attaching = match link.role {
            Role::Receiver => match &link.remote_attach.target {
                None => Attaching::Refuse(not_found("Target is absent")),
                Some(TargetArchetype::Coordinator(_)) => match ctx.config.transactions {
                    true => Attaching::Accept(LinkKind::Coordinator),
                    false => Attaching::Refuse(not_implemented("Transactions are not supported")),
                },
                Some(TargetArchetype::Target(target)) if target.dynamic => {
                    Attaching::Refuse(not_implemented("Dynamic targets are not supported"))
                }
                Some(TargetArchetype::Target(target)) => match &target.address {
                    Some(address) => Attaching::Resolve(address.clone()),
                    None if ctx.config.anonymous_relay => Attaching::Accept(LinkKind::Relay),
                    None => Attaching::Refuse(not_found("Anonymous relay is not enabled")),
                },
            },
            Role::Sender => match &link.remote_attach.source {
                None => Attaching::Refuse(not_found("Source is absent")),
                Some(source) if source.dynamic => {
                    Attaching::Refuse(not_implemented("Dynamic sources are not supported"))
                }
                Some(source) => match &source.address {
                    Some(address) => Attaching::Resolve(address.clone()),
                    None => Attaching::Refuse(not_found("Source address is absent")),
                },
            },
        };

        match attaching {
            Attaching::Accept(kind) => {
                link.kind = kind;
                self.complete_attach(ctx, key);
            }
            Attaching::Resolve(address) => {
                debug!(%address, "resolving");
                let ticket = link.start_job(self.local_channel, key as u32);
                ctx.outbox.requests.push(RouteRequest {
                    ticket,
                    job: RouteJob::Resolve { address },
                });
            }
            Attaching::Refuse(error) => self.refuse_attach(ctx, key, error),
        }
        Ok(())
    }

    fn local_attach(link: &Link, handle: u32, max_message_size: Option<u64>) -> Attach {
        let remote = &link.remote_attach;
        Attach {
            name: link.name.clone(),
            handle: Handle(handle),
            role: link.role,
            snd_settle_mode: remote.snd_settle_mode,
            rcv_settle_mode: ReceiverSettleMode::First,
            source: remote.source.clone(),
            target: remote.target.clone(),
            unsettled: None,
            incomplete_unsettled: false,
            initial_delivery_count: match link.role {
                Role::Sender => Some(link.flow.delivery_count),
                Role::Receiver => None,
            },
            max_message_size,
            offered_capabilities: None,
            desired_capabilities: None,
            properties: None,
        }
    }

    fn complete_attach(&mut self, ctx: &mut SessionContext<'_>, key: usize) {
        let handle = key as u32;
        let local_channel = self.local_channel;
        let link = match self.links.get_mut(key) {
            Some(link) => link,
            None => return,
        };
        link.state = LinkState::Attached;
        let attach = Self::local_attach(link, handle, ctx.config.link.max_message_size);
        debug!(name = %link.name, handle, "attached");

        let credit = match &link.kind {
            LinkKind::Sender(target) => {
                ctx.outbox.events.push(ConnectionEvent::SenderAttached {
                    link: link.link_ref(local_channel, handle),
                    name: link.name.clone(),
                    address: target.name().to_string(),
                });
                None
            }
            _ => {
                link.flow.link_credit = ctx.config.link.credit;
                Some(link.flow.as_link_flow(Handle(handle), false))
            }
        };

        self.send(ctx, attach);
        if let Some(credit) = credit {
            self.send_flow(ctx, Some(credit));
        }
    }

    /// Answers the attach with a null terminus followed by a closing detach
    fn refuse_attach(&mut self, ctx: &mut SessionContext<'_>, key: usize, error: definitions::Error) {
        let link = match self.links.get_mut(key) {
            Some(link) => link,
            None => return,
        };
        let mut attach = Self::local_attach(link, key as u32, None);
        match link.role {
            Role::Receiver => attach.target = None,
            Role::Sender => attach.source = None,
        }
        link.state = LinkState::DetachSent;
        warn!(name = %link.name, %error, "attach refused");

        self.send(ctx, attach);
        self.send(
            ctx,
            Detach {
                handle: Handle(key as u32),
                closed: true,
                error: Some(error),
            },
        );
    }

    fn on_resolved(&mut self, ctx: &mut SessionContext<'_>, key: usize, resolution: Resolution) {
        let link = match self.links.get_mut(key) {
            Some(link) => link,
            None => return,
        };
        match resolution {
            Resolution::Routed(target) => {
                debug!(%target, "resolved");
                link.kind = match link.role {
                    Role::Receiver => LinkKind::Fixed(target),
                    Role::Sender => LinkKind::Sender(target),
                };
                self.complete_attach(ctx, key);
            }
            Resolution::NotFound => {
                let address = match link.role {
                    Role::Receiver => link.remote_attach.target_address().map(String::from),
                    Role::Sender => link
                        .remote_attach
                        .source
                        .as_ref()
                        .and_then(|source| source.address.clone()),
                };
                let description = format!("Node {} not found", address.unwrap_or_default());
                self.refuse_attach(ctx, key, not_found(description));
            }
        }
    }

    /// Detaches the link with an error. Transfers still arriving on the link are discarded
    /// until the peer answers with its detach.
    fn detach_link(&mut self, ctx: &mut SessionContext<'_>, key: usize, error: definitions::Error) {
        match self.links.get_mut(key) {
            Some(link) if link.state != LinkState::DetachSent => {
                warn!(name = %link.name, %error, "detaching link");
                link.state = LinkState::DetachSent;
            }
            _ => return,
        }
        self.send(
            ctx,
            Detach {
                handle: Handle(key as u32),
                closed: true,
                error: Some(error.clone()),
            },
        );
        self.release_link(ctx, key, Some(error));
    }

    /// Drops the queued work of a link. Routing completions still in flight become stale.
    fn release_link(
        &mut self,
        ctx: &mut SessionContext<'_>,
        key: usize,
        error: Option<definitions::Error>,
    ) {
        let local_channel = self.local_channel;
        let link = match self.links.get_mut(key) {
            Some(link) => link,
            None => return,
        };

        for delivery in link.take_pending() {
            if let (true, Some(txn_id)) = (delivery.enlisting, &delivery.txn_id) {
                ctx.transactions.fail_enlistment(txn_id);
            }
        }
        self.incoming_unsettled.remove_link(link.id);
        let mut unsettled: Vec<DeliveryTag> = self
            .outgoing_unsettled
            .remove_link(link.id)
            .into_iter()
            .map(|entry| entry.delivery_tag)
            .collect();
        if let Some(partial) = link.partial.take() {
            // unsettled ones are already listed with the outgoing unsettled map
            if partial.settled {
                unsettled.push(partial.delivery_tag);
            }
        }
        unsettled.extend(link.outgoing.drain(..).map(|delivery| delivery.delivery_tag));

        match &link.kind {
            LinkKind::Coordinator => {
                let discarded = ctx.transactions.discard_owned_by(link.id);
                debug!(name = %link.name, discarded, "rolled back owned transactions");
            }
            LinkKind::Sender(_) => ctx.outbox.events.push(ConnectionEvent::SenderDetached {
                link: link.link_ref(local_channel, key as u32),
                unsettled,
                error,
            }),
            _ => {}
        }
    }

    fn release_all(&mut self, ctx: &mut SessionContext<'_>, error: Option<definitions::Error>) {
        let keys: Vec<usize> = self
            .links
            .iter()
            .filter(|(_, link)| link.state != LinkState::DetachSent)
            .map(|(key, _)| key)
            .collect();
        for key in keys {
            self.release_link(ctx, key, error.clone());
        }
    }

    #[instrument(skip_all, fields(channel = self.local_channel, handle = detach.handle.0))]
    pub(crate) fn on_detach(
        &mut self,
        ctx: &mut SessionContext<'_>,
        detach: Detach,
    ) -> Result<(), Error> {
        let key = self.link_key(detach.handle)?;
        let link = &self.links[key];
        let detach_sent = link.state == LinkState::DetachSent;
        if !detach_sent && link.kind == LinkKind::PendingResolve {
            // the attach is answered before the detach
            let error = definitions::Error::new(
                LinkError::DetachForced,
                Some("Link detached before its address was resolved".to_string()),
                None,
            );
            self.refuse_attach(ctx, key, error);
        } else if !detach_sent {
            if let Some(error) = &detach.error {
                warn!(%error, "link detached by peer");
            }
            self.send(
                ctx,
                Detach {
                    handle: Handle(key as u32),
                    closed: detach.closed,
                    error: None,
                },
            );
            self.release_link(ctx, key, detach.error);
        }

        self.input_handles.remove(&detach.handle.0);
        self.links.remove(key);
        debug!(key, "handle released");
        Ok(())
    }

    // =========================================================================
    // Flow control
    // =========================================================================

    #[instrument(skip_all, fields(channel = self.local_channel, handle = ?flow.handle))]
    pub(crate) fn on_flow(&mut self, ctx: &mut SessionContext<'_>, flow: Flow) -> Result<(), Error> {
        self.remote_incoming_window = flow
            .next_incoming_id
            .unwrap_or(0)
            .wrapping_add(flow.incoming_window)
            .wrapping_sub(self.next_outgoing_id);
        self.remote_outgoing_window = flow.outgoing_window;

        let handle = match flow.handle {
            Some(handle) => handle,
            None => {
                if flow.echo {
                    self.send_flow(ctx, None);
                }
                self.flush_all(ctx);
                return Ok(());
            }
        };

        let key = self.link_key(handle)?;
        let link = &mut self.links[key];
        if link.state != LinkState::Attached {
            trace!("flow for a link that is not attached");
            return Ok(());
        }
        let credit_before = link.flow.link_credit;
        let reply = match link.role {
            Role::Sender => link.flow.on_incoming_flow_as_sender(&flow, Handle(key as u32)),
            Role::Receiver => link
                .flow
                .on_incoming_flow_as_receiver(&flow, Handle(key as u32)),
        };
        let is_sender = link.role == Role::Sender;
        let credit_changed = link.flow.link_credit != credit_before || link.flow.drain;
        if let Some(reply) = reply {
            self.send_flow(ctx, Some(reply));
        }

        if is_sender {
            self.flush_outgoing(ctx, key);
            let local_channel = self.local_channel;
            if let Some(link) = self.links.get_mut(key) {
                let drained = match link.has_outgoing() {
                    false => link.flow.drain_as_sender(Handle(key as u32)),
                    true => None,
                };
                // repeated flows granting the same credit are not reported again
                if credit_changed {
                    ctx.outbox.events.push(ConnectionEvent::Credit {
                        link: link.link_ref(local_channel, key as u32),
                        credit: link.flow.link_credit,
                    });
                }
                if let Some(drained) = drained {
                    self.send_flow(ctx, Some(drained));
                }
            }
        }
        Ok(())
    }

    fn top_up_credit(&mut self, ctx: &mut SessionContext<'_>, key: usize) {
        let credit = ctx.config.link.credit;
        let flow = match self.links.get_mut(key) {
            Some(link)
                if link.state == LinkState::Attached
                    && link.role == Role::Receiver
                    && link.kind != LinkKind::Coordinator =>
            {
                let topped_up = credit.saturating_sub(link.pending.len() as u32);
                if link.flow.link_credit.saturating_mul(2) >= credit
                    || topped_up <= link.flow.link_credit
                {
                    return;
                }
                link.flow.link_credit = topped_up;
                link.flow.as_link_flow(Handle(key as u32), false)
            }
            _ => return,
        };
        self.send_flow(ctx, Some(flow));
    }

    /// Coordinator links get their credit back after every control message
    fn issue_control_credit(&mut self, ctx: &mut SessionContext<'_>, key: usize) {
        let flow = match self.links.get_mut(key) {
            Some(link) if link.state == LinkState::Attached => {
                link.flow.link_credit = ctx.config.link.credit;
                link.flow.as_link_flow(Handle(key as u32), false)
            }
            _ => return,
        };
        self.send_flow(ctx, Some(flow));
    }

    // =========================================================================
    // Incoming deliveries
    // =========================================================================

    #[instrument(skip_all, fields(channel = self.local_channel, handle = transfer.handle.0))]
    pub(crate) fn on_transfer(
        &mut self,
        ctx: &mut SessionContext<'_>,
        transfer: Transfer,
        payload: Payload,
    ) -> Result<(), Error> {
        if self.incoming_window == 0 {
            return Err(Error::WindowViolation);
        }
        self.incoming_window -= 1;
        self.remote_outgoing_window = self.remote_outgoing_window.saturating_sub(1);
        self.next_incoming_id = self.next_incoming_id.wrapping_add(1);

        let key = self.link_key(transfer.handle)?;
        let link = &mut self.links[key];
        let result = match link.state {
            LinkState::DetachSent => {
                trace!("transfer on a detaching link discarded");
                Ok(None)
            }
            _ => link.on_incoming_transfer(transfer, payload),
        };
        match result {
            Ok(None) => {}
            Ok(Some(delivery)) => self.on_delivery(ctx, key, delivery),
            Err(err) => self.detach_link(ctx, key, err.into_amqp_error()),
        }

        if self.incoming_window < self.config.incoming_window / 2 {
            self.send_flow(ctx, None);
        }
        Ok(())
    }

    fn on_delivery(&mut self, ctx: &mut SessionContext<'_>, key: usize, mut delivery: Delivery) {
        let link = match self.links.get_mut(key) {
            Some(link) => link,
            None => return,
        };
        trace!(delivery_id = delivery.delivery_id, settled = delivery.settled, "delivery");
        if !delivery.settled {
            self.incoming_unsettled.insert(
                delivery.delivery_id,
                UnsettledEntry {
                    handle: key as u32,
                    link_id: link.id,
                    delivery_tag: delivery.delivery_tag.clone(),
                },
            );
        }
        if let Some(txn_id) = &delivery.txn_id {
            if link.kind != LinkKind::Coordinator && ctx.transactions.begin_enlistment(txn_id) {
                delivery.enlisting = true;
            }
        }
        link.pending.push_back(delivery);
        self.pump(ctx, key);
    }

    /// Processes the queue of a link until a job is in flight or the queue is empty
    fn pump(&mut self, ctx: &mut SessionContext<'_>, key: usize) {
        loop {
            let delivery = match self.links.get_mut(key) {
                Some(link)
                    if link.state == LinkState::Attached
                        && link.in_flight.is_none()
                        && !link.parked =>
                {
                    match link.pending.pop_front() {
                        Some(delivery) => delivery,
                        None => break,
                    }
                }
                _ => break,
            };
            let step = self.process(ctx, key, delivery);
            if !self.advance(ctx, key, step) {
                break;
            }
        }
        self.top_up_credit(ctx, key);
    }

    /// Returns whether the next delivery of the link may be processed
    fn advance(&mut self, ctx: &mut SessionContext<'_>, key: usize, step: Step) -> bool {
        let local_channel = self.local_channel;
        match step {
            Step::Done => true,
            Step::Route(delivery, job) => {
                if let Some(link) = self.links.get_mut(key) {
                    link.pending.push_front(delivery);
                    let ticket = link.start_job(local_channel, key as u32);
                    trace!(seq = ticket.seq, "routing");
                    ctx.outbox.requests.push(RouteRequest { ticket, job });
                }
                false
            }
            Step::Park(delivery) => {
                if let Some(link) = self.links.get_mut(key) {
                    link.pending.push_front(delivery);
                    link.parked = true;
                }
                false
            }
            Step::Detached => false,
        }
    }

    fn process(&mut self, ctx: &mut SessionContext<'_>, key: usize, delivery: Delivery) -> Step {
        let kind = match self.links.get(key) {
            Some(link) => link.kind.clone(),
            None => return Step::Detached,
        };

        match kind {
            LinkKind::Coordinator => self.process_control(ctx, key, delivery),
            LinkKind::Fixed(target) => match delivery.txn_id.clone() {
                Some(txn_id) => self.enlist(ctx, key, delivery, txn_id, Some(target)),
                None => match &delivery.message {
                    Ok(message) => {
                        let message = message.clone();
                        Step::Route(delivery, RouteJob::Forward { target, message })
                    }
                    Err(err) => {
                        let error = decode_error(err);
                        self.fail_delivery(ctx, key, &delivery, error)
                    }
                },
            },
            LinkKind::Relay => match delivery.txn_id.clone() {
                Some(txn_id) => self.enlist(ctx, key, delivery, txn_id, None),
                None => match &delivery.message {
                    Ok(message) => match message.to() {
                        Some(address) => {
                            let job = RouteJob::Relay {
                                address: address.to_string(),
                                message: message.clone(),
                            };
                            Step::Route(delivery, job)
                        }
                        None => self.fail_delivery(
                            ctx,
                            key,
                            &delivery,
                            not_found("Message has no to address"),
                        ),
                    },
                    Err(err) => {
                        let error = decode_error(err);
                        self.fail_delivery(ctx, key, &delivery, error)
                    }
                },
            },
            LinkKind::PendingResolve | LinkKind::Sender(_) => {
                warn!(delivery_id = delivery.delivery_id, "delivery on a link that does not receive");
                Step::Done
            }
        }
    }

    /// Settles a delivery that was not settled by the peer
    fn settle(&mut self, ctx: &mut SessionContext<'_>, delivery_id: DeliveryNumber, state: DeliveryState) {
        if self.incoming_unsettled.remove(delivery_id).is_none() {
            trace!(delivery_id, "delivery is already settled");
            return;
        }
        self.send(
            ctx,
            Disposition {
                role: Role::Receiver,
                first: delivery_id,
                last: None,
                settled: true,
                state: Some(state),
                batchable: false,
            },
        );
    }

    /// Applies the failure matrix to a delivery-local failure
    fn fail_delivery(
        &mut self,
        ctx: &mut SessionContext<'_>,
        key: usize,
        delivery: &Delivery,
        error: definitions::Error,
    ) -> Step {
        let supports_rejected = self
            .links
            .get(key)
            .map(|link| link.supports_rejected())
            .unwrap_or(false);
        match on_routing_failure(delivery.settled, supports_rejected, error) {
            FailureAction::Reject(error) => {
                debug!(delivery_id = delivery.delivery_id, %error, "rejected");
                self.settle(ctx, delivery.delivery_id, Outcome::rejected(error).into());
                Step::Done
            }
            FailureAction::Detach(error) => {
                self.detach_link(ctx, key, error);
                Step::Detached
            }
        }
    }

    fn apply_outcome(
        &mut self,
        ctx: &mut SessionContext<'_>,
        key: usize,
        delivery: Delivery,
        outcome: Outcome,
    ) -> Step {
        if delivery.settled {
            return match outcome {
                Outcome::Rejected(rejected) => {
                    let error = rejected.error.unwrap_or_else(|| {
                        definitions::Error::new(
                            AmqpError::InternalError,
                            Some("Message rejected".to_string()),
                            None,
                        )
                    });
                    self.detach_link(ctx, key, error);
                    Step::Detached
                }
                outcome => {
                    trace!(delivery_id = delivery.delivery_id, ?outcome, "settled delivery routed");
                    Step::Done
                }
            };
        }

        let supported = self
            .links
            .get(key)
            .map(|link| link.outcomes.supports(outcome.descriptor_name()))
            .unwrap_or(false);
        if supported {
            self.settle(ctx, delivery.delivery_id, outcome.into());
            return Step::Done;
        }

        let error = match outcome {
            Outcome::Rejected(rejected) => rejected
                .error
                .unwrap_or_else(|| not_implemented("Rejected outcome is not supported")),
            other => not_implemented(format!(
                "Outcome {} is not supported by the source",
                other.descriptor_name()
            )),
        };
        self.detach_link(ctx, key, error);
        Step::Detached
    }

    // =========================================================================
    // Transactions
    // =========================================================================

    fn enlist(
        &mut self,
        ctx: &mut SessionContext<'_>,
        key: usize,
        delivery: Delivery,
        txn_id: TransactionId,
        target: Option<RoutingTarget>,
    ) -> Step {
        if !delivery.enlisting {
            let error = definitions::Error::new(
                TransactionError::UnknownId,
                Some(format!("Unknown transaction id {:?}", txn_id)),
                None,
            );
            return self.fail_delivery(ctx, key, &delivery, error);
        }

        let message = match &delivery.message {
            Ok(message) => message.clone(),
            Err(err) => {
                let error = decode_error(err);
                return self.enlistment_failed(ctx, key, &delivery, txn_id, error);
            }
        };
        let target = match target {
            Some(target) => target,
            None => {
                return match message.to().map(String::from) {
                    Some(address) => Step::Route(delivery, RouteJob::Resolve { address }),
                    None => self.enlistment_failed(
                        ctx,
                        key,
                        &delivery,
                        txn_id,
                        not_found("Message has no to address"),
                    ),
                }
            }
        };
        self.enlist_resolved(ctx, key, &delivery, txn_id, target, message)
    }

    fn enlist_resolved(
        &mut self,
        ctx: &mut SessionContext<'_>,
        key: usize,
        delivery: &Delivery,
        txn_id: TransactionId,
        target: RoutingTarget,
        message: Message,
    ) -> Step {
        match ctx.transactions.enlist(&txn_id, target, message) {
            Ok(()) => {
                let outcome = Some(Outcome::Accepted(Accepted {}));
                self.settle_transactional(ctx, delivery, txn_id, outcome);
                Step::Done
            }
            Err(err) => {
                debug!(txn_id = ?txn_id, %err, "enlistment failed");
                self.reject_transactional(ctx, key, delivery, txn_id, err.to_amqp_error())
            }
        }
    }

    /// Marks the transaction rollback-only. The link is never detached for it.
    fn enlistment_failed(
        &mut self,
        ctx: &mut SessionContext<'_>,
        key: usize,
        delivery: &Delivery,
        txn_id: TransactionId,
        error: definitions::Error,
    ) -> Step {
        debug!(txn_id = ?txn_id, %error, "enlistment failed");
        ctx.transactions.fail_enlistment(&txn_id);
        self.reject_transactional(ctx, key, delivery, txn_id, error)
    }

    fn reject_transactional(
        &mut self,
        ctx: &mut SessionContext<'_>,
        key: usize,
        delivery: &Delivery,
        txn_id: TransactionId,
        error: definitions::Error,
    ) -> Step {
        let outcome = match self.links.get(key) {
            Some(link) if link.supports_rejected() => Some(Outcome::rejected(error)),
            _ => None,
        };
        self.settle_transactional(ctx, delivery, txn_id, outcome);
        Step::Done
    }

    fn settle_transactional(
        &mut self,
        ctx: &mut SessionContext<'_>,
        delivery: &Delivery,
        txn_id: TransactionId,
        outcome: Option<Outcome>,
    ) {
        if !delivery.settled {
            let state = DeliveryState::TransactionalState(TransactionalState { txn_id, outcome });
            self.settle(ctx, delivery.delivery_id, state);
        }
    }

    fn process_control(&mut self, ctx: &mut SessionContext<'_>, key: usize, delivery: Delivery) -> Step {
        let link = match self.links.get(key) {
            Some(link) => link.link_ref(self.local_channel, key as u32),
            None => return Step::Detached,
        };
        let control = match &delivery.message {
            Ok(message) => ControlMessage::from_message(message).map_err(|err| decode_error(&err)),
            Err(err) => Err(decode_error(err)),
        };
        let action = match control {
            Ok(control) => control.dispatch(&mut Coordinator {
                transactions: &mut *ctx.transactions,
                link,
            }),
            Err(error) => ControlAction::Fail(error),
        };

        match action {
            ControlAction::Settle(outcome) => {
                self.settle(ctx, delivery.delivery_id, outcome.into());
                self.issue_control_credit(ctx, key);
                Step::Done
            }
            ControlAction::Fail(error) => self.control_failed(ctx, key, &delivery, error),
            ControlAction::Commit(messages) => Step::Route(delivery, RouteJob::Commit { messages }),
            ControlAction::Park => {
                debug!(delivery_id = delivery.delivery_id, "discharge waits for enlistments");
                Step::Park(delivery)
            }
        }
    }

    fn control_failed(
        &mut self,
        ctx: &mut SessionContext<'_>,
        key: usize,
        delivery: &Delivery,
        error: definitions::Error,
    ) -> Step {
        let step = self.fail_delivery(ctx, key, delivery, error);
        if let Step::Done = step {
            self.issue_control_credit(ctx, key);
        }
        step
    }

    /// Resumes a coordinator link whose discharge was parked
    pub(crate) fn resume(&mut self, ctx: &mut SessionContext<'_>, link: LinkRef) {
        let key = link.handle as usize;
        match self.links.get_mut(key) {
            Some(entry) if entry.id == link.id && entry.parked => entry.parked = false,
            _ => return,
        }
        self.pump(ctx, key);
    }

    // =========================================================================
    // Routing completions
    // =========================================================================

    #[instrument(skip_all, fields(channel = self.local_channel, handle = completion.ticket.link.handle))]
    pub(crate) fn on_route_completion(
        &mut self,
        ctx: &mut SessionContext<'_>,
        completion: RouteCompletion,
    ) {
        let RouteCompletion { ticket, result } = completion;
        let key = ticket.link.handle as usize;
        let link = match self.links.get_mut(key) {
            Some(link) if link.is_waiting_for(&ticket) => link,
            _ => {
                warn!(link_id = ticket.link.id, seq = ticket.seq, "stale routing completion ignored");
                return;
            }
        };
        link.in_flight = None;

        if link.kind == LinkKind::PendingResolve {
            match result {
                RouteResult::Resolved(resolution) => self.on_resolved(ctx, key, resolution),
                other => warn!(?other, "unexpected result for an attach"),
            }
            return;
        }

        let delivery = match link.pending.pop_front() {
            Some(delivery) => delivery,
            None => return,
        };
        let step = self.apply_result(ctx, key, delivery, result);
        self.advance(ctx, key, step);
        self.pump(ctx, key);
    }

    fn apply_result(
        &mut self,
        ctx: &mut SessionContext<'_>,
        key: usize,
        delivery: Delivery,
        result: RouteResult,
    ) -> Step {
        match result {
            RouteResult::Forwarded(outcome) => self.apply_outcome(ctx, key, delivery, outcome),
            RouteResult::Unroutable => {
                let address = delivery
                    .message
                    .as_ref()
                    .ok()
                    .and_then(|message| message.to())
                    .unwrap_or_default()
                    .to_string();
                let error = not_found(format!("Node {} not found", address));
                self.fail_delivery(ctx, key, &delivery, error)
            }
            RouteResult::Resolved(resolution) => {
                let txn_id = match delivery.txn_id.clone() {
                    Some(txn_id) => txn_id,
                    None => {
                        warn!("resolution for a delivery outside a transaction");
                        return Step::Done;
                    }
                };
                match (resolution, &delivery.message) {
                    (Resolution::Routed(target), Ok(message)) => {
                        let message = message.clone();
                        self.enlist_resolved(ctx, key, &delivery, txn_id, target, message)
                    }
                    (Resolution::Routed(_), Err(err)) => {
                        let error = decode_error(err);
                        self.enlistment_failed(ctx, key, &delivery, txn_id, error)
                    }
                    (Resolution::NotFound, message) => {
                        let address = message
                            .as_ref()
                            .ok()
                            .and_then(|message| message.to())
                            .unwrap_or_default()
                            .to_string();
                        let error = not_found(format!("Node {} not found", address));
                        self.enlistment_failed(ctx, key, &delivery, txn_id, error)
                    }
                }
            }
            RouteResult::Committed(Ok(())) => {
                self.settle(ctx, delivery.delivery_id, Outcome::Accepted(Accepted {}).into());
                self.issue_control_credit(ctx, key);
                Step::Done
            }
            RouteResult::Committed(Err(outcome)) => {
                warn!(?outcome, "commit failed");
                let error = rollback_error(format!(
                    "Forward failed with {}",
                    outcome.descriptor_name()
                ));
                self.control_failed(ctx, key, &delivery, error)
            }
        }
    }

    // =========================================================================
    // Outgoing deliveries
    // =========================================================================

    /// Queues a message on a sending link and sends as much as credit and window allow
    pub(crate) fn send_message(
        &mut self,
        ctx: &mut SessionContext<'_>,
        link: LinkRef,
        message: &Message,
        settled: bool,
    ) -> Result<DeliveryTag, SendError> {
        let key = link.handle as usize;
        let entry = match self.links.get_mut(key) {
            Some(entry)
                if entry.id == link.id
                    && entry.role == Role::Sender
                    && entry.state == LinkState::Attached =>
            {
                entry
            }
            _ => return Err(SendError::LinkNotFound(link)),
        };
        let payload = message.encode().map_err(SendError::Encode)?;
        let delivery_tag = entry.next_delivery_tag();
        entry.outgoing.push_back(OutgoingDelivery {
            delivery_tag: delivery_tag.clone(),
            payload,
            settled,
        });
        self.flush_outgoing(ctx, key);
        Ok(delivery_tag)
    }

    fn flush_all(&mut self, ctx: &mut SessionContext<'_>) {
        let keys: Vec<usize> = self
            .links
            .iter()
            .filter(|(_, link)| link.role == Role::Sender && link.has_outgoing())
            .map(|(key, _)| key)
            .collect();
        for key in keys {
            self.flush_outgoing(ctx, key);
        }
    }

    /// Sends as many frames as the windows allow. Credit is consumed when a delivery is
    /// started. The frames of a split delivery that do not fit into the remote incoming
    /// window stay on the link until the next flow of the peer.
    fn flush_outgoing(&mut self, ctx: &mut SessionContext<'_>, key: usize) {
        loop {
            if self.remote_incoming_window == 0 || self.outgoing_window == 0 {
                return;
            }
            if !self.start_delivery(ctx, key) {
                return;
            }
            let ready = self.take_ready_frames(key);
            if ready.is_empty() {
                return;
            }
            for (performative, payload) in ready {
                self.send(
                    ctx,
                    FrameBody::Transfer {
                        performative,
                        payload,
                    },
                );
            }
            if self.outgoing_window == 0 {
                self.send_flow(ctx, None);
            }
        }
    }

    /// Splits the next queued delivery unless the link is still sending one. Returns whether
    /// the link has frames to send.
    fn start_delivery(&mut self, ctx: &mut SessionContext<'_>, key: usize) -> bool {
        let link = match self.links.get_mut(key) {
            Some(link) if link.state == LinkState::Attached => link,
            _ => return false,
        };
        if link.partial.is_some() {
            return true;
        }
        if link.flow.link_credit == 0 {
            return false;
        }
        let outgoing = match link.outgoing.pop_front() {
            Some(outgoing) => outgoing,
            None => return false,
        };

        let delivery_id = self.next_outgoing_id;
        let mut transfer = Transfer::new(Handle(key as u32));
        transfer.delivery_id = Some(delivery_id);
        transfer.delivery_tag = Some(outgoing.delivery_tag.clone());
        transfer.message_format = Some(0);
        transfer.settled = Some(outgoing.settled);
        let frames = match split_transfer(transfer, outgoing.payload.clone(), ctx.max_frame_size) {
            Ok(frames) => frames,
            Err(err) => {
                error!(?err, "failed to encode transfer");
                // put back so the detach reports it
                link.outgoing.push_front(outgoing);
                let error = internal_error(format!("Failed to encode transfer: {}", err));
                self.detach_link(ctx, key, error);
                return false;
            }
        };

        link.flow.consume_as_sender();
        if !outgoing.settled {
            self.outgoing_unsettled.insert(
                delivery_id,
                UnsettledEntry {
                    handle: key as u32,
                    link_id: link.id,
                    delivery_tag: outgoing.delivery_tag.clone(),
                },
            );
        }
        link.partial = Some(PartialDelivery {
            delivery_tag: outgoing.delivery_tag,
            settled: outgoing.settled,
            frames: frames.into(),
        });
        true
    }

    /// Takes the frames of the delivery in progress that fit into both windows
    fn take_ready_frames(&mut self, key: usize) -> Vec<(Transfer, Payload)> {
        let link = match self.links.get_mut(key) {
            Some(link) => link,
            None => return Vec::new(),
        };
        let partial = match link.partial.as_mut() {
            Some(partial) => partial,
            None => return Vec::new(),
        };

        let mut ready = Vec::new();
        while self.remote_incoming_window > 0 && self.outgoing_window > 0 {
            match partial.frames.pop_front() {
                Some(frame) => {
                    self.remote_incoming_window -= 1;
                    self.outgoing_window -= 1;
                    self.next_outgoing_id = self.next_outgoing_id.wrapping_add(1);
                    ready.push(frame);
                }
                None => break,
            }
        }
        if partial.frames.is_empty() {
            link.partial = None;
        }
        ready
    }

    // =========================================================================
    // Settlement and end
    // =========================================================================

    #[instrument(skip_all, fields(channel = self.local_channel, role = ?disposition.role))]
    pub(crate) fn on_disposition(
        &mut self,
        ctx: &mut SessionContext<'_>,
        disposition: Disposition,
    ) -> Result<(), Error> {
        let (first, last) = disposition.range();
        if serial_lt(last, first) {
            return Err(Error::ReversedRange { first, last });
        }
        match disposition.role {
            // the peer settles deliveries it sent
            Role::Sender => {
                if self.incoming_unsettled.in_range(first, last).is_empty() {
                    return Err(Error::AlreadySettled { first, last });
                }
                if disposition.settled {
                    self.incoming_unsettled.remove_range(first, last);
                }
            }
            Role::Receiver => {
                let covered = self.outgoing_unsettled.in_range(first, last);
                if covered.is_empty() {
                    return Err(Error::AlreadySettled { first, last });
                }
                let terminal = disposition
                    .state
                    .as_ref()
                    .map(|state| state.is_terminal())
                    .unwrap_or(false);
                let settle_locally = !disposition.settled && terminal;
                if disposition.settled || settle_locally {
                    self.outgoing_unsettled.remove_range(first, last);
                }

                for (_, entry) in covered {
                    ctx.outbox.events.push(ConnectionEvent::Disposition {
                        link: LinkRef {
                            channel: self.local_channel,
                            handle: entry.handle,
                            id: entry.link_id,
                        },
                        delivery_tag: entry.delivery_tag,
                        settled: disposition.settled || settle_locally,
                        state: disposition.state.clone(),
                    });
                }
                if settle_locally {
                    self.send(
                        ctx,
                        Disposition {
                            role: Role::Sender,
                            first,
                            last: disposition.last,
                            settled: true,
                            state: disposition.state,
                            batchable: false,
                        },
                    );
                }
            }
        }
        Ok(())
    }

    /// Handles the end of the peer. Returns once the session can be removed.
    #[instrument(skip_all, fields(channel = self.local_channel))]
    pub(crate) fn on_end(&mut self, ctx: &mut SessionContext<'_>, end: End) {
        if let Some(error) = &end.error {
            warn!(%error, "session ended by peer");
        }
        if self.state == SessionState::Mapped {
            self.send(ctx, End { error: None });
            self.release_all(ctx, end.error);
        }
        self.state = SessionState::Unmapped;
        debug!("unmapped");
    }

    /// Ends the session with an error. Frames other than end are dropped afterwards.
    pub(crate) fn end_with_error(&mut self, ctx: &mut SessionContext<'_>, err: Error) {
        let error = err.to_amqp_error();
        error!(channel = self.local_channel, %error, "ending session");
        self.send(
            ctx,
            End {
                error: Some(error.clone()),
            },
        );
        self.state = SessionState::Discarding;
        self.release_all(ctx, Some(error));
    }

    /// Releases every link when the connection goes away
    pub(crate) fn release(&mut self, ctx: &mut SessionContext<'_>, error: Option<definitions::Error>) {
        self.release_all(ctx, error);
        self.state = SessionState::Unmapped;
    }
}
