//! Links attached by the peer
//!
//! A link owns the credit accounting of its direction, reassembles multi-frame deliveries
//! and queues complete deliveries until they are routed. At most one routing job of a link
//! is in flight at any time, so deliveries on one link are settled in the order they
//! arrived.

use std::collections::VecDeque;

use fe2o3_amqp_types::{
    definitions::{DeliveryTag, Handle, Role},
    messaging::DeliveryState,
    performatives::{Attach, Transfer},
    states::LinkState,
};

use crate::{
    router::{
        policy::{supported_outcomes, SupportedOutcomes},
        LinkRef, RouteTicket, RoutingTarget,
    },
    Payload,
};

pub mod delivery;
mod error;
mod incomplete_transfer;
pub mod state;

pub use error::Error;

use delivery::Delivery;
use incomplete_transfer::IncompleteTransfer;
use state::LinkFlowState;

/// What the link is attached to
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum LinkKind {
    /// The address of the attach is being resolved
    PendingResolve,

    /// Receiving link without target address. Every message names its destination in
    /// `properties.to`.
    Relay,

    /// Receiving link bound to a node
    Fixed(RoutingTarget),

    /// Receiving link of a transaction controller
    Coordinator,

    /// Sending link bound to a node
    Sender(RoutingTarget),
}

/// A message queued on a sending link until credit is available
#[derive(Debug)]
pub(crate) struct OutgoingDelivery {
    pub delivery_tag: DeliveryTag,
    pub payload: Payload,
    pub settled: bool,
}

/// A delivery whose first frames went out before the session window closed
#[derive(Debug)]
pub(crate) struct PartialDelivery {
    pub delivery_tag: DeliveryTag,
    pub settled: bool,
    pub frames: VecDeque<(Transfer, Payload)>,
}

/// A link of a session
#[derive(Debug)]
pub struct Link {
    pub(crate) id: u64,
    pub(crate) name: String,
    pub(crate) role: Role,
    pub(crate) input_handle: Handle,
    pub(crate) state: LinkState,
    pub(crate) kind: LinkKind,

    /// Attach received from the peer, echoed in the reply
    pub(crate) remote_attach: Attach,
    pub(crate) outcomes: SupportedOutcomes,
    pub(crate) flow: LinkFlowState,
    pub(crate) max_message_size: Option<u64>,

    pub(crate) pending: VecDeque<Delivery>,
    pub(crate) in_flight: Option<u64>,
    pub(crate) parked: bool,
    next_seq: u64,
    incomplete: Option<IncompleteTransfer>,

    pub(crate) outgoing: VecDeque<OutgoingDelivery>,
    pub(crate) partial: Option<PartialDelivery>,
    next_tag: u64,
}

impl Link {
    /// A link for a received attach. The local role is the opposite of the peer's.
    pub(crate) fn new(id: u64, attach: Attach, max_message_size: Option<u64>) -> Self {
        let role = attach.role.opposite();
        let initial_delivery_count = match role {
            Role::Sender => 0,
            Role::Receiver => attach.initial_delivery_count.unwrap_or(0),
        };
        let max_message_size = max_message_size.filter(|max| *max > 0);

        Self {
            id,
            name: attach.name.clone(),
            role,
            input_handle: attach.handle,
            state: LinkState::AttachReceived,
            kind: LinkKind::PendingResolve,
            outcomes: supported_outcomes(attach.source.as_ref()),
            remote_attach: attach,
            flow: LinkFlowState::new(initial_delivery_count),
            max_message_size,
            pending: VecDeque::new(),
            in_flight: None,
            parked: false,
            next_seq: 0,
            incomplete: None,
            outgoing: VecDeque::new(),
            partial: None,
            next_tag: 0,
        }
    }

    /// Whether the source of the peer accepts rejected outcomes
    pub fn supports_rejected(&self) -> bool {
        self.outcomes.supports_rejected()
    }

    pub(crate) fn link_ref(&self, channel: u16, handle: u32) -> LinkRef {
        LinkRef {
            channel,
            handle,
            id: self.id,
        }
    }

    /// Marks a job as in flight and returns its ticket
    pub(crate) fn start_job(&mut self, channel: u16, handle: u32) -> RouteTicket {
        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);
        self.in_flight = Some(seq);
        RouteTicket {
            link: self.link_ref(channel, handle),
            seq,
        }
    }

    /// Whether the ticket belongs to the job this link is waiting for
    pub(crate) fn is_waiting_for(&self, ticket: &RouteTicket) -> bool {
        self.id == ticket.link.id && self.in_flight == Some(ticket.seq)
    }

    /// Whether frames or deliveries wait to be sent
    pub(crate) fn has_outgoing(&self) -> bool {
        self.partial.is_some() || !self.outgoing.is_empty()
    }

    pub(crate) fn next_delivery_tag(&mut self) -> DeliveryTag {
        let tag = self.next_tag;
        self.next_tag = self.next_tag.wrapping_add(1);
        DeliveryTag::from(tag.to_be_bytes().to_vec())
    }

    /// Drops all queued and partial work. Completions of the job in flight become stale.
    pub(crate) fn take_pending(&mut self) -> Vec<Delivery> {
        self.in_flight = None;
        self.parked = false;
        self.incomplete = None;
        self.pending.drain(..).collect()
    }

    fn check_size(&self, size: usize) -> Result<(), Error> {
        match self.max_message_size {
            Some(max) if size as u64 > max => Err(Error::MessageSizeExceeded {
                size: size as u64,
                max,
            }),
            _ => Ok(()),
        }
    }

    /// Handles one transfer frame. Returns the delivery once its last frame has arrived.
    pub(crate) fn on_incoming_transfer(
        &mut self,
        transfer: Transfer,
        payload: Payload,
    ) -> Result<Option<Delivery>, Error> {
        if self.role == Role::Sender {
            return Err(Error::TransferOnSender);
        }

        let (transfer, payload) = match self.incomplete.take() {
            None => {
                if transfer.delivery_id.is_none() {
                    return Err(Error::MissingField("delivery-id"));
                }
                if transfer.delivery_tag.is_none() {
                    return Err(Error::MissingField("delivery-tag"));
                }
                self.flow.consume_as_receiver()?;

                if transfer.aborted {
                    return Ok(None);
                }
                self.check_size(payload.len())?;
                if transfer.more {
                    self.incomplete = Some(IncompleteTransfer::new(transfer, payload));
                    return Ok(None);
                }
                (transfer, payload)
            }
            Some(mut incomplete) => {
                incomplete.or_assign(transfer)?;
                if incomplete.performative.aborted {
                    return Ok(None);
                }
                incomplete.append(payload);
                self.check_size(incomplete.len())?;
                if incomplete.performative.more {
                    self.incomplete = Some(incomplete);
                    return Ok(None);
                }
                incomplete.into_parts()
            }
        };

        let delivery_id = transfer
            .delivery_id
            .ok_or(Error::MissingField("delivery-id"))?;
        let delivery_tag = transfer
            .delivery_tag
            .ok_or(Error::MissingField("delivery-tag"))?;
        let txn_id = match transfer.state {
            Some(DeliveryState::TransactionalState(state)) => Some(state.txn_id),
            _ => None,
        };
        Ok(Some(Delivery::new(
            delivery_id,
            delivery_tag,
            transfer.settled.unwrap_or(false),
            txn_id,
            payload,
        )))
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use fe2o3_amqp_codec::primitives::Binary;
    use fe2o3_amqp_types::{
        definitions::{Handle, ReceiverSettleMode, Role, SenderSettleMode},
        messaging::{DeliveryState, Message, Target},
        performatives::{Attach, Transfer},
        transaction::TransactionalState,
    };

    use super::{Error, Link};

    fn attach(role: Role) -> Attach {
        Attach {
            name: "link".into(),
            handle: Handle(3),
            role,
            snd_settle_mode: SenderSettleMode::Mixed,
            rcv_settle_mode: ReceiverSettleMode::First,
            source: None,
            target: Some(Target::with_address("q").into()),
            unsettled: None,
            incomplete_unsettled: false,
            initial_delivery_count: Some(0),
            max_message_size: None,
            offered_capabilities: None,
            desired_capabilities: None,
            properties: None,
        }
    }

    fn transfer(id: u32, more: bool) -> Transfer {
        let mut transfer = Transfer::new(Handle(3));
        transfer.delivery_id = Some(id);
        transfer.delivery_tag = Some(Binary::from(vec![id as u8]));
        transfer.more = more;
        transfer
    }

    fn receiver(credit: u32, max_message_size: Option<u64>) -> Link {
        let mut link = Link::new(1, attach(Role::Sender), max_message_size);
        link.flow.link_credit = credit;
        link
    }

    #[test]
    fn single_frame_delivery_is_decoded() {
        let mut link = receiver(1, None);
        let payload = Message::new("hi").encode().unwrap();
        let delivery = link
            .on_incoming_transfer(transfer(0, false), payload)
            .unwrap()
            .unwrap();
        assert_eq!(delivery.delivery_id, 0);
        assert!(!delivery.settled);
        assert_eq!(delivery.message.unwrap(), Message::new("hi"));
        assert_eq!(link.flow.delivery_count, 1);
    }

    #[test]
    fn frames_are_reassembled_with_one_credit() {
        let mut link = receiver(1, None);
        let payload = Message::new("hello").encode().unwrap();
        let (head, tail) = payload.split_at(3);

        assert!(link
            .on_incoming_transfer(transfer(0, true), Bytes::copy_from_slice(head))
            .unwrap()
            .is_none());
        let mut last = Transfer::new(Handle(3));
        last.more = false;
        let delivery = link
            .on_incoming_transfer(last, Bytes::copy_from_slice(tail))
            .unwrap()
            .unwrap();
        assert_eq!(delivery.message.unwrap(), Message::new("hello"));
        assert_eq!(link.flow.link_credit, 0);
    }

    #[test]
    fn transfer_without_credit_is_rejected() {
        let mut link = receiver(0, None);
        assert!(matches!(
            link.on_incoming_transfer(transfer(0, false), Bytes::new()),
            Err(Error::TransferLimitExceeded)
        ));
    }

    #[test]
    fn aborted_delivery_is_discarded() {
        let mut link = receiver(2, None);
        link.on_incoming_transfer(transfer(0, true), Bytes::from_static(b"ab"))
            .unwrap();
        let mut abort = Transfer::new(Handle(3));
        abort.aborted = true;
        assert!(link
            .on_incoming_transfer(abort, Bytes::new())
            .unwrap()
            .is_none());

        let payload = Message::new("x").encode().unwrap();
        let delivery = link
            .on_incoming_transfer(transfer(1, false), payload)
            .unwrap()
            .unwrap();
        assert_eq!(delivery.delivery_id, 1);
    }

    #[test]
    fn oversized_message_is_rejected() {
        let mut link = receiver(1, Some(4));
        assert!(matches!(
            link.on_incoming_transfer(transfer(0, false), Bytes::from_static(b"too large")),
            Err(Error::MessageSizeExceeded { size: 9, max: 4 })
        ));
    }

    #[test]
    fn transactional_state_carries_txn_id() {
        let mut link = receiver(1, None);
        let mut first = transfer(0, false);
        first.settled = Some(true);
        first.state = Some(DeliveryState::TransactionalState(TransactionalState {
            txn_id: Binary::from(vec![9]),
            outcome: None,
        }));
        let delivery = link
            .on_incoming_transfer(first, Message::new("t").encode().unwrap())
            .unwrap()
            .unwrap();
        assert!(delivery.settled);
        assert_eq!(delivery.txn_id, Some(Binary::from(vec![9])));
    }

    #[test]
    fn transfer_on_sending_link_is_rejected() {
        let mut link = Link::new(1, attach(Role::Receiver), None);
        assert!(matches!(
            link.on_incoming_transfer(transfer(0, false), Bytes::new()),
            Err(Error::TransferOnSender)
        ));
    }
}
