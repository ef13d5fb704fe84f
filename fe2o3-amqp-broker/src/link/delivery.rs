//! Deliveries received on a link and the unsettled maps of a session

use std::collections::BTreeMap;

use fe2o3_amqp_codec::Error as CodecError;
use fe2o3_amqp_types::{
    definitions::{DeliveryNumber, DeliveryTag},
    messaging::Message,
    transaction::TransactionId,
};

use crate::{util::serial_in_range, Payload};

/// A complete delivery waiting to be routed
#[derive(Debug)]
pub struct Delivery {
    /// Session scoped delivery id
    pub delivery_id: DeliveryNumber,

    /// Link scoped delivery tag
    pub delivery_tag: DeliveryTag,

    /// Whether the peer settled the delivery when sending it
    pub settled: bool,

    /// Transaction the delivery is enlisted in
    pub txn_id: Option<TransactionId>,

    /// Raw payload of all frames
    pub payload: Payload,

    /// The payload decoded as a message
    pub message: Result<Message, CodecError>,

    /// Whether the delivery is counted as a pending enlistment of its transaction
    pub(crate) enlisting: bool,
}

impl Delivery {
    /// Decodes the payload into a delivery
    pub fn new(
        delivery_id: DeliveryNumber,
        delivery_tag: DeliveryTag,
        settled: bool,
        txn_id: Option<TransactionId>,
        payload: Payload,
    ) -> Self {
        let message = Message::decode(&payload);
        Self {
            delivery_id,
            delivery_tag,
            settled,
            txn_id,
            payload,
            message,
            enlisting: false,
        }
    }
}

/// A delivery waiting for its settlement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsettledEntry {
    /// Output handle of the link
    pub handle: u32,

    /// Id of the link
    pub link_id: u64,

    /// Tag of the delivery
    pub delivery_tag: DeliveryTag,
}

/// Unsettled deliveries of one direction of a session, keyed by delivery id
#[derive(Debug, Default)]
pub struct UnsettledMap {
    entries: BTreeMap<DeliveryNumber, UnsettledEntry>,
}

impl UnsettledMap {
    /// Creates an empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of unsettled deliveries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no delivery is unsettled
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Tracks a delivery until it is settled
    pub fn insert(&mut self, delivery_id: DeliveryNumber, entry: UnsettledEntry) {
        self.entries.insert(delivery_id, entry);
    }

    /// Whether the delivery is still unsettled
    pub fn contains(&self, delivery_id: DeliveryNumber) -> bool {
        self.entries.contains_key(&delivery_id)
    }

    /// Stops tracking one delivery
    pub fn remove(&mut self, delivery_id: DeliveryNumber) -> Option<UnsettledEntry> {
        self.entries.remove(&delivery_id)
    }

    /// Unsettled deliveries within the serial range `first..=last`
    pub fn in_range(
        &self,
        first: DeliveryNumber,
        last: DeliveryNumber,
    ) -> Vec<(DeliveryNumber, UnsettledEntry)> {
        self.entries
            .iter()
            .filter(|(id, _)| serial_in_range(**id, first, last))
            .map(|(id, entry)| (*id, entry.clone()))
            .collect()
    }

    /// Removes the deliveries within the serial range `first..=last`
    pub fn remove_range(
        &mut self,
        first: DeliveryNumber,
        last: DeliveryNumber,
    ) -> Vec<(DeliveryNumber, UnsettledEntry)> {
        let removed = self.in_range(first, last);
        for (id, _) in &removed {
            self.entries.remove(id);
        }
        removed
    }

    /// Removes every delivery of a link
    pub fn remove_link(&mut self, link_id: u64) -> Vec<UnsettledEntry> {
        let ids: Vec<DeliveryNumber> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.link_id == link_id)
            .map(|(id, _)| *id)
            .collect();
        ids.into_iter()
            .filter_map(|id| self.entries.remove(&id))
            .collect()
    }
}
