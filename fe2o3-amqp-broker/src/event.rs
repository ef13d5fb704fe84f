//! Events reported by a connection to its [`crate::connection::ConnectionHandle`]

use fe2o3_amqp_types::{
    definitions::{self, DeliveryTag},
    messaging::DeliveryState,
};

use crate::router::LinkRef;

/// Something happened on a link the peer attached as receiver
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    /// The peer attached a receiving link to an address that was resolved
    SenderAttached {
        /// Reference used to send on the link
        link: LinkRef,

        /// Name of the link
        name: String,

        /// Address of the source
        address: String,
    },

    /// The peer changed the credit of the link
    Credit {
        /// The link
        link: LinkRef,

        /// Credit left after the flow was applied
        credit: u32,
    },

    /// The peer updated or settled a delivery sent on the link
    Disposition {
        /// The link
        link: LinkRef,

        /// Tag of the delivery
        delivery_tag: DeliveryTag,

        /// Whether the delivery is settled now
        settled: bool,

        /// State of the delivery at the peer
        state: Option<DeliveryState>,
    },

    /// The link was detached. Deliveries that were not settled are listed.
    SenderDetached {
        /// The link
        link: LinkRef,

        /// Tags of the deliveries still unsettled or never sent
        unsettled: Vec<DeliveryTag>,

        /// Error carried by the detach, if any
        error: Option<definitions::Error>,
    },
}

impl ConnectionEvent {
    /// The link the event is about
    pub fn link(&self) -> LinkRef {
        match self {
            ConnectionEvent::SenderAttached { link, .. }
            | ConnectionEvent::Credit { link, .. }
            | ConnectionEvent::Disposition { link, .. }
            | ConnectionEvent::SenderDetached { link, .. } => *link,
        }
    }
}
