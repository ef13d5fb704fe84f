//! Link flow state

use fe2o3_amqp_types::{
    definitions::{Handle, SequenceNo},
    performatives::Flow,
};

use super::Error;

/// The link fields of a flow
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkFlow {
    /// Output handle of the link
    pub handle: Handle,
    /// Delivery count
    pub delivery_count: SequenceNo,
    /// Link credit
    pub link_credit: u32,
    /// Available
    pub available: Option<u32>,
    /// Drain
    pub drain: bool,
    /// Echo
    pub echo: bool,
}

/// Credit accounting of one link
#[derive(Debug, Clone, Default)]
pub(crate) struct LinkFlowState {
    pub initial_delivery_count: SequenceNo,
    pub delivery_count: SequenceNo,
    pub link_credit: u32,
    pub available: Option<u32>,
    pub drain: bool,
}

impl LinkFlowState {
    pub fn new(initial_delivery_count: SequenceNo) -> Self {
        Self {
            initial_delivery_count,
            delivery_count: initial_delivery_count,
            ..Default::default()
        }
    }

    pub fn as_link_flow(&self, handle: Handle, echo: bool) -> LinkFlow {
        LinkFlow {
            handle,
            delivery_count: self.delivery_count,
            link_credit: self.link_credit,
            available: self.available,
            drain: self.drain,
            echo,
        }
    }

    /// Flow received on a link we send on.
    ///
    /// `link-credit_snd := delivery-count_rcv + link-credit_rcv - delivery-count_snd`. An
    /// unknown `delivery-count_rcv` is taken to be the initial delivery count.
    pub fn on_incoming_flow_as_sender(&mut self, flow: &Flow, handle: Handle) -> Option<LinkFlow> {
        let delivery_count_rcv = flow.delivery_count.unwrap_or(self.initial_delivery_count);
        if let Some(link_credit_rcv) = flow.link_credit {
            self.link_credit = delivery_count_rcv
                .wrapping_add(link_credit_rcv)
                .wrapping_sub(self.delivery_count);
        }
        self.drain = flow.drain;

        match flow.echo {
            true => Some(self.as_link_flow(handle, false)),
            false => None,
        }
    }

    /// Consumes the remaining credit of a draining sender with nothing to send. Returns the
    /// flow that reports the advanced delivery count.
    pub fn drain_as_sender(&mut self, handle: Handle) -> Option<LinkFlow> {
        if !self.drain {
            return None;
        }
        self.delivery_count = self.delivery_count.wrapping_add(self.link_credit);
        self.link_credit = 0;
        Some(self.as_link_flow(handle, false))
    }

    /// Flow received on a link we receive on. The sender may have advanced its delivery
    /// count by draining, which consumes the credit in between.
    pub fn on_incoming_flow_as_receiver(
        &mut self,
        flow: &Flow,
        handle: Handle,
    ) -> Option<LinkFlow> {
        if let Some(delivery_count_snd) = flow.delivery_count {
            let limit = self.delivery_count.wrapping_add(self.link_credit);
            self.link_credit = limit.wrapping_sub(delivery_count_snd);
            if self.link_credit > limit.wrapping_sub(self.delivery_count) {
                // the sender claims more deliveries than credit was granted for
                self.link_credit = 0;
            }
            self.delivery_count = delivery_count_snd;
        }
        self.available = flow.available;

        match flow.echo {
            true => Some(self.as_link_flow(handle, false)),
            false => None,
        }
    }

    /// Accounts one incoming delivery
    pub fn consume_as_receiver(&mut self) -> Result<(), Error> {
        if self.link_credit == 0 {
            return Err(Error::TransferLimitExceeded);
        }
        self.link_credit -= 1;
        self.delivery_count = self.delivery_count.wrapping_add(1);
        Ok(())
    }

    /// Accounts one outgoing delivery. Returns `false` without changing anything if there is
    /// no credit.
    pub fn consume_as_sender(&mut self) -> bool {
        if self.link_credit == 0 {
            return false;
        }
        self.link_credit -= 1;
        self.delivery_count = self.delivery_count.wrapping_add(1);
        true
    }
}
