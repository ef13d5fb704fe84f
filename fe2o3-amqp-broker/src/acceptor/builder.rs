//! Builder for acceptors

use std::marker::PhantomData;

use fe2o3_amqp_types::definitions::{Milliseconds, MIN_MAX_FRAME_SIZE};

use crate::{
    router::Router,
    util::{Initialized, Uninitialized},
};

use super::{AcceptorConfig, ConnectionAcceptor};

/// A builder of [`ConnectionAcceptor`]
///
/// The container id must be set before the acceptor can be built
#[derive(Debug)]
pub struct Builder<M> {
    pub(crate) inner: AcceptorConfig,
    pub(crate) marker: PhantomData<M>,
}

impl Default for Builder<Uninitialized> {
    fn default() -> Self {
        Self::new()
    }
}

impl Builder<Uninitialized> {
    /// Creates a new builder with the default configuration
    pub fn new() -> Self {
        Self {
            inner: AcceptorConfig::default(),
            marker: PhantomData,
        }
    }
}

impl Builder<Initialized> {
    /// The configuration built so far
    pub fn config(self) -> AcceptorConfig {
        self.inner
    }

    /// Build the acceptor routing through `router`
    pub fn build<R: Router>(self, router: R) -> ConnectionAcceptor<R> {
        ConnectionAcceptor::with_config(self.inner, router)
    }
}

impl<M> Builder<M> {
    /// The id of the container
    pub fn container_id(mut self, id: impl Into<String>) -> Builder<Initialized> {
        self.inner.container_id = id.into();

        Builder {
            inner: self.inner,
            marker: PhantomData,
        }
    }

    /// Proposed maximum frame size. Values below 512 are raised to 512.
    pub fn max_frame_size(mut self, max_frame_size: u32) -> Self {
        self.inner.max_frame_size = std::cmp::max(MIN_MAX_FRAME_SIZE as u32, max_frame_size);
        self
    }

    /// The maximum channel number that can be used on the connection
    ///
    /// This value plus one is the maximum number of sessions that can be simultaneously
    /// active on the connection
    pub fn channel_max(mut self, channel_max: u16) -> Self {
        self.inner.channel_max = channel_max;
        self
    }

    /// The maximum number of sessions that can be established on the connection.
    ///
    /// This modifies the `channel-max` field
    pub fn session_max(mut self, session_max: u16) -> Self {
        self.inner.channel_max = session_max.saturating_sub(1);
        self
    }

    /// Idle time-out advertised in the open
    pub fn idle_time_out(mut self, idle_time_out: impl Into<Milliseconds>) -> Self {
        self.inner.idle_time_out = Some(idle_time_out.into());
        self
    }

    /// Whether links without a target address are accepted
    pub fn anonymous_relay(mut self, enabled: bool) -> Self {
        self.inner.anonymous_relay = enabled;
        self
    }

    /// Whether coordinator links are accepted
    pub fn transactions(mut self, enabled: bool) -> Self {
        self.inner.transactions = enabled;
        self
    }

    /// Incoming window of every session
    pub fn incoming_window(mut self, window: u32) -> Self {
        self.inner.session.incoming_window = window;
        self
    }

    /// Outgoing window of every session
    pub fn outgoing_window(mut self, window: u32) -> Self {
        self.inner.session.outgoing_window = window;
        self
    }

    /// Highest handle the peer may use in a session
    pub fn handle_max(mut self, handle_max: u32) -> Self {
        self.inner.session.handle_max = handle_max;
        self
    }

    /// Credit granted to every sending peer
    pub fn link_credit(mut self, credit: u32) -> Self {
        self.inner.link.credit = credit;
        self
    }

    /// Largest message accepted
    pub fn max_message_size(mut self, max_message_size: impl Into<Option<u64>>) -> Self {
        self.inner.link.max_message_size = max_message_size.into();
        self
    }

    /// Buffer size of the control channel of every connection
    pub fn buffer_size(mut self, buffer_size: usize) -> Self {
        self.inner.buffer_size = buffer_size;
        self
    }
}
