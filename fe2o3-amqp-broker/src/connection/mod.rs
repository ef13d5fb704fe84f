//! Connections accepted from peers
//!
//! [`Connection`] is the synchronous state of one connection. It takes decoded frames and
//! routing completions and records what has to happen next in an [`Outbox`]: frames to
//! write, routing jobs to spawn and events for the [`ConnectionHandle`]. The
//! [`engine::ConnectionEngine`] drives it over the transport.

use std::collections::HashMap;

use fe2o3_amqp_codec::primitives::{Array, Symbol};
use fe2o3_amqp_types::{
    definitions::{self, AmqpError, ConnectionError, DeliveryTag, MIN_MAX_FRAME_SIZE},
    messaging::Message,
    performatives::{
        Attach, Begin, Close, Detach, Disposition, End, Flow, Open, PerformativeHandler, Transfer,
    },
    states::ConnectionState,
};
use slab::Slab;
use tracing::{debug, error, instrument, trace, warn};

use crate::{
    acceptor::AcceptorConfig,
    event::ConnectionEvent,
    frames::amqp::{Frame, FrameBody},
    router::{LinkRef, RouteCompletion, RouteRequest},
    session::{self, Session, SessionContext},
    transaction::TransactionManager,
    Payload,
};

pub(crate) mod engine;
mod error;
mod handle;

pub use error::{Error, OpenError, SendError};
pub use handle::ConnectionHandle;

/// Capability offered when links without a target address are accepted
pub const ANONYMOUS_RELAY: &str = "ANONYMOUS-RELAY";

/// Work produced while handling input
#[derive(Debug, Default)]
pub(crate) struct Outbox {
    pub frames: Vec<Frame>,
    pub requests: Vec<RouteRequest>,
    pub events: Vec<ConnectionEvent>,
}

impl Outbox {
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty() && self.requests.is_empty() && self.events.is_empty()
    }
}

#[derive(Debug)]
pub(crate) struct Connection {
    state: ConnectionState,
    config: AcceptorConfig,
    remote_container_id: Option<String>,
    max_frame_size: usize,
    channel_max: u16,

    /// Keyed by local channel
    sessions: Slab<Session>,
    incoming_channels: HashMap<u16, usize>,

    transactions: TransactionManager,
    next_link_id: u64,
    outbox: Outbox,
    local_error: Option<definitions::Error>,
    remote_error: Option<definitions::Error>,
}

impl Connection {
    pub fn new(config: AcceptorConfig) -> Self {
        Self {
            state: ConnectionState::HeaderExchange,
            max_frame_size: config.local_max_frame_size() as usize,
            channel_max: config.channel_max,
            config,
            remote_container_id: None,
            sessions: Slab::new(),
            incoming_channels: HashMap::new(),
            transactions: TransactionManager::new(),
            next_link_id: 0,
            outbox: Outbox::default(),
            local_error: None,
            remote_error: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Negotiated max frame size
    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    pub fn remote_container_id(&self) -> Option<&str> {
        self.remote_container_id.as_deref()
    }

    pub fn take_outbox(&mut self) -> Outbox {
        std::mem::take(&mut self.outbox)
    }

    pub fn take_remote_error(&mut self) -> Option<definitions::Error> {
        self.remote_error.take()
    }

    pub fn take_local_error(&mut self) -> Option<definitions::Error> {
        self.local_error.take()
    }

    fn local_open(&self) -> Open {
        let mut open = Open::new(self.config.container_id.clone());
        open.max_frame_size = self.config.local_max_frame_size();
        open.channel_max = self.config.channel_max;
        open.idle_time_out = self.config.idle_time_out;
        if self.config.anonymous_relay {
            open.offered_capabilities = Some(Array(vec![Symbol::from(ANONYMOUS_RELAY)]));
        }
        open
    }

    /// Handles a frame before the connection is open. Returns `true` once the open arrived.
    pub fn on_open_frame(&mut self, frame: Frame) -> Result<bool, OpenError> {
        match frame.into_body() {
            FrameBody::Empty => Ok(false),
            FrameBody::Open(open) => {
                self.on_remote_open(open);
                Ok(true)
            }
            other => {
                error!(frame = ?other, "expecting an open");
                let open = self.local_open();
                let close = Close::new(Some(definitions::Error::new(
                    AmqpError::IllegalState,
                    Some("Expecting an open".to_string()),
                    None,
                )));
                self.outbox.frames.push(Frame::new(0u16, open));
                self.outbox.frames.push(Frame::new(0u16, close));
                self.state = ConnectionState::End;
                Err(OpenError::IllegalState)
            }
        }
    }

    fn on_remote_open(&mut self, open: Open) {
        debug!(
            container_id = %open.container_id,
            max_frame_size = open.max_frame_size,
            channel_max = open.channel_max,
            "open received"
        );
        let local_max = self.config.local_max_frame_size();
        self.max_frame_size = std::cmp::max(
            MIN_MAX_FRAME_SIZE,
            std::cmp::min(local_max, open.max_frame_size) as usize,
        );
        self.channel_max = std::cmp::min(self.config.channel_max, open.channel_max);

        let local = self.local_open();
        self.outbox.frames.push(Frame::new(0u16, local));
        self.remote_container_id = Some(open.container_id);
        self.state = ConnectionState::Opened;
    }

    /// Handles a frame of an open connection
    pub fn on_frame(&mut self, frame: Frame) {
        if self.state.is_discarding() && !frame.body.is_close() {
            trace!(frame = ?frame.body, "discarded");
            return;
        }

        let channel = frame.channel;
        let result = match frame.body.into_performative() {
            Some((performative, payload)) => performative.dispatch(channel, payload, self),
            None => Ok(()),
        };
        if let Err(err) = result {
            self.fail(err);
        }
        self.resume_ready();
    }

    pub fn on_route_completion(&mut self, completion: RouteCompletion) {
        let channel = completion.ticket.link.channel as usize;
        let session = match self.sessions.get_mut(channel) {
            Some(session) if !session.is_discarding() => session,
            _ => {
                trace!(?completion, "completion for a session that is gone");
                return;
            }
        };
        let mut ctx = SessionContext {
            outbox: &mut self.outbox,
            transactions: &mut self.transactions,
            config: &self.config,
            next_link_id: &mut self.next_link_id,
            max_frame_size: self.max_frame_size,
        };
        session.on_route_completion(&mut ctx, completion);
        self.resume_ready();
    }

    /// Resumes coordinator links whose discharge waited for enlistments that have finished
    fn resume_ready(&mut self) {
        loop {
            let ready = self.transactions.take_ready();
            if ready.is_empty() {
                break;
            }
            for link in ready {
                if let Some(session) = self.sessions.get_mut(link.channel as usize) {
                    let mut ctx = SessionContext {
                        outbox: &mut self.outbox,
                        transactions: &mut self.transactions,
                        config: &self.config,
                        next_link_id: &mut self.next_link_id,
                        max_frame_size: self.max_frame_size,
                    };
                    session.resume(&mut ctx, link);
                }
            }
        }
    }

    /// Sends a message on a link the peer attached as receiver
    pub fn send(
        &mut self,
        link: LinkRef,
        message: &Message,
        settled: bool,
    ) -> Result<DeliveryTag, SendError> {
        if self.state != ConnectionState::Opened {
            return Err(SendError::IllegalState);
        }
        let session = match self.sessions.get_mut(link.channel as usize) {
            Some(session) if !session.is_discarding() => session,
            _ => return Err(SendError::LinkNotFound(link)),
        };
        let mut ctx = SessionContext {
            outbox: &mut self.outbox,
            transactions: &mut self.transactions,
            config: &self.config,
            next_link_id: &mut self.next_link_id,
            max_frame_size: self.max_frame_size,
        };
        session.send_message(&mut ctx, link, message, settled)
    }

    /// Closes the connection. Frames other than the close of the peer are dropped afterwards.
    pub fn close(&mut self, error: Option<definitions::Error>) {
        if self.state != ConnectionState::Opened {
            debug!(state = ?self.state, "close ignored");
            return;
        }
        match &error {
            Some(error) => error!(%error, "closing connection"),
            None => debug!("closing connection"),
        }
        self.outbox.frames.push(Frame::new(
            0u16,
            Close {
                error: error.clone(),
            },
        ));
        self.state = match error {
            Some(_) => ConnectionState::Discarding,
            None => ConnectionState::CloseSent,
        };
        self.local_error = error.clone();
        self.release_sessions(error);
    }

    /// Closes the connection with the error that made a frame unacceptable
    fn fail(&mut self, err: Error) {
        let error = match err {
            Error::Local(error) => error,
            other => definitions::Error::new(AmqpError::InternalError, Some(other.to_string()), None),
        };
        self.close(Some(error));
    }

    fn release_sessions(&mut self, error: Option<definitions::Error>) {
        let mut ctx = SessionContext {
            outbox: &mut self.outbox,
            transactions: &mut self.transactions,
            config: &self.config,
            next_link_id: &mut self.next_link_id,
            max_frame_size: self.max_frame_size,
        };
        for (_, session) in self.sessions.iter_mut() {
            session.release(&mut ctx, error.clone());
        }
        self.sessions.clear();
        self.incoming_channels.clear();
    }

    fn session_key(&self, channel: u16) -> Result<usize, Error> {
        self.incoming_channels.get(&channel).copied().ok_or_else(|| {
            Error::connection_error(
                ConnectionError::FramingError,
                format!("Channel {} is not mapped", channel),
            )
        })
    }

    /// Runs `f` on the session mapped to `channel`. Session errors end the session only.
    fn with_session<F>(&mut self, channel: u16, f: F) -> Result<(), Error>
    where
        F: FnOnce(&mut Session, &mut SessionContext<'_>) -> Result<(), session::Error>,
    {
        let key = self.session_key(channel)?;
        let session = match self.sessions.get_mut(key) {
            Some(session) => session,
            None => {
                return Err(Error::amqp_error(
                    AmqpError::InternalError,
                    format!("Session of channel {} is gone", channel),
                ))
            }
        };
        if session.is_discarding() {
            trace!(channel, "session is discarding");
            return Ok(());
        }

        let mut ctx = SessionContext {
            outbox: &mut self.outbox,
            transactions: &mut self.transactions,
            config: &self.config,
            next_link_id: &mut self.next_link_id,
            max_frame_size: self.max_frame_size,
        };
        if let Err(err) = f(session, &mut ctx) {
            session.end_with_error(&mut ctx, err);
        }
        Ok(())
    }
}

impl PerformativeHandler for Connection {
    type Error = Error;

    fn on_open(&mut self, _channel: u16, _open: Open) -> Result<(), Self::Error> {
        Err(Error::amqp_error(
            AmqpError::IllegalState,
            Some("Open received twice".to_string()),
        ))
    }

    #[instrument(skip_all, fields(channel = channel))]
    fn on_begin(&mut self, channel: u16, begin: Begin) -> Result<(), Self::Error> {
        if begin.remote_channel.is_some() {
            return Err(Error::connection_error(
                ConnectionError::FramingError,
                Some("Begin answers a session that was never begun".to_string()),
            ));
        }
        if channel > self.channel_max || self.incoming_channels.contains_key(&channel) {
            return Err(Error::connection_error(
                ConnectionError::FramingError,
                format!("Channel {} is not available", channel),
            ));
        }

        let entry = self.sessions.vacant_entry();
        let local_channel = entry.key();
        if local_channel > self.channel_max as usize {
            return Err(Error::connection_error(
                ConnectionError::FramingError,
                Some("No channel left".to_string()),
            ));
        }
        let mut session = Session::new(local_channel as u16, channel, &begin, &self.config.session);
        let mut ctx = SessionContext {
            outbox: &mut self.outbox,
            transactions: &mut self.transactions,
            config: &self.config,
            next_link_id: &mut self.next_link_id,
            max_frame_size: self.max_frame_size,
        };
        session.begin(&mut ctx);
        entry.insert(session);
        self.incoming_channels.insert(channel, local_channel);
        Ok(())
    }

    fn on_attach(&mut self, channel: u16, attach: Attach) -> Result<(), Self::Error> {
        self.with_session(channel, |session, ctx| session.on_attach(ctx, attach))
    }

    fn on_flow(&mut self, channel: u16, flow: Flow) -> Result<(), Self::Error> {
        self.with_session(channel, |session, ctx| session.on_flow(ctx, flow))
    }

    fn on_transfer(
        &mut self,
        channel: u16,
        transfer: Transfer,
        payload: Payload,
    ) -> Result<(), Self::Error> {
        self.with_session(channel, |session, ctx| {
            session.on_transfer(ctx, transfer, payload)
        })
    }

    fn on_disposition(
        &mut self,
        channel: u16,
        disposition: Disposition,
    ) -> Result<(), Self::Error> {
        self.with_session(channel, |session, ctx| {
            session.on_disposition(ctx, disposition)
        })
    }

    fn on_detach(&mut self, channel: u16, detach: Detach) -> Result<(), Self::Error> {
        self.with_session(channel, |session, ctx| session.on_detach(ctx, detach))
    }

    fn on_end(&mut self, channel: u16, end: End) -> Result<(), Self::Error> {
        let key = self.session_key(channel)?;
        if let Some(session) = self.sessions.get_mut(key) {
            let mut ctx = SessionContext {
                outbox: &mut self.outbox,
                transactions: &mut self.transactions,
                config: &self.config,
                next_link_id: &mut self.next_link_id,
                max_frame_size: self.max_frame_size,
            };
            session.on_end(&mut ctx, end);
            self.sessions.remove(key);
        }
        self.incoming_channels.remove(&channel);
        Ok(())
    }

    fn on_close(&mut self, _channel: u16, close: Close) -> Result<(), Self::Error> {
        if let Some(error) = &close.error {
            warn!(%error, "connection closed by peer");
        }
        if self.state == ConnectionState::Opened {
            self.outbox.frames.push(Frame::new(0u16, Close::default()));
            self.release_sessions(close.error.clone());
        }
        self.state = ConnectionState::End;
        self.remote_error = close.error;
        debug!("closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use fe2o3_amqp_types::{
        definitions::{AmqpError, ConnectionError, ErrorCondition, Handle},
        performatives::{Begin, Close, End, Open},
        states::ConnectionState,
    };

    use crate::{
        acceptor::AcceptorConfig,
        frames::amqp::{Frame, FrameBody},
    };

    use super::{Connection, OpenError, ANONYMOUS_RELAY};

    fn begin() -> Begin {
        Begin {
            remote_channel: None,
            next_outgoing_id: 0,
            incoming_window: 10,
            outgoing_window: 10,
            handle_max: Handle(u32::MAX),
            offered_capabilities: None,
            desired_capabilities: None,
            properties: None,
        }
    }

    fn opened(config: AcceptorConfig) -> Connection {
        let mut connection = Connection::new(config);
        let opened = connection
            .on_open_frame(Frame::new(0u16, Open::new("client")))
            .unwrap();
        assert!(opened);
        connection.take_outbox();
        connection
    }

    fn bodies(connection: &mut Connection) -> Vec<FrameBody> {
        connection
            .take_outbox()
            .frames
            .into_iter()
            .map(|frame| frame.into_body())
            .collect()
    }

    #[test]
    fn open_negotiates_max_frame_size() {
        let mut config = AcceptorConfig::default();
        config.max_frame_size = 100;
        let mut connection = Connection::new(config);

        let mut open = Open::new("client");
        open.max_frame_size = 4096;
        assert!(connection.on_open_frame(Frame::new(0u16, open)).unwrap());
        assert_eq!(connection.state(), ConnectionState::Opened);
        assert_eq!(connection.max_frame_size(), 512);
        assert_eq!(connection.remote_container_id(), Some("client"));

        match &bodies(&mut connection)[..] {
            [FrameBody::Open(open)] => {
                assert_eq!(open.max_frame_size, 512);
                assert!(open.offers(ANONYMOUS_RELAY));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn anonymous_relay_is_not_offered_when_disabled() {
        let mut config = AcceptorConfig::default();
        config.anonymous_relay = false;
        let mut connection = Connection::new(config);
        connection
            .on_open_frame(Frame::new(0u16, Open::new("client")))
            .unwrap();
        match &bodies(&mut connection)[..] {
            [FrameBody::Open(open)] => assert!(!open.offers(ANONYMOUS_RELAY)),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn empty_frames_before_open_are_ignored() {
        let mut connection = Connection::new(AcceptorConfig::default());
        assert!(!connection.on_open_frame(Frame::empty()).unwrap());
        assert!(connection.take_outbox().is_empty());
    }

    #[test]
    fn begin_before_open_is_illegal() {
        let mut connection = Connection::new(AcceptorConfig::default());
        let result = connection.on_open_frame(Frame::new(0u16, begin()));
        assert!(matches!(result, Err(OpenError::IllegalState)));
        match &bodies(&mut connection)[..] {
            [FrameBody::Open(_), FrameBody::Close(close)] => {
                let condition = &close.error.as_ref().unwrap().condition;
                assert_eq!(condition, &ErrorCondition::from(AmqpError::IllegalState));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn begin_on_used_channel_closes_connection() {
        let mut connection = opened(AcceptorConfig::default());
        connection.on_frame(Frame::new(1u16, begin()));
        assert!(matches!(&bodies(&mut connection)[..], [FrameBody::Begin(_)]));

        connection.on_frame(Frame::new(1u16, begin()));
        match &bodies(&mut connection)[..] {
            [FrameBody::Close(close)] => {
                let condition = &close.error.as_ref().unwrap().condition;
                assert_eq!(condition, &ErrorCondition::from(ConnectionError::FramingError));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(connection.state(), ConnectionState::Discarding);

        // only the close of the peer is handled now
        connection.on_frame(Frame::new(2u16, begin()));
        assert!(connection.take_outbox().is_empty());
        connection.on_frame(Frame::new(0u16, Close::default()));
        assert_eq!(connection.state(), ConnectionState::End);
        assert!(connection.take_outbox().is_empty());
    }

    #[test]
    fn begin_reply_uses_free_local_channel() {
        let mut connection = opened(AcceptorConfig::default());
        connection.on_frame(Frame::new(7u16, begin()));
        let frames = connection.take_outbox().frames;
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].channel(), 0);
        match frames[0].body() {
            FrameBody::Begin(reply) => assert_eq!(reply.remote_channel, Some(7)),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn end_is_answered() {
        let mut connection = opened(AcceptorConfig::default());
        connection.on_frame(Frame::new(3u16, begin()));
        connection.take_outbox();

        connection.on_frame(Frame::new(3u16, End::default()));
        match &bodies(&mut connection)[..] {
            [FrameBody::End(end)] => assert!(end.error.is_none()),
            other => panic!("unexpected {:?}", other),
        }

        // the channel is free again
        connection.on_frame(Frame::new(3u16, begin()));
        assert!(matches!(&bodies(&mut connection)[..], [FrameBody::Begin(_)]));
    }

    #[test]
    fn close_of_peer_is_answered_and_kept() {
        let mut connection = opened(AcceptorConfig::default());
        let error = fe2o3_amqp_types::definitions::Error::with_condition(
            ConnectionError::ConnectionForced,
        );
        connection.on_frame(Frame::new(0u16, Close::new(Some(error.clone()))));
        match &bodies(&mut connection)[..] {
            [FrameBody::Close(close)] => assert!(close.error.is_none()),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(connection.state(), ConnectionState::End);
        assert_eq!(connection.take_remote_error(), Some(error));
    }

    #[test]
    fn frame_on_unmapped_channel_is_a_framing_error() {
        let mut connection = opened(AcceptorConfig::default());
        connection.on_frame(Frame::new(
            4u16,
            FrameBody::Transfer {
                performative: fe2o3_amqp_types::performatives::Transfer::new(Handle(0)),
                payload: Bytes::new(),
            },
        ));
        match &bodies(&mut connection)[..] {
            [FrameBody::Close(close)] => {
                let condition = &close.error.as_ref().unwrap().condition;
                assert_eq!(condition, &ErrorCondition::from(ConnectionError::FramingError));
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
