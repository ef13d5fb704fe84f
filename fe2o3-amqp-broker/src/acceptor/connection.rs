//! Connection acceptor

use std::sync::Arc;

use tokio::{
    io::{AsyncRead, AsyncWrite},
    sync::mpsc,
};
use tracing::{debug, instrument};

use crate::{
    connection::{engine::ConnectionEngine, Connection, ConnectionHandle, OpenError},
    router::Router,
    transport::{protocol_header::negotiate, Transport},
    util::Uninitialized,
};

use super::{builder::Builder, AcceptorConfig};

/// Acceptor for incoming connections
///
/// Every accepted connection runs in its own task and routes the deliveries it receives
/// through the shared [`Router`].
///
/// # Accepts incoming connections with the default configuration
///
/// ```rust, ignore
/// use tokio::net::TcpListener;
/// use fe2o3_amqp_broker::acceptor::ConnectionAcceptor;
///
/// let tcp_listener = TcpListener::bind("localhost:5672").await.unwrap();
/// let connection_acceptor = ConnectionAcceptor::new("example-broker", router);
///
/// while let Ok((stream, addr)) = tcp_listener.accept().await {
///     // Any type that implements `AsyncRead` and `AsyncWrite` can be used
///     let connection = connection_acceptor.accept(stream).await.unwrap();
/// }
/// ```
///
/// ## Default configuration
///
/// | Field | Default Value |
/// |-------|---------------|
/// |`max_frame_size`| [`super::DEFAULT_MAX_FRAME_SIZE`] |
/// |`channel_max`| [`super::DEFAULT_CHANNEL_MAX`] |
/// |`idle_time_out`| `None` |
/// |`anonymous_relay`| `true` |
/// |`transactions`| `true` |
/// |`session.incoming_window`| [`super::DEFAULT_WINDOW`] |
/// |`session.outgoing_window`| [`super::DEFAULT_WINDOW`] |
/// |`session.handle_max`| [`super::DEFAULT_HANDLE_MAX`] |
/// |`link.credit`| [`super::DEFAULT_LINK_CREDIT`] |
/// |`link.max_message_size`| `None` |
/// |`buffer_size`| [`super::DEFAULT_BUFFER_SIZE`] |
///
/// # Customize configuration
///
/// The [`ConnectionAcceptor`] can be configured either using the builder pattern
/// or modifying the public `config` field after the acceptor is built.
///
/// ```rust, ignore
/// use fe2o3_amqp_broker::acceptor::ConnectionAcceptor;
///
/// let connection_acceptor = ConnectionAcceptor::builder()
///     .container_id("example-broker")
///     .max_frame_size(4096) // Customize max frame size
///     .anonymous_relay(false)
///     .build(router);
/// ```
#[derive(Debug)]
pub struct ConnectionAcceptor<R> {
    /// Configuration of every accepted connection
    pub config: AcceptorConfig,
    router: Arc<R>,
}

impl<R> Clone for ConnectionAcceptor<R> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            router: self.router.clone(),
        }
    }
}

impl ConnectionAcceptor<()> {
    /// Creates a builder for [`ConnectionAcceptor`]
    pub fn builder() -> Builder<Uninitialized> {
        Builder::new()
    }
}

impl<R> ConnectionAcceptor<R>
where
    R: Router,
{
    /// Creates an acceptor with the default configuration
    pub fn new(container_id: impl Into<String>, router: R) -> Self {
        let config = AcceptorConfig {
            container_id: container_id.into(),
            ..Default::default()
        };
        Self::with_config(config, router)
    }

    /// Creates an acceptor with the given configuration
    pub fn with_config(config: AcceptorConfig, router: R) -> Self {
        Self {
            config,
            router: Arc::new(router),
        }
    }

    /// The router shared by every accepted connection
    pub fn router(&self) -> &Arc<R> {
        &self.router
    }

    /// Exchanges the protocol header, waits for the open of the peer and spawns the event
    /// loop of the connection
    #[instrument(skip_all, fields(container_id = %self.config.container_id))]
    pub async fn accept<Io>(&self, mut io: Io) -> Result<ConnectionHandle, OpenError>
    where
        Io: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        negotiate(&mut io).await?;
        debug!("protocol header exchanged");

        let transport = Transport::bind(io, self.config.local_max_frame_size() as usize);
        let (control_tx, control_rx) = mpsc::channel(self.config.buffer_size.max(1));
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let connection = Connection::new(self.config.clone());

        let engine = ConnectionEngine::open(
            transport,
            connection,
            self.router.clone(),
            control_rx,
            events_tx,
        )
        .await?;
        debug!("opened");
        let engine = engine.spawn();
        Ok(ConnectionHandle::new(control_tx, events_rx, engine))
    }
}
