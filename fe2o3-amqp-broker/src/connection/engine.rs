//! The engine drives a [`Connection`] over its transport and runs routing jobs

use std::sync::Arc;

use fe2o3_amqp_types::states::ConnectionState;
use futures_util::{SinkExt, StreamExt};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    sync::mpsc,
    task::JoinHandle,
};
use tracing::{debug, instrument, trace, warn};

use crate::{
    control::ConnectionControl,
    event::ConnectionEvent,
    frames::amqp::Frame,
    router::{self, RouteCompletion, RouteRequest, Router},
    transport::{self, Transport},
    util::Running,
};

use super::{Connection, Error, OpenError, Outbox};

pub(crate) struct ConnectionEngine<Io, R> {
    transport: Transport<Io>,
    connection: Connection,
    router: Arc<R>,
    control: mpsc::Receiver<ConnectionControl>,
    control_closed: bool,
    completions_tx: mpsc::UnboundedSender<RouteCompletion>,
    completions: mpsc::UnboundedReceiver<RouteCompletion>,
    events: mpsc::UnboundedSender<ConnectionEvent>,
}

impl<Io, R> std::fmt::Debug for ConnectionEngine<Io, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionEngine")
            .field("connection", &self.connection)
            .field("control_closed", &self.control_closed)
            .finish()
    }
}

impl<Io, R> ConnectionEngine<Io, R>
where
    Io: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    R: Router,
{
    /// Waits for the open of the peer without starting the event loop
    pub(crate) async fn open(
        transport: Transport<Io>,
        connection: Connection,
        router: Arc<R>,
        control: mpsc::Receiver<ConnectionControl>,
        events: mpsc::UnboundedSender<ConnectionEvent>,
    ) -> Result<Self, OpenError> {
        let (completions_tx, completions) = mpsc::unbounded_channel();
        let mut engine = Self {
            transport,
            connection,
            router,
            control,
            control_closed: false,
            completions_tx,
            completions,
            events,
        };

        loop {
            let frame = match engine.transport.next().await {
                Some(frame) => frame?,
                None => return Err(OpenError::ConnectionClosed),
            };
            let opened = engine.connection.on_open_frame(frame);
            engine.flush().await?;
            if opened? {
                break;
            }
        }
        Ok(engine)
    }

    pub(crate) fn spawn(self) -> JoinHandle<Result<(), Error>> {
        tokio::spawn(self.event_loop())
    }

    fn on_incoming(&mut self, incoming: Result<Frame, transport::Error>) -> Result<Running, Error> {
        match incoming {
            Ok(frame) => {
                trace!(channel = frame.channel, frame = ?frame.body, "received");
                self.connection.on_frame(frame);
            }
            Err(err) => match err.to_amqp_error() {
                Some(error) => {
                    warn!(?err, "transport error");
                    self.connection.close(Some(error));
                }
                None => return Err(err.into()),
            },
        }
        Ok(self.running())
    }

    fn on_control(&mut self, control: ConnectionControl) -> Running {
        match control {
            ConnectionControl::Send {
                link,
                message,
                settled,
                responder,
            } => {
                let result = self.connection.send(link, &message, settled);
                // the caller may have stopped waiting
                let _ = responder.send(result);
            }
            ConnectionControl::Close(error) => self.connection.close(error),
        }
        self.running()
    }

    fn running(&self) -> Running {
        match self.connection.state() {
            ConnectionState::End => Running::Stop,
            _ => Running::Continue,
        }
    }

    fn spawn_job(&self, request: RouteRequest) {
        let RouteRequest { ticket, job } = request;
        trace!(?ticket, "spawning routing job");
        let router = self.router.clone();
        let completions = self.completions_tx.clone();
        tokio::spawn(async move {
            let result = router::run(&*router, job).await;
            // the receiver lives as long as the engine
            let _ = completions.send(RouteCompletion { ticket, result });
        });
    }

    /// Writes queued frames, spawns queued jobs and forwards queued events
    async fn flush(&mut self) -> Result<(), transport::Error> {
        let Outbox {
            frames,
            requests,
            events,
        } = self.connection.take_outbox();

        for request in requests {
            self.spawn_job(request);
        }
        for event in events {
            if self.events.send(event).is_err() {
                trace!("event dropped, the handle is gone");
            }
        }
        if frames.is_empty() {
            return Ok(());
        }
        for frame in frames {
            trace!(channel = frame.channel, frame = ?frame.body, "sent");
            self.transport.feed(frame).await?;
        }
        self.transport.flush().await
    }

    #[instrument(name = "connection", skip_all, fields(remote = ?self.connection.remote_container_id()))]
    async fn event_loop(mut self) -> Result<(), Error> {
        let outcome = loop {
            let result = tokio::select! {
                incoming = self.transport.next() => match incoming {
                    Some(incoming) => self.on_incoming(incoming),
                    None => {
                        debug!("transport closed");
                        Ok(Running::Stop)
                    }
                },
                Some(completion) = self.completions.recv() => {
                    self.connection.on_route_completion(completion);
                    Ok(self.running())
                },
                control = self.control.recv(), if !self.control_closed => match control {
                    Some(control) => Ok(self.on_control(control)),
                    None => {
                        self.control_closed = true;
                        Ok(Running::Continue)
                    }
                },
            };

            let running = match result {
                Ok(running) => running,
                Err(err) => break Err(err),
            };
            if let Err(err) = self.flush().await {
                break Err(err.into());
            }
            if let Running::Stop = running {
                break Ok(());
            }
        };

        debug!("engine stopped");
        outcome?;
        match (
            self.connection.take_remote_error(),
            self.connection.take_local_error(),
        ) {
            (Some(error), _) => Err(Error::Remote(error)),
            (None, Some(error)) => Err(Error::Local(error)),
            (None, None) => Ok(()),
        }
    }
}
