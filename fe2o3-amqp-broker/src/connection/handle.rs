use fe2o3_amqp_types::{
    definitions::{self, DeliveryTag},
    messaging::Message,
};
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};

use crate::{control::ConnectionControl, event::ConnectionEvent, router::LinkRef};

use super::{Error, SendError};

/// A handle to the event loop of an accepted connection
///
/// Dropping the handle will also close the connection
#[derive(Debug)]
pub struct ConnectionHandle {
    control: mpsc::Sender<ConnectionControl>,
    events: mpsc::UnboundedReceiver<ConnectionEvent>,
    engine: Option<JoinHandle<Result<(), Error>>>,
}

impl Drop for ConnectionHandle {
    fn drop(&mut self) {
        let _ = self.control.try_send(ConnectionControl::Close(None));
    }
}

impl ConnectionHandle {
    pub(crate) fn new(
        control: mpsc::Sender<ConnectionControl>,
        events: mpsc::UnboundedReceiver<ConnectionEvent>,
        engine: JoinHandle<Result<(), Error>>,
    ) -> Self {
        Self {
            control,
            events,
            engine: Some(engine),
        }
    }

    /// Checks if the underlying event loop has stopped
    pub fn is_closed(&self) -> bool {
        self.control.is_closed()
    }

    /// Waits for the next event of the links the peer attached as receiver
    ///
    /// Returns `None` once the event loop has stopped and every event was taken
    pub async fn next_event(&mut self) -> Option<ConnectionEvent> {
        self.events.recv().await
    }

    /// Sends a message on a link announced by [`ConnectionEvent::SenderAttached`]
    ///
    /// The message is queued on the link and goes out as soon as the peer grants credit.
    /// The returned tag identifies the delivery in later [`ConnectionEvent::Disposition`]s.
    pub async fn send(
        &self,
        link: LinkRef,
        message: Message,
        settled: bool,
    ) -> Result<DeliveryTag, SendError> {
        let (responder, response) = oneshot::channel();
        self.control
            .send(ConnectionControl::Send {
                link,
                message,
                settled,
                responder,
            })
            .await?;
        response.await.map_err(|_| SendError::EngineStopped)?
    }

    /// Close the connection
    pub async fn close(&mut self) -> Result<(), Error> {
        // If sending is unsuccessful, the event loop has already stopped and its result
        // is returned by `on_close`
        let _ = self.control.send(ConnectionControl::Close(None)).await;
        self.on_close().await
    }

    /// Close the connection with an error
    pub async fn close_with_error(
        &mut self,
        error: impl Into<definitions::Error>,
    ) -> Result<(), Error> {
        let _ = self
            .control
            .send(ConnectionControl::Close(Some(error.into())))
            .await;
        self.on_close().await
    }

    /// Returns when the underlying event loop has stopped
    ///
    /// Later calls return `Ok(())` right away.
    pub async fn on_close(&mut self) -> Result<(), Error> {
        match self.engine.take() {
            Some(engine) => engine.await?,
            None => Ok(()),
        }
    }
}
