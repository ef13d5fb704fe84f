//! Implements errors associated with the connection

use std::io;

use fe2o3_amqp_codec::Error as CodecError;
use fe2o3_amqp_types::definitions::{self, AmqpError, ConnectionError};
use tokio::{sync::mpsc, task::JoinError};

use crate::{
    router::LinkRef,
    transport::{self, NegotiationError},
};

/// Errors associated with a running connection
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error
    #[error("IO Error {0:?}")]
    Io(#[from] io::Error),

    /// The transport failed and the connection was closed with the corresponding error
    #[error(transparent)]
    Transport(transport::Error),

    /// The engine task panicked or was cancelled
    #[error(transparent)]
    JoinError(#[from] JoinError),

    /// A local error. The connection was closed with it.
    #[error("Local error {:?}", .0)]
    Local(definitions::Error),

    /// The remote peer closed with the provided error
    #[error("Remote error {:?}", .0)]
    Remote(definitions::Error),
}

impl From<transport::Error> for Error {
    fn from(err: transport::Error) -> Self {
        match err {
            transport::Error::Io(err) => Self::Io(err),
            other => Self::Transport(other),
        }
    }
}

impl Error {
    pub(crate) fn amqp_error(
        condition: impl Into<AmqpError>,
        description: impl Into<Option<String>>,
    ) -> Self {
        Self::Local(definitions::Error::new(
            condition.into(),
            description.into(),
            None,
        ))
    }

    pub(crate) fn connection_error(
        condition: impl Into<ConnectionError>,
        description: impl Into<Option<String>>,
    ) -> Self {
        Self::Local(definitions::Error::new(
            condition.into(),
            description.into(),
            None,
        ))
    }
}

/// Error associated with opening a connection
#[derive(Debug, thiserror::Error)]
pub enum OpenError {
    /// IO error
    #[error("IO Error {0:?}")]
    Io(#[from] io::Error),

    /// The transport failed before the open arrived
    #[error(transparent)]
    Transport(transport::Error),

    /// Protocol negotiation failed due to protocol header mismatch
    #[error("Protocol header mismatch. Found {0:?}")]
    ProtocolHeaderMismatch([u8; 8]),

    /// A frame other than open arrived first
    #[error("Illegal state, expecting an open")]
    IllegalState,

    /// The peer closed the stream before the open arrived
    #[error("Connection closed before open")]
    ConnectionClosed,
}

impl From<NegotiationError> for OpenError {
    fn from(err: NegotiationError) -> Self {
        match err {
            NegotiationError::Io(err) => Self::Io(err),
            NegotiationError::ProtocolHeaderMismatch(buf) => Self::ProtocolHeaderMismatch(buf),
        }
    }
}

impl From<transport::Error> for OpenError {
    fn from(err: transport::Error) -> Self {
        match err {
            transport::Error::Io(err) => Self::Io(err),
            other => Self::Transport(other),
        }
    }
}

/// Error sending a message to a peer attached as receiver
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    /// No attached sending link matches the reference
    #[error("Link not found {0:?}")]
    LinkNotFound(LinkRef),

    /// The connection is not open
    #[error("Illegal connection state")]
    IllegalState,

    /// The message could not be encoded
    #[error(transparent)]
    Encode(CodecError),

    /// The engine has stopped
    #[error("Connection engine stopped")]
    EngineStopped,
}

impl<T> From<mpsc::error::SendError<T>> for SendError {
    fn from(_: mpsc::error::SendError<T>) -> Self {
        Self::EngineStopped
    }
}
