use std::io;

use fe2o3_amqp_types::definitions::{self, ConnectionError};

use crate::frames;

/// Error with the transport
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error
    #[error("IO Error {0:?}")]
    Io(#[from] io::Error),

    /// A frame larger than the negotiated max frame size arrived
    #[error("Max frame size exceeded")]
    MaxFrameSizeExceeded,

    /// The frame could not be decoded
    #[error(transparent)]
    Frame(frames::Error),
}

impl From<frames::Error> for Error {
    fn from(err: frames::Error) -> Self {
        match err {
            frames::Error::Io(err) => Error::Io(err),
            other => Error::Frame(other),
        }
    }
}

impl Error {
    /// The error sent in the close when the transport fails. IO errors leave nothing to send.
    pub fn to_amqp_error(&self) -> Option<definitions::Error> {
        match self {
            Error::Io(_) => None,
            Error::MaxFrameSizeExceeded => Some(definitions::Error::new(
                ConnectionError::FramingError,
                Some(self.to_string()),
                None,
            )),
            Error::Frame(err) => Some(err.to_amqp_error()),
        }
    }
}

/// Error with the protocol header exchange
#[derive(Debug, thiserror::Error)]
pub enum NegotiationError {
    /// IO error
    #[error("IO Error {0:?}")]
    Io(#[from] io::Error),

    /// The peer sent a header other than the plain AMQP 1.0.0 header
    #[error("Protocol header mismatch {0:?}")]
    ProtocolHeaderMismatch([u8; 8]),
}
