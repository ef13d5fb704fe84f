use std::io;

use fe2o3_amqp_types::definitions::{self, AmqpError, ConnectionError};

/// Errors raised while turning bytes into frames and back
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error
    #[error("IO Error {0:?}")]
    Io(#[from] io::Error),

    /// The performative could not be decoded
    #[error("Decode error: {0}")]
    Decode(fe2o3_amqp_codec::Error),

    /// The performative could not be encoded
    #[error("Encode error: {0}")]
    Encode(fe2o3_amqp_codec::Error),

    /// The data offset points inside the fixed header
    #[error("Invalid data offset {0}")]
    InvalidDataOffset(u8),

    /// Only AMQP frames are accepted
    #[error("Unsupported frame type {0:#04x}")]
    UnsupportedFrameType(u8),

    /// The frame is shorter than its header
    #[error("Frame is shorter than its header")]
    Truncated,
}

impl Error {
    /// The AMQP error sent to the peer in a close
    pub fn to_amqp_error(&self) -> definitions::Error {
        let condition: definitions::ErrorCondition = match self {
            Error::Decode(_) => AmqpError::DecodeError.into(),
            Error::Io(_) | Error::Encode(_) => AmqpError::InternalError.into(),
            Error::InvalidDataOffset(_) | Error::UnsupportedFrameType(_) | Error::Truncated => {
                ConnectionError::FramingError.into()
            }
        };
        definitions::Error::new(condition, Some(self.to_string()), None)
    }
}
