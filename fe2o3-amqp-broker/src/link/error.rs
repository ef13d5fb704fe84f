use fe2o3_amqp_types::definitions::{self, AmqpError, LinkError};

/// Conditions that detach a link
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// A transfer arrived without link credit
    #[error("Transfer limit exceeded")]
    TransferLimitExceeded,

    /// A reassembled message is larger than the max message size
    #[error("Message size {size} exceeds the limit of {max}")]
    MessageSizeExceeded {
        /// Size of the payload received so far
        size: u64,
        /// Configured limit
        max: u64,
    },

    /// A continuation frame changed the delivery id, tag or format
    #[error("Inconsistent field in multi-frame delivery")]
    InconsistentFieldInMultiFrameDelivery,

    /// The first frame of a delivery carried no delivery id or tag
    #[error("First frame of a delivery is missing {0}")]
    MissingField(&'static str),

    /// The peer sent a transfer on a link it is receiving on
    #[error("Transfer on a sending link")]
    TransferOnSender,

    /// Any other condition
    #[error("{0}")]
    Amqp(definitions::Error),
}

impl From<definitions::Error> for Error {
    fn from(err: definitions::Error) -> Self {
        Self::Amqp(err)
    }
}

impl Error {
    /// The error carried by the detach
    pub fn into_amqp_error(self) -> definitions::Error {
        let description = Some(self.to_string());
        match self {
            Error::TransferLimitExceeded => {
                definitions::Error::new(LinkError::TransferLimitExceeded, description, None)
            }
            Error::MessageSizeExceeded { .. } => {
                definitions::Error::new(LinkError::MessageSizeExceeded, description, None)
            }
            Error::InconsistentFieldInMultiFrameDelivery | Error::MissingField(_) => {
                definitions::Error::new(AmqpError::InvalidField, description, None)
            }
            Error::TransferOnSender => {
                definitions::Error::new(AmqpError::NotAllowed, description, None)
            }
            Error::Amqp(err) => err,
        }
    }
}
