use fe2o3_amqp_types::definitions::{self, AmqpError, DeliveryNumber, Handle, SessionError};

/// Conditions that end a session
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// A frame referenced a handle that is not attached
    #[error("Handle {0:?} is not attached")]
    UnattachedHandle(Handle),

    /// An attach used a handle that is already attached
    #[error("Handle {0:?} is in use")]
    HandleInUse(Handle),

    /// An attach used a handle beyond the announced handle max
    #[error("Handle {handle:?} exceeds the handle max {handle_max}")]
    HandleMaxExceeded {
        /// Handle of the attach
        handle: Handle,
        /// Announced handle max
        handle_max: u32,
    },

    /// A transfer arrived while the incoming window was closed
    #[error("Incoming window exceeded")]
    WindowViolation,

    /// A disposition covered no unsettled delivery
    #[error("Deliveries {first}..={last} are already settled")]
    AlreadySettled {
        /// First delivery id of the disposition
        first: DeliveryNumber,
        /// Last delivery id of the disposition
        last: DeliveryNumber,
    },

    /// The last delivery id of a disposition precedes its first
    #[error("Disposition range {first}..={last} is reversed")]
    ReversedRange {
        /// First delivery id of the disposition
        first: DeliveryNumber,
        /// Last delivery id of the disposition
        last: DeliveryNumber,
    },
}

impl Error {
    /// The error carried by the end
    pub fn to_amqp_error(&self) -> definitions::Error {
        let description = Some(self.to_string());
        match self {
            Error::UnattachedHandle(_) => {
                definitions::Error::new(SessionError::UnattachedHandle, description, None)
            }
            Error::HandleInUse(_) => {
                definitions::Error::new(SessionError::HandleInUse, description, None)
            }
            Error::HandleMaxExceeded { .. } => {
                definitions::Error::new(AmqpError::NotAllowed, description, None)
            }
            Error::WindowViolation => {
                definitions::Error::new(SessionError::WindowViolation, description, None)
            }
            Error::AlreadySettled { .. } => {
                definitions::Error::new(AmqpError::IllegalState, description, None)
            }
            Error::ReversedRange { .. } => {
                definitions::Error::new(AmqpError::InvalidField, description, None)
            }
        }
    }
}
