use fe2o3_amqp_codec::{primitives::Symbol, Value};
use serde::{de, ser, Deserialize, Serialize};

use crate::transaction::TransactionError;

symbol_enum! {
    /// 2.8.15 AMQP Error
    /// Shared error conditions.
    pub enum AmqpError {
        /// An internal error occurred. Operator intervention might be necessary to resume normal
        /// operation.
        InternalError => "amqp:internal-error",
        /// A peer attempted to work with a remote entity that does not exist.
        NotFound => "amqp:not-found",
        /// A peer attempted to work with a remote entity to which it has no access due to security
        /// settings.
        UnauthorizedAccess => "amqp:unauthorized-access",
        /// Data could not be decoded.
        DecodeError => "amqp:decode-error",
        /// A peer exceeded its resource allocation.
        ResourceLimitExceeded => "amqp:resource-limit-exceeded",
        /// The peer tried to use a frame in a manner that is inconsistent with the semantics
        /// defined in the specification.
        NotAllowed => "amqp:not-allowed",
        /// An invalid field was passed in a frame body, and the operation could not proceed.
        InvalidField => "amqp:invalid-field",
        /// The peer tried to use functionality that is not implemented in its partner.
        NotImplemented => "amqp:not-implemented",
        /// The client attempted to work with a server entity to which it has no access because
        /// another client is working with it.
        ResourceLocked => "amqp:resource-locked",
        /// The client made a request that was not allowed because some precondition failed.
        PreconditionFailed => "amqp:precondition-failed",
        /// A server entity the client is working with has been deleted.
        ResourceDeleted => "amqp:resource-deleted",
        /// The peer sent a frame that is not permitted in the current state.
        IllegalState => "amqp:illegal-state",
        /// The peer cannot send a frame because the smallest encoding of the performative with
        /// the currently valid values would be too large to fit within a frame of the agreed
        /// maximum frame size.
        FrameSizeTooSmall => "amqp:frame-size-too-small",
    }
}

symbol_enum! {
    /// 2.8.16 Connection Error
    /// Symbols used to indicate connection error conditions.
    pub enum ConnectionError {
        /// An operator intervened to close the connection for some reason.
        ConnectionForced => "amqp:connection:forced",
        /// A valid frame header cannot be formed from the incoming byte stream.
        FramingError => "amqp:connection:framing-error",
        /// The container is no longer available on the current connection.
        Redirect => "amqp:connection:redirect",
    }
}

symbol_enum! {
    /// 2.8.17 Session Error
    /// Symbols used to indicate session error conditions.
    pub enum SessionError {
        /// The peer violated incoming window for the session.
        WindowViolation => "amqp:session:window-violation",
        /// Input was received for a link that was detached with an error.
        ErrantLink => "amqp:session:errant-link",
        /// An attach was received using a handle that is already in use for an attached link.
        HandleInUse => "amqp:session:handle-in-use",
        /// A frame (other than attach) was received referencing a handle which is not
        /// currently in use of an attached link.
        UnattachedHandle => "amqp:session:unattached-handle",
    }
}

symbol_enum! {
    /// 2.8.18 Link Error
    /// Symbols used to indicate link error conditions.
    pub enum LinkError {
        /// An operator intervened to detach for some reason.
        DetachForced => "amqp:link:detach-forced",
        /// The peer sent more message transfers than currently allowed on the link.
        TransferLimitExceeded => "amqp:link:transfer-limit-exceeded",
        /// The peer sent a larger message than is supported on the link.
        MessageSizeExceeded => "amqp:link:message-size-exceeded",
        /// The address provided cannot be resolved to a terminus at the current container.
        Redirect => "amqp:link:redirect",
        /// The link has been attached elsewhere, causing the existing attachment to be forcibly
        /// closed.
        Stolen => "amqp:link:stolen",
    }
}

/// Condition carried by [`super::Error`]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum ErrorCondition {
    AmqpError(AmqpError),
    ConnectionError(ConnectionError),
    SessionError(SessionError),
    LinkError(LinkError),
    TransactionError(TransactionError),
    Custom(Symbol),
}

impl ErrorCondition {
    /// Symbolic value carried on the wire
    pub fn as_str(&self) -> &str {
        match self {
            ErrorCondition::AmqpError(err) => err.as_str(),
            ErrorCondition::ConnectionError(err) => err.as_str(),
            ErrorCondition::SessionError(err) => err.as_str(),
            ErrorCondition::LinkError(err) => err.as_str(),
            ErrorCondition::TransactionError(err) => err.as_str(),
            ErrorCondition::Custom(symbol) => symbol.as_str(),
        }
    }
}

impl std::fmt::Display for ErrorCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<AmqpError> for ErrorCondition {
    fn from(err: AmqpError) -> Self {
        ErrorCondition::AmqpError(err)
    }
}

impl From<ConnectionError> for ErrorCondition {
    fn from(err: ConnectionError) -> Self {
        ErrorCondition::ConnectionError(err)
    }
}

impl From<SessionError> for ErrorCondition {
    fn from(err: SessionError) -> Self {
        ErrorCondition::SessionError(err)
    }
}

impl From<LinkError> for ErrorCondition {
    fn from(err: LinkError) -> Self {
        ErrorCondition::LinkError(err)
    }
}

impl From<TransactionError> for ErrorCondition {
    fn from(err: TransactionError) -> Self {
        ErrorCondition::TransactionError(err)
    }
}

impl From<&ErrorCondition> for Symbol {
    fn from(value: &ErrorCondition) -> Self {
        Symbol::from(value.as_str())
    }
}

impl From<ErrorCondition> for Value {
    fn from(value: ErrorCondition) -> Self {
        Value::Symbol((&value).into())
    }
}

/// Any symbol is a valid condition, unknown ones are kept as [`ErrorCondition::Custom`]
impl From<Symbol> for ErrorCondition {
    fn from(symbol: Symbol) -> Self {
        let v = symbol.as_str();
        if let Ok(err) = AmqpError::try_from(v) {
            return err.into();
        }
        if let Ok(err) = ConnectionError::try_from(v) {
            return err.into();
        }
        if let Ok(err) = SessionError::try_from(v) {
            return err.into();
        }
        if let Ok(err) = LinkError::try_from(v) {
            return err.into();
        }
        if let Ok(err) = TransactionError::try_from(v) {
            return err.into();
        }
        ErrorCondition::Custom(symbol)
    }
}

impl ser::Serialize for ErrorCondition {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        Symbol::from(self).serialize(serializer)
    }
}

impl<'de> de::Deserialize<'de> for ErrorCondition {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        Symbol::deserialize(deserializer).map(ErrorCondition::from)
    }
}

#[cfg(test)]
mod tests {
    use fe2o3_amqp_codec::{from_slice, from_value, to_vec, Value};

    use crate::transaction::TransactionError;

    use super::{AmqpError, ErrorCondition};

    #[test]
    fn decode_error_condition() {
        let expected = ErrorCondition::AmqpError(AmqpError::DecodeError);
        let mut sym_val = "amqp:decode-error".as_bytes().to_vec();
        let mut buf = vec![0xa3, sym_val.len() as u8];
        buf.append(&mut sym_val);

        assert_eq!(from_slice::<ErrorCondition>(&buf).unwrap(), expected);
        assert_eq!(to_vec(&expected).unwrap(), buf);

        let value: Value = from_slice(&buf).unwrap();
        assert_eq!(from_value::<ErrorCondition>(value).unwrap(), expected);
    }

    #[test]
    fn transaction_and_custom_conditions() {
        let rollback = ErrorCondition::from(fe2o3_amqp_codec::primitives::Symbol::from(
            "amqp:transaction:rollback",
        ));
        assert_eq!(
            rollback,
            ErrorCondition::TransactionError(TransactionError::TransactionRollback)
        );

        let custom = ErrorCondition::from(fe2o3_amqp_codec::primitives::Symbol::from(
            "com.example:oops",
        ));
        assert_eq!(custom.as_str(), "com.example:oops");
    }
}
