use fe2o3_amqp_types::{
    definitions::{self, AmqpError},
    transaction::{TransactionError, TransactionId},
};

/// Errors of the transaction coordinator
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// No branch is declared with the id
    #[error("Unknown transaction id {0:?}")]
    UnknownId(TransactionId),

    /// The branch is marked rollback-only
    #[error("Transaction is marked rollback-only")]
    Rollback,

    /// Declare carried a global id
    #[error("Global transactions are not implemented")]
    GlobalIdNotImplemented,
}

impl Error {
    /// The error reported to the peer
    pub fn to_amqp_error(&self) -> definitions::Error {
        let description = Some(self.to_string());
        match self {
            Error::UnknownId(_) => {
                definitions::Error::new(TransactionError::UnknownId, description, None)
            }
            Error::Rollback => {
                definitions::Error::new(TransactionError::TransactionRollback, description, None)
            }
            Error::GlobalIdNotImplemented => {
                definitions::Error::new(AmqpError::NotImplemented, description, None)
            }
        }
    }
}
