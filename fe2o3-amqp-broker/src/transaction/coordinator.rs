//! Control messages received on a coordinator link

use fe2o3_amqp_types::{
    definitions,
    messaging::{Accepted, Message, Outcome},
    transaction::{ControlHandler, Declare, Declared, Discharge},
};
use tracing::instrument;

use crate::router::{LinkRef, RoutingTarget};

use super::{Discharged, Error, TransactionManager};

/// What the coordinator link does with a control message
#[derive(Debug, PartialEq)]
pub(crate) enum ControlAction {
    /// Settle the control message with the outcome
    Settle(Outcome),

    /// The control message failed with the error
    Fail(definitions::Error),

    /// Forward the messages, then settle
    Commit(Vec<(RoutingTarget, Message)>),

    /// Retry once pending enlistments are done
    Park,
}

/// Handles the control messages of one coordinator link
#[derive(Debug)]
pub(crate) struct Coordinator<'a> {
    pub transactions: &'a mut TransactionManager,
    pub link: LinkRef,
}

impl<'a> ControlHandler for Coordinator<'a> {
    type Output = ControlAction;

    #[instrument(skip_all, fields(link_id = self.link.id))]
    fn on_declare(&mut self, declare: Declare) -> Self::Output {
        if declare.global_id.is_some() {
            return ControlAction::Fail(Error::GlobalIdNotImplemented.to_amqp_error());
        }
        let txn_id = self.transactions.declare(self.link.id);
        ControlAction::Settle(Outcome::Declared(Declared { txn_id }))
    }

    #[instrument(skip_all, fields(link_id = self.link.id, fail = discharge.fail))]
    fn on_discharge(&mut self, discharge: Discharge) -> Self::Output {
        match self
            .transactions
            .discharge(&discharge.txn_id, discharge.fail, self.link)
        {
            Ok(Discharged::Parked) => ControlAction::Park,
            Ok(Discharged::RolledBack) | Ok(Discharged::Committed) => {
                ControlAction::Settle(Outcome::Accepted(Accepted {}))
            }
            Ok(Discharged::Commit(messages)) => ControlAction::Commit(messages),
            Ok(Discharged::RollbackOnly) => ControlAction::Fail(Error::Rollback.to_amqp_error()),
            Err(err) => ControlAction::Fail(err.to_amqp_error()),
        }
    }
}
