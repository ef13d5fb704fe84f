//! Local transactions
//!
//! A branch collects the messages enlisted with its transaction id. Nothing is forwarded
//! before the branch is committed by a discharge. A branch that fails to enlist a message is
//! marked rollback-only and its discharge reports the failure.

use std::collections::HashMap;

use fe2o3_amqp_codec::primitives::Binary;
use fe2o3_amqp_types::{messaging::Message, transaction::TransactionId};
use tracing::debug;

use crate::router::{LinkRef, RoutingTarget};

pub(crate) mod coordinator;
mod error;

pub use error::Error;

/// A declared transaction
#[derive(Debug, Default)]
pub struct Branch {
    /// Id of the coordinator link that declared the branch
    pub owner: u64,

    /// Set once an enlistment failed
    pub rollback_only: bool,

    /// Messages to forward at commit, in enlistment order
    pub enlisted: Vec<(RoutingTarget, Message)>,

    /// Deliveries received with the id but not yet enlisted
    pending: usize,

    /// Coordinator link whose discharge waits for the pending enlistments
    waiting: Option<LinkRef>,
}

/// Result of a discharge
#[derive(Debug, PartialEq)]
pub enum Discharged {
    /// Enlistments are still pending, the discharge is retried once they are done
    Parked,

    /// The branch was rolled back on request
    RolledBack,

    /// The branch is healthy and has nothing to forward
    Committed,

    /// The branch is healthy, the messages are to be forwarded in order
    Commit(Vec<(RoutingTarget, Message)>),

    /// The branch was rollback-only
    RollbackOnly,
}

/// Branches declared on a connection
#[derive(Debug, Default)]
pub struct TransactionManager {
    branches: HashMap<TransactionId, Branch>,
    ready: Vec<LinkRef>,
}

impl TransactionManager {
    /// Creates an empty manager
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of declared branches
    pub fn len(&self) -> usize {
        self.branches.len()
    }

    /// Whether no branch is declared
    pub fn is_empty(&self) -> bool {
        self.branches.is_empty()
    }

    /// The branch declared with the id
    pub fn get(&self, txn_id: &TransactionId) -> Option<&Branch> {
        self.branches.get(txn_id)
    }

    /// Declares a new branch owned by the coordinator link
    pub fn declare(&mut self, owner: u64) -> TransactionId {
        let txn_id = Binary::from(uuid::Uuid::new_v4().as_bytes().to_vec());
        self.branches.insert(
            txn_id.clone(),
            Branch {
                owner,
                ..Default::default()
            },
        );
        debug!(txn_id = ?txn_id, owner, "declared");
        txn_id
    }

    /// Counts a delivery that will be enlisted. Returns `false` if the id is unknown.
    pub fn begin_enlistment(&mut self, txn_id: &TransactionId) -> bool {
        match self.branches.get_mut(txn_id) {
            Some(branch) => {
                branch.pending += 1;
                true
            }
            None => false,
        }
    }

    fn finish_enlistment(&mut self, txn_id: &TransactionId) {
        if let Some(branch) = self.branches.get_mut(txn_id) {
            branch.pending = branch.pending.saturating_sub(1);
            if branch.pending == 0 {
                if let Some(link) = branch.waiting.take() {
                    self.ready.push(link);
                }
            }
        }
    }

    /// Records a message for the commit of the branch
    pub fn enlist(
        &mut self,
        txn_id: &TransactionId,
        target: RoutingTarget,
        message: Message,
    ) -> Result<(), Error> {
        let result = match self.branches.get_mut(txn_id) {
            Some(branch) if branch.rollback_only => Err(Error::Rollback),
            Some(branch) => {
                branch.enlisted.push((target, message));
                Ok(())
            }
            None => Err(Error::UnknownId(txn_id.clone())),
        };
        self.finish_enlistment(txn_id);
        result
    }

    /// Marks the branch rollback-only after a failed enlistment
    pub fn fail_enlistment(&mut self, txn_id: &TransactionId) {
        if let Some(branch) = self.branches.get_mut(txn_id) {
            debug!(txn_id = ?txn_id, "marked rollback-only");
            branch.rollback_only = true;
        }
        self.finish_enlistment(txn_id);
    }

    /// Discharges the branch. If enlistments are pending, `waiter` is resumed once they are
    /// done.
    pub fn discharge(
        &mut self,
        txn_id: &TransactionId,
        fail: bool,
        waiter: LinkRef,
    ) -> Result<Discharged, Error> {
        let branch = self
            .branches
            .get_mut(txn_id)
            .ok_or_else(|| Error::UnknownId(txn_id.clone()))?;
        if branch.pending > 0 {
            branch.waiting = Some(waiter);
            return Ok(Discharged::Parked);
        }

        let branch = self
            .branches
            .remove(txn_id)
            .ok_or_else(|| Error::UnknownId(txn_id.clone()))?;
        debug!(txn_id = ?txn_id, fail, rollback_only = branch.rollback_only, "discharged");
        let discharged = match (fail, branch.rollback_only) {
            (true, _) => Discharged::RolledBack,
            (false, true) => Discharged::RollbackOnly,
            (false, false) if branch.enlisted.is_empty() => Discharged::Committed,
            (false, false) => Discharged::Commit(branch.enlisted),
        };
        Ok(discharged)
    }

    /// Rolls back every branch owned by the coordinator link
    pub fn discard_owned_by(&mut self, owner: u64) -> usize {
        let before = self.branches.len();
        self.branches.retain(|_, branch| branch.owner != owner);
        before - self.branches.len()
    }

    /// Coordinator links whose parked discharge can be retried
    pub fn take_ready(&mut self) -> Vec<LinkRef> {
        std::mem::take(&mut self.ready)
    }
}

#[cfg(test)]
mod tests {
    use fe2o3_amqp_codec::primitives::Binary;
    use fe2o3_amqp_types::messaging::Message;

    use crate::router::{LinkRef, RoutingTarget};

    use super::{Discharged, Error, TransactionManager};

    fn coordinator() -> LinkRef {
        LinkRef {
            channel: 0,
            handle: 0,
            id: 1,
        }
    }

    #[test]
    fn declared_ids_are_unique() {
        let mut manager = TransactionManager::new();
        let a = manager.declare(1);
        let b = manager.declare(1);
        assert_ne!(a, b);
        assert_eq!(a.len(), 16);
        assert_eq!(manager.len(), 2);
    }

    #[test]
    fn commit_returns_messages_in_order() {
        let mut manager = TransactionManager::new();
        let txn_id = manager.declare(1);
        for body in ["1", "2"] {
            assert!(manager.begin_enlistment(&txn_id));
            manager
                .enlist(&txn_id, RoutingTarget::new("q"), Message::new(body))
                .unwrap();
        }
        match manager.discharge(&txn_id, false, coordinator()).unwrap() {
            Discharged::Commit(messages) => {
                assert_eq!(messages[0].1, Message::new("1"));
                assert_eq!(messages[1].1, Message::new("2"));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(manager.is_empty());
    }

    #[test]
    fn failed_enlistment_poisons_the_branch() {
        let mut manager = TransactionManager::new();
        let txn_id = manager.declare(1);
        manager.begin_enlistment(&txn_id);
        manager.fail_enlistment(&txn_id);

        manager.begin_enlistment(&txn_id);
        assert_eq!(
            manager.enlist(&txn_id, RoutingTarget::new("q"), Message::new("x")),
            Err(Error::Rollback)
        );
        assert_eq!(
            manager.discharge(&txn_id, false, coordinator()),
            Ok(Discharged::RollbackOnly)
        );
    }

    #[test]
    fn fail_discards_without_failure() {
        let mut manager = TransactionManager::new();
        let txn_id = manager.declare(1);
        manager.begin_enlistment(&txn_id);
        manager.fail_enlistment(&txn_id);
        assert_eq!(
            manager.discharge(&txn_id, true, coordinator()),
            Ok(Discharged::RolledBack)
        );
    }

    #[test]
    fn discharge_waits_for_pending_enlistments() {
        let mut manager = TransactionManager::new();
        let txn_id = manager.declare(1);
        manager.begin_enlistment(&txn_id);

        assert_eq!(
            manager.discharge(&txn_id, false, coordinator()),
            Ok(Discharged::Parked)
        );
        assert!(manager.take_ready().is_empty());

        manager
            .enlist(&txn_id, RoutingTarget::new("q"), Message::new("x"))
            .unwrap();
        assert_eq!(manager.take_ready(), vec![coordinator()]);
        assert!(matches!(
            manager.discharge(&txn_id, false, coordinator()),
            Ok(Discharged::Commit(_))
        ));
    }

    #[test]
    fn unknown_id_is_reported() {
        let mut manager = TransactionManager::new();
        let unknown = Binary::from(vec![0xde, 0xad]);
        assert!(!manager.begin_enlistment(&unknown));
        assert_eq!(
            manager.discharge(&unknown, false, coordinator()),
            Err(Error::UnknownId(unknown))
        );
    }

    #[test]
    fn owned_branches_are_discarded() {
        let mut manager = TransactionManager::new();
        manager.declare(1);
        manager.declare(1);
        let other = manager.declare(2);
        assert_eq!(manager.discard_owned_by(1), 2);
        assert!(manager.get(&other).is_some());
    }
}
