//! Part 4: Transactions

mod control;
mod txn_capability;
mod txn_error;

pub use control::{ControlHandler, ControlMessage};
pub use txn_capability::TxnCapability;
pub use txn_error::TransactionError;

use fe2o3_amqp_codec::{
    composite::{omit_default, optional, Composite, Field, FieldReader, FieldType},
    composite_serde,
    primitives::{Array, Binary, Symbol},
    Error, Value,
};

use crate::messaging::Outcome;

/// 4.5.3 Transaction Id
/// <type name="transaction-id" class="restricted" source="binary" provides="txn-id"/>
pub type TransactionId = Binary;

/// 4.5.1 Coordinator
/// Target for communicating with a transaction coordinator.
///
/// <type name="coordinator" class="composite" source="list" provides="target">
///     <descriptor name="amqp:coordinator:list" code="0x00000000:0x00000030"/>
///     <field name="capabilities" type="symbol" requires="txn-capability" multiple="true"/>
/// </type>
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Coordinator {
    /// The capabilities supported at the coordinator
    ///
    /// Kept as raw symbols so that capabilities from later revisions are carried through
    pub capabilities: Option<Array<Symbol>>,
}

impl Coordinator {
    /// Creates a new coordinator
    pub fn new(capabilities: impl IntoIterator<Item = TxnCapability>) -> Self {
        Self {
            capabilities: Some(capabilities.into_iter().map(|c| Symbol::from(&c)).collect()),
        }
    }

    /// Whether the capability is listed
    pub fn supports(&self, capability: TxnCapability) -> bool {
        self.capabilities
            .as_ref()
            .map(|caps| caps.iter().any(|c| c.as_str() == capability.as_str()))
            .unwrap_or(false)
    }
}

impl Composite for Coordinator {
    const NAME: &'static str = "amqp:coordinator:list";
    const CODE: u64 = 0x0000_0000_0000_0030;
    const FIELDS: &'static [Field] = &[Field::optional("capabilities", FieldType::Symbols)];

    fn to_fields(&self) -> Vec<Value> {
        vec![optional(&self.capabilities)]
    }

    fn from_fields(reader: &mut FieldReader) -> Result<Self, Error> {
        Ok(Self {
            capabilities: reader.next_multiple()?,
        })
    }
}

/// 4.5.2 Declare
/// Message body for declaring a transaction id.
///
/// <type name="declare" class="composite" source="list">
///     <descriptor name="amqp:declare:list" code="0x00000000:0x00000031"/>
///     <field name="global-id" type="*" requires="global-tx-id"/>
/// </type>
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Declare {
    /// Global transaction id
    ///
    /// Only meaningful for distributed transactions
    pub global_id: Option<Value>,
}

impl Composite for Declare {
    const NAME: &'static str = "amqp:declare:list";
    const CODE: u64 = 0x0000_0000_0000_0031;
    const FIELDS: &'static [Field] = &[Field::optional("global-id", FieldType::Any)];

    fn to_fields(&self) -> Vec<Value> {
        vec![optional(&self.global_id)]
    }

    fn from_fields(reader: &mut FieldReader) -> Result<Self, Error> {
        Ok(Self {
            global_id: reader.next_value(),
        })
    }
}

/// 4.5.3 Discharge
/// Message body for discharging a transaction.
///
/// <type name="discharge" class="composite" source="list">
///     <descriptor name="amqp:discharge:list" code="0x00000000:0x00000032"/>
///     <field name="txn-id" type="*" mandatory="true" requires="txn-id"/>
///     <field name="fail" type="boolean"/>
/// </type>
#[derive(Debug, Clone, PartialEq)]
pub struct Discharge {
    /// Identifies the transaction to be discharged
    pub txn_id: TransactionId,

    /// Indicates the transaction should be rolled back
    pub fail: bool,
}

impl Composite for Discharge {
    const NAME: &'static str = "amqp:discharge:list";
    const CODE: u64 = 0x0000_0000_0000_0032;
    const FIELDS: &'static [Field] = &[
        Field::mandatory("txn-id", FieldType::Binary),
        Field::optional("fail", FieldType::Boolean),
    ];

    fn to_fields(&self) -> Vec<Value> {
        vec![self.txn_id.clone().into(), omit_default(&self.fail, &false)]
    }

    fn from_fields(reader: &mut FieldReader) -> Result<Self, Error> {
        Ok(Self {
            txn_id: reader.next()?,
            fail: reader.next_or(false)?,
        })
    }
}

/// 4.5.5 Declared
///
/// <type name="declared" class="composite" source="list" provides="delivery-state, outcome">
///     <descriptor name="amqp:declared:list" code="0x00000000:0x00000033"/>
///     <field name="txn-id" type="*" mandatory="true" requires="txn-id"/>
/// </type>
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declared {
    /// The txn-id allocated for the transaction
    pub txn_id: TransactionId,
}

impl Composite for Declared {
    const NAME: &'static str = "amqp:declared:list";
    const CODE: u64 = 0x0000_0000_0000_0033;
    const FIELDS: &'static [Field] = &[Field::mandatory("txn-id", FieldType::Binary)];

    fn to_fields(&self) -> Vec<Value> {
        vec![self.txn_id.clone().into()]
    }

    fn from_fields(reader: &mut FieldReader) -> Result<Self, Error> {
        Ok(Self {
            txn_id: reader.next()?,
        })
    }
}

/// 4.5.6 Transactional State
/// The state of a transactional message transfer.
///
/// <type name="transactional-state" class="composite" source="list" provides="delivery-state">
///     <descriptor name="amqp:transactional-state:list" code="0x00000000:0x00000034"/>
///     <field name="txn-id" type="*" mandatory="true" requires="txn-id"/>
///     <field name="outcome" type="*" requires="outcome"/>
/// </type>
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionalState {
    /// Identifies the transaction with which the state is associated
    pub txn_id: TransactionId,

    /// Provisional outcome
    pub outcome: Option<Outcome>,
}

impl Composite for TransactionalState {
    const NAME: &'static str = "amqp:transactional-state:list";
    const CODE: u64 = 0x0000_0000_0000_0034;
    const FIELDS: &'static [Field] = &[
        Field::mandatory("txn-id", FieldType::Binary),
        Field::optional("outcome", FieldType::Described),
    ];

    fn to_fields(&self) -> Vec<Value> {
        vec![self.txn_id.clone().into(), optional(&self.outcome)]
    }

    fn from_fields(reader: &mut FieldReader) -> Result<Self, Error> {
        Ok(Self {
            txn_id: reader.next()?,
            outcome: reader.next_optional_from()?,
        })
    }
}

composite_serde!(Coordinator, Declare, Discharge, Declared, TransactionalState);
