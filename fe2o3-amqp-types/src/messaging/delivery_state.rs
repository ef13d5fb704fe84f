//! Part 3.4 delivery state

use fe2o3_amqp_codec::{
    composite::{
        descriptor_of, from_described, is, optional, to_described, type_name, Composite,
        Field, FieldReader, FieldType,
    },
    composite_serde,
    descriptor::Descriptor,
    primitives::Symbol,
    Error, Value,
};

use crate::{
    definitions::{self, Fields},
    transaction::{Declared, TransactionalState},
};

/// 3.4 Delivery State
#[derive(Debug, Clone, PartialEq)]
pub enum DeliveryState {
    /// 3.4.1 Received
    Received(Received),

    /// 3.4.2 Accepted
    Accepted(Accepted),

    /// 3.4.3 Rejected
    Rejected(Rejected),

    /// 3.4.4 Released
    Released(Released),

    /// 3.4.5 Modified
    Modified(Modified),

    /// 4.5.5 Declared
    Declared(Declared),

    /// 4.5.6 Transactional State
    TransactionalState(TransactionalState),
}

impl DeliveryState {
    /// Whether a state is a terminal state
    pub fn is_terminal(&self) -> bool {
        match self {
            DeliveryState::Accepted(_)
            | DeliveryState::Rejected(_)
            | DeliveryState::Released(_)
            | DeliveryState::Modified(_)
            | DeliveryState::Declared(_) => true,
            DeliveryState::Received(_) | DeliveryState::TransactionalState(_) => false,
        }
    }
}

impl From<Outcome> for DeliveryState {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Accepted(val) => DeliveryState::Accepted(val),
            Outcome::Rejected(val) => DeliveryState::Rejected(val),
            Outcome::Released(val) => DeliveryState::Released(val),
            Outcome::Modified(val) => DeliveryState::Modified(val),
            Outcome::Declared(val) => DeliveryState::Declared(val),
        }
    }
}

impl From<&DeliveryState> for Value {
    fn from(state: &DeliveryState) -> Self {
        match state {
            DeliveryState::Received(val) => to_described(val),
            DeliveryState::Accepted(val) => to_described(val),
            DeliveryState::Rejected(val) => to_described(val),
            DeliveryState::Released(val) => to_described(val),
            DeliveryState::Modified(val) => to_described(val),
            DeliveryState::Declared(val) => to_described(val),
            DeliveryState::TransactionalState(val) => to_described(val),
        }
    }
}

fn descriptor(value: &Value, expected: &'static str) -> Result<Descriptor, Error> {
    descriptor_of(value)
        .cloned()
        .ok_or_else(|| Error::invalid_type(expected, type_name(value)))
}

impl TryFrom<Value> for DeliveryState {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let descriptor = descriptor(&value, "delivery-state")?;
        if is::<Received>(&descriptor) {
            from_described(value).map(DeliveryState::Received)
        } else if is::<TransactionalState>(&descriptor) {
            from_described(value).map(DeliveryState::TransactionalState)
        } else {
            Outcome::try_from(value).map(DeliveryState::from)
        }
    }
}

/// A terminal delivery state is also referred to as Outcome
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// 3.4.2 Accepted
    Accepted(Accepted),

    /// 3.4.3 Rejected
    Rejected(Rejected),

    /// 3.4.4 Released
    Released(Released),

    /// 3.4.5 Modified
    Modified(Modified),

    /// 4.5.5 Declared
    Declared(Declared),
}

impl Outcome {
    /// Symbolic descriptor of the outcome, as listed in [`super::Source::outcomes`]
    pub fn descriptor_name(&self) -> &'static str {
        match self {
            Outcome::Accepted(_) => Accepted::NAME,
            Outcome::Rejected(_) => Rejected::NAME,
            Outcome::Released(_) => Released::NAME,
            Outcome::Modified(_) => Modified::NAME,
            Outcome::Declared(_) => Declared::NAME,
        }
    }

    /// A rejected outcome carrying the error
    pub fn rejected(error: impl Into<definitions::Error>) -> Self {
        Outcome::Rejected(Rejected {
            error: Some(error.into()),
        })
    }
}

impl From<&Outcome> for Value {
    fn from(outcome: &Outcome) -> Self {
        match outcome {
            Outcome::Accepted(val) => to_described(val),
            Outcome::Rejected(val) => to_described(val),
            Outcome::Released(val) => to_described(val),
            Outcome::Modified(val) => to_described(val),
            Outcome::Declared(val) => to_described(val),
        }
    }
}

impl TryFrom<Value> for Outcome {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let descriptor = descriptor(&value, "outcome")?;
        if is::<Accepted>(&descriptor) {
            from_described(value).map(Outcome::Accepted)
        } else if is::<Rejected>(&descriptor) {
            from_described(value).map(Outcome::Rejected)
        } else if is::<Released>(&descriptor) {
            from_described(value).map(Outcome::Released)
        } else if is::<Modified>(&descriptor) {
            from_described(value).map(Outcome::Modified)
        } else if is::<Declared>(&descriptor) {
            from_described(value).map(Outcome::Declared)
        } else {
            Err(Error::UnknownDescriptor(descriptor))
        }
    }
}

described_enum_serde!(DeliveryState, Outcome);

/// Symbolic descriptors of the standard outcomes
pub mod outcome_symbols {
    /// `amqp:accepted:list`
    pub const ACCEPTED: &str = "amqp:accepted:list";
    /// `amqp:rejected:list`
    pub const REJECTED: &str = "amqp:rejected:list";
    /// `amqp:released:list`
    pub const RELEASED: &str = "amqp:released:list";
    /// `amqp:modified:list`
    pub const MODIFIED: &str = "amqp:modified:list";
}

impl From<&Outcome> for Symbol {
    fn from(outcome: &Outcome) -> Self {
        Symbol::from(outcome.descriptor_name())
    }
}

/// 3.4.1 Received
/// <type name="received" class="composite" source="list" provides="delivery-state">
///     <descriptor name="amqp:received:list" code="0x00000000:0x00000023"/>
///     <field name="section-number" type="uint" mandatory="true"/>
///     <field name="section-offset" type="ulong" mandatory="true"/>
/// </type>
#[derive(Debug, Clone, PartialEq)]
pub struct Received {
    /// <field name="section-number" type="uint" mandatory="true"/>
    pub section_number: u32,

    /// <field name="section-offset" type="ulong" mandatory="true"/>
    pub section_offset: u64,
}

impl Composite for Received {
    const NAME: &'static str = "amqp:received:list";
    const CODE: u64 = 0x0000_0000_0000_0023;
    const FIELDS: &'static [Field] = &[
        Field::mandatory("section-number", FieldType::UInt),
        Field::mandatory("section-offset", FieldType::ULong),
    ];

    fn to_fields(&self) -> Vec<Value> {
        vec![
            self.section_number.into(),
            self.section_offset.into(),
        ]
    }

    fn from_fields(reader: &mut FieldReader) -> Result<Self, Error> {
        Ok(Self {
            section_number: reader.next()?,
            section_offset: reader.next()?,
        })
    }
}

/// 3.4.2 Accepted
/// The accepted outcome.
/// <type name="accepted" class="composite" source="list" provides="delivery-state, outcome">
///     <descriptor name="amqp:accepted:list" code="0x00000000:0x00000024"/>
/// </type>
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Accepted {}

impl Composite for Accepted {
    const NAME: &'static str = outcome_symbols::ACCEPTED;
    const CODE: u64 = 0x0000_0000_0000_0024;
    const FIELDS: &'static [Field] = &[];

    fn to_fields(&self) -> Vec<Value> {
        Vec::new()
    }

    fn from_fields(_: &mut FieldReader) -> Result<Self, Error> {
        Ok(Self {})
    }
}

/// 3.4.3 Rejected
/// The rejected outcome.
/// <type name="rejected" class="composite" source="list" provides="delivery-state, outcome">
///     <descriptor name="amqp:rejected:list" code="0x00000000:0x00000025"/>
///     <field name="error" type="error"/>
/// </type>
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Rejected {
    /// The value supplied in this field will be placed in the delivery-annotations of the
    /// rejected message associated with the symbolic key "rejected".
    pub error: Option<definitions::Error>,
}

impl Composite for Rejected {
    const NAME: &'static str = outcome_symbols::REJECTED;
    const CODE: u64 = 0x0000_0000_0000_0025;
    const FIELDS: &'static [Field] = &[Field::optional("error", FieldType::Described)];

    fn to_fields(&self) -> Vec<Value> {
        vec![optional(&self.error)]
    }

    fn from_fields(reader: &mut FieldReader) -> Result<Self, Error> {
        Ok(Self {
            error: reader.next_optional_from()?,
        })
    }
}

/// 3.4.4 Released
/// The released outcome.
/// <type name="released" class="composite" source="list" provides="delivery-state, outcome">
///     <descriptor name="amqp:released:list" code="0x00000000:0x00000026"/>
/// </type>
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Released {}

impl Composite for Released {
    const NAME: &'static str = outcome_symbols::RELEASED;
    const CODE: u64 = 0x0000_0000_0000_0026;
    const FIELDS: &'static [Field] = &[];

    fn to_fields(&self) -> Vec<Value> {
        Vec::new()
    }

    fn from_fields(_: &mut FieldReader) -> Result<Self, Error> {
        Ok(Self {})
    }
}

/// 3.4.5 Modified
/// The modified outcome.
/// <type name="modified" class="composite" source="list" provides="delivery-state, outcome">
///     <descriptor name="amqp:modified:list" code="0x00000000:0x00000027"/>
///     <field name="delivery-failed" type="boolean"/>
///     <field name="undeliverable-here" type="boolean"/>
///     <field name="message-annotations" type="fields"/>
/// </type>
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Modified {
    /// Count the transfer as an unsuccessful delivery attempt
    pub delivery_failed: Option<bool>,

    /// Prevent redelivery
    pub undeliverable_here: Option<bool>,

    /// Message attributes to combine with existing message annotations
    pub message_annotations: Option<Fields>,
}

impl Composite for Modified {
    const NAME: &'static str = outcome_symbols::MODIFIED;
    const CODE: u64 = 0x0000_0000_0000_0027;
    const FIELDS: &'static [Field] = &[
        Field::optional("delivery-failed", FieldType::Boolean),
        Field::optional("undeliverable-here", FieldType::Boolean),
        Field::optional("message-annotations", FieldType::Map),
    ];

    fn to_fields(&self) -> Vec<Value> {
        vec![
            optional(&self.delivery_failed),
            optional(&self.undeliverable_here),
            optional(&self.message_annotations),
        ]
    }

    fn from_fields(reader: &mut FieldReader) -> Result<Self, Error> {
        Ok(Self {
            delivery_failed: reader.next_optional()?,
            undeliverable_here: reader.next_optional()?,
            message_annotations: reader.next_map()?,
        })
    }
}

composite_serde!(Received, Accepted, Rejected, Released, Modified);

#[cfg(test)]
mod tests {
    use fe2o3_amqp_codec::{from_slice, to_vec};

    use crate::{
        definitions::AmqpError,
        transaction::{TransactionId, TransactionalState},
    };

    use super::{Accepted, DeliveryState, Modified, Outcome, Received};

    fn round_trip(state: DeliveryState) -> DeliveryState {
        let buf = to_vec(&state).unwrap();
        from_slice(&buf).unwrap()
    }

    #[test]
    fn accepted_is_an_empty_described_list() {
        let buf = to_vec(&DeliveryState::Accepted(Accepted {})).unwrap();
        assert_eq!(buf, [0x00, 0x53, 0x24, 0x45]);
    }

    #[test]
    fn delivery_states_round_trip() {
        let states = vec![
            DeliveryState::Received(Received {
                section_number: 1,
                section_offset: 1 << 40,
            }),
            Outcome::rejected(AmqpError::NotFound).into(),
            DeliveryState::Modified(Modified {
                delivery_failed: Some(true),
                ..Default::default()
            }),
            DeliveryState::TransactionalState(TransactionalState {
                txn_id: TransactionId::from(vec![0u8, 1, 2, 3]),
                outcome: Some(Outcome::Accepted(Accepted {})),
            }),
        ];
        for state in states {
            assert_eq!(round_trip(state.clone()), state);
        }
    }

    #[test]
    fn terminal_states() {
        assert!(DeliveryState::Accepted(Accepted {}).is_terminal());
        assert!(!DeliveryState::Received(Received {
            section_number: 0,
            section_offset: 0
        })
        .is_terminal());
    }
}
