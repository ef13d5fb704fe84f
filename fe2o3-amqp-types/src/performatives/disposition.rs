use fe2o3_amqp_codec::{
    composite::{omit_default, optional, Composite, Field, FieldReader, FieldType},
    composite_serde,
    Error, Value,
};

use crate::{
    definitions::{DeliveryNumber, Role},
    messaging::DeliveryState,
};

/// 2.7.6 Disposition
/// Inform remote peer of delivery state changes.
/// <type name="disposition" class="composite" source="list" provides="frame">
///     <descriptor name="amqp:disposition:list" code="0x00000000:0x00000015"/>
///     <field name="role" type="role" mandatory="true"/>
///     <field name="first" type="delivery-number" mandatory="true"/>
///     <field name="last" type="delivery-number"/>
///     <field name="settled" type="boolean" default="false"/>
///     <field name="state" type="*" requires="delivery-state"/>
///     <field name="batchable" type="boolean" default="false"/>
/// </type>
#[derive(Debug, Clone, PartialEq)]
pub struct Disposition {
    /// Directionality of disposition
    pub role: Role,

    /// Lower bound of deliveries
    pub first: DeliveryNumber,

    /// Upper bound of deliveries. If not set, this is taken to be the same as first.
    pub last: Option<DeliveryNumber>,

    /// Indicates deliveries are settled
    pub settled: bool,

    /// Indicates state of deliveries
    pub state: Option<DeliveryState>,

    /// Batchable hint
    pub batchable: bool,
}

impl Disposition {
    /// Inclusive range of delivery ids covered by the disposition
    pub fn range(&self) -> (DeliveryNumber, DeliveryNumber) {
        (self.first, self.last.unwrap_or(self.first))
    }
}

impl Composite for Disposition {
    const NAME: &'static str = "amqp:disposition:list";
    const CODE: u64 = 0x0000_0000_0000_0015;
    const FIELDS: &'static [Field] = &[
        Field::mandatory("role", FieldType::Boolean),
        Field::mandatory("first", FieldType::UInt),
        Field::optional("last", FieldType::UInt),
        Field::optional("settled", FieldType::Boolean),
        Field::optional("state", FieldType::Described),
        Field::optional("batchable", FieldType::Boolean),
    ];

    fn to_fields(&self) -> Vec<Value> {
        vec![
            self.role.into(),
            self.first.into(),
            optional(&self.last),
            omit_default(&self.settled, &false),
            optional(&self.state),
            omit_default(&self.batchable, &false),
        ]
    }

    fn from_fields(reader: &mut FieldReader) -> Result<Self, Error> {
        Ok(Self {
            role: reader.next()?,
            first: reader.next()?,
            last: reader.next_optional()?,
            settled: reader.next_or(false)?,
            state: reader.next_optional_from()?,
            batchable: reader.next_or(false)?,
        })
    }
}

composite_serde!(Disposition);
