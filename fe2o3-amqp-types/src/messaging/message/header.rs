use fe2o3_amqp_codec::{
    composite::{omit_default, optional, Composite, Field, FieldReader, FieldType},
    composite_serde,
    Error, Value,
};

use crate::definitions::Milliseconds;

/// 3.2.1 Header
/// Transport headers for a message.
/// <type name="header" class="composite" source="list" provides="section">
///     <descriptor name="amqp:header:list" code="0x00000000:0x00000070"/>
///     <field name="durable" type="boolean" default="false"/>
///     <field name="priority" type="ubyte" default="4"/>
///     <field name="ttl" type="milliseconds"/>
///     <field name="first-acquirer" type="boolean" default="false"/>
///     <field name="delivery-count" type="uint" default="0"/>
/// </type>
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    /// Specify durability requirements
    pub durable: bool,

    /// Relative message priority
    pub priority: u8,

    /// Time to live in ms
    pub ttl: Option<Milliseconds>,

    /// If this value is true, then this message has not been acquired by any other link
    pub first_acquirer: bool,

    /// The number of prior unsuccessful delivery attempts
    pub delivery_count: u32,
}

impl Default for Header {
    fn default() -> Self {
        Self {
            durable: false,
            priority: 4,
            ttl: None,
            first_acquirer: false,
            delivery_count: 0,
        }
    }
}

impl Composite for Header {
    const NAME: &'static str = "amqp:header:list";
    const CODE: u64 = 0x0000_0000_0000_0070;
    const FIELDS: &'static [Field] = &[
        Field::optional("durable", FieldType::Boolean),
        Field::optional("priority", FieldType::UByte),
        Field::optional("ttl", FieldType::UInt),
        Field::optional("first-acquirer", FieldType::Boolean),
        Field::optional("delivery-count", FieldType::UInt),
    ];

    fn to_fields(&self) -> Vec<Value> {
        vec![
            omit_default(&self.durable, &false),
            omit_default(&self.priority, &4),
            optional(&self.ttl),
            omit_default(&self.first_acquirer, &false),
            omit_default(&self.delivery_count, &0),
        ]
    }

    fn from_fields(reader: &mut FieldReader) -> Result<Self, Error> {
        Ok(Self {
            durable: reader.next_or(false)?,
            priority: reader.next_or(4)?,
            ttl: reader.next_optional()?,
            first_acquirer: reader.next_or(false)?,
            delivery_count: reader.next_or(0)?,
        })
    }
}

composite_serde!(Header);
