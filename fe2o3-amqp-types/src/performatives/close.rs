use fe2o3_amqp_codec::{
    composite::{optional, Composite, Field, FieldReader, FieldType},
    composite_serde,
    Error, Value,
};

use crate::definitions;

/// 2.7.9 Close
/// Signal a connection close.
/// <type name="close" class="composite" source="list" provides="frame">
///     <descriptor name="amqp:close:list" code="0x00000000:0x00000018"/>
///     <field name="error" type="error"/>
/// </type>
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Close {
    /// If set, this field indicates that the connection is being closed due to an error
    /// condition.
    pub error: Option<definitions::Error>,
}

impl Close {
    /// Creates a new close frame
    pub fn new(error: Option<definitions::Error>) -> Self {
        Self { error }
    }
}

impl Composite for Close {
    const NAME: &'static str = "amqp:close:list";
    const CODE: u64 = 0x0000_0000_0000_0018;
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

composite_serde!(Close);
