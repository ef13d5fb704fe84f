use fe2o3_amqp_codec::{
    composite::{optional, Composite, Field, FieldReader, FieldType},
    composite_serde,
    Error, Value,
};

use crate::definitions;

/// 2.7.8 End
/// End the session.
/// <type name="end" class="composite" source="list" provides="frame">
///     <descriptor name="amqp:end:list" code="0x00000000:0x00000017"/>
///     <field name="error" type="error"/>
/// </type>
#[derive(Debug, Clone, PartialEq, Default)]
pub struct End {
    /// If set, this field indicates that the session is being ended due to an error condition.
    pub error: Option<definitions::Error>,
}

impl Composite for End {
    const NAME: &'static str = "amqp:end:list";
    const CODE: u64 = 0x0000_0000_0000_0017;
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

composite_serde!(End);
