use fe2o3_amqp_codec::{
    composite::{omit_default, optional, Composite, Field, FieldReader, FieldType},
    composite_serde,
    Error, Value,
};

use crate::definitions::{self, Handle};

/// 2.7.7 Detach
/// Detach the link endpoint from the session.
/// <type name="detach" class="composite" source="list" provides="frame">
///     <descriptor name="amqp:detach:list" code="0x00000000:0x00000016"/>
///     <field name="handle" type="handle" mandatory="true"/>
///     <field name="closed" type="boolean" default="false"/>
///     <field name="error" type="error"/>
/// </type>
#[derive(Debug, Clone, PartialEq)]
pub struct Detach {
    /// The local handle of the link to be detached
    pub handle: Handle,

    /// If true then the sender has closed the link
    pub closed: bool,

    /// If set, this field indicates that the link is being detached due to an error condition
    pub error: Option<definitions::Error>,
}

impl Composite for Detach {
    const NAME: &'static str = "amqp:detach:list";
    const CODE: u64 = 0x0000_0000_0000_0016;
    const FIELDS: &'static [Field] = &[
        Field::mandatory("handle", FieldType::UInt),
        Field::optional("closed", FieldType::Boolean),
        Field::optional("error", FieldType::Described),
    ];

    fn to_fields(&self) -> Vec<Value> {
        vec![
            self.handle.into(),
            omit_default(&self.closed, &false),
            optional(&self.error),
        ]
    }

    fn from_fields(reader: &mut FieldReader) -> Result<Self, Error> {
        Ok(Self {
            handle: reader.next()?,
            closed: reader.next_or(false)?,
            error: reader.next_optional_from()?,
        })
    }
}

composite_serde!(Detach);
