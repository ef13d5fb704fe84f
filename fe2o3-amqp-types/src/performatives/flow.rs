use fe2o3_amqp_codec::{
    composite::{omit_default, optional, Composite, Field, FieldReader, FieldType},
    composite_serde,
    Error, Value,
};

use crate::definitions::{Fields, Handle, SequenceNo, TransferNumber};

/// 2.7.4 Flow
/// Update link state.
/// <type name="flow" class="composite" source="list" provides="frame">
///     <descriptor name="amqp:flow:list" code="0x00000000:0x00000013"/>
///     <field name="next-incoming-id" type="transfer-number"/>
///     <field name="incoming-window" type="uint" mandatory="true"/>
///     <field name="next-outgoing-id" type="transfer-number" mandatory="true"/>
///     <field name="outgoing-window" type="uint" mandatory="true"/>
///     <field name="handle" type="handle"/>
///     <field name="delivery-count" type="sequence-no"/>
///     <field name="link-credit" type="uint"/>
///     <field name="available" type="uint"/>
///     <field name="drain" type="boolean" default="false"/>
///     <field name="echo" type="boolean" default="false"/>
///     <field name="properties" type="fields"/>
/// </type>
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Flow {
    /// <field name="next-incoming-id" type="transfer-number"/>
    pub next_incoming_id: Option<TransferNumber>,

    /// <field name="incoming-window" type="uint" mandatory="true"/>
    pub incoming_window: u32,

    /// <field name="next-outgoing-id" type="transfer-number" mandatory="true"/>
    pub next_outgoing_id: TransferNumber,

    /// <field name="outgoing-window" type="uint" mandatory="true"/>
    pub outgoing_window: u32,

    /// If set, indicates that the flow frame carries flow state information for the local
    /// link endpoint associated with the given handle
    pub handle: Option<Handle>,

    /// <field name="delivery-count" type="sequence-no"/>
    pub delivery_count: Option<SequenceNo>,

    /// <field name="link-credit" type="uint"/>
    pub link_credit: Option<u32>,

    /// <field name="available" type="uint"/>
    pub available: Option<u32>,

    /// <field name="drain" type="boolean" default="false"/>
    pub drain: bool,

    /// <field name="echo" type="boolean" default="false"/>
    pub echo: bool,

    /// <field name="properties" type="fields"/>
    pub properties: Option<Fields>,
}

impl Composite for Flow {
    const NAME: &'static str = "amqp:flow:list";
    const CODE: u64 = 0x0000_0000_0000_0013;
    const FIELDS: &'static [Field] = &[
        Field::optional("next-incoming-id", FieldType::UInt),
        Field::mandatory("incoming-window", FieldType::UInt),
        Field::mandatory("next-outgoing-id", FieldType::UInt),
        Field::mandatory("outgoing-window", FieldType::UInt),
        Field::optional("handle", FieldType::UInt),
        Field::optional("delivery-count", FieldType::UInt),
        Field::optional("link-credit", FieldType::UInt),
        Field::optional("available", FieldType::UInt),
        Field::optional("drain", FieldType::Boolean),
        Field::optional("echo", FieldType::Boolean),
        Field::optional("properties", FieldType::Map),
    ];

    fn to_fields(&self) -> Vec<Value> {
        vec![
            optional(&self.next_incoming_id),
            self.incoming_window.into(),
            self.next_outgoing_id.into(),
            self.outgoing_window.into(),
            optional(&self.handle),
            optional(&self.delivery_count),
            optional(&self.link_credit),
            optional(&self.available),
            omit_default(&self.drain, &false),
            omit_default(&self.echo, &false),
            optional(&self.properties),
        ]
    }

    fn from_fields(reader: &mut FieldReader) -> Result<Self, Error> {
        Ok(Self {
            next_incoming_id: reader.next_optional()?,
            incoming_window: reader.next()?,
            next_outgoing_id: reader.next()?,
            outgoing_window: reader.next()?,
            handle: reader.next_optional()?,
            delivery_count: reader.next_optional()?,
            link_credit: reader.next_optional()?,
            available: reader.next_optional()?,
            drain: reader.next_or(false)?,
            echo: reader.next_or(false)?,
            properties: reader.next_map()?,
        })
    }
}

composite_serde!(Flow);
