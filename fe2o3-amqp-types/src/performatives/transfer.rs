use fe2o3_amqp_codec::{
    composite::{omit_default, optional, Composite, Field, FieldReader, FieldType},
    composite_serde,
    Error, Value,
};

use crate::{
    definitions::{DeliveryNumber, DeliveryTag, Handle, MessageFormat, ReceiverSettleMode},
    messaging::DeliveryState,
};

/// 2.7.5 Transfer
/// Transfer a message.
/// <type name="transfer" class="composite" source="list" provides="frame">
///     <descriptor name="amqp:transfer:list" code="0x00000000:0x00000014"/>
///     <field name="handle" type="handle" mandatory="true"/>
///     <field name="delivery-id" type="delivery-number"/>
///     <field name="delivery-tag" type="delivery-tag"/>
///     <field name="message-format" type="message-format"/>
///     <field name="settled" type="boolean"/>
///     <field name="more" type="boolean" default="false"/>
///     <field name="rcv-settle-mode" type="receiver-settle-mode"/>
///     <field name="state" type="*" requires="delivery-state"/>
///     <field name="resume" type="boolean" default="false"/>
///     <field name="aborted" type="boolean" default="false"/>
///     <field name="batchable" type="boolean" default="false"/>
/// </type>
///
/// The message payload follows the performative in the same frame and is carried separately.
#[derive(Debug, Clone, PartialEq)]
pub struct Transfer {
    /// <field name="handle" type="handle" mandatory="true"/>
    pub handle: Handle,

    /// The delivery-id MUST be supplied on the first transfer of a multi-transfer delivery.
    pub delivery_id: Option<DeliveryNumber>,

    /// The delivery-tag MUST be specified for the first transfer of a multi-transfer message
    pub delivery_tag: Option<DeliveryTag>,

    /// This field MUST be specified for the first transfer of a multi-transfer message
    pub message_format: Option<MessageFormat>,

    /// If not set on the first (or only) transfer for a (multi-transfer) delivery, then the
    /// settled flag MUST be interpreted as being false.
    pub settled: Option<bool>,

    /// Indicates that the message has more content
    pub more: bool,

    /// <field name="rcv-settle-mode" type="receiver-settle-mode"/>
    pub rcv_settle_mode: Option<ReceiverSettleMode>,

    /// The state of the delivery at the sender
    pub state: Option<DeliveryState>,

    /// <field name="resume" type="boolean" default="false"/>
    pub resume: bool,

    /// Aborted messages SHOULD be discarded by the recipient
    pub aborted: bool,

    /// <field name="batchable" type="boolean" default="false"/>
    pub batchable: bool,
}

impl Transfer {
    /// A transfer on the given handle with every optional field unset
    pub fn new(handle: Handle) -> Self {
        Self {
            handle,
            delivery_id: None,
            delivery_tag: None,
            message_format: None,
            settled: None,
            more: false,
            rcv_settle_mode: None,
            state: None,
            resume: false,
            aborted: false,
            batchable: false,
        }
    }
}

impl Composite for Transfer {
    const NAME: &'static str = "amqp:transfer:list";
    const CODE: u64 = 0x0000_0000_0000_0014;
    const FIELDS: &'static [Field] = &[
        Field::mandatory("handle", FieldType::UInt),
        Field::optional("delivery-id", FieldType::UInt),
        Field::optional("delivery-tag", FieldType::Binary),
        Field::optional("message-format", FieldType::UInt),
        Field::optional("settled", FieldType::Boolean),
        Field::optional("more", FieldType::Boolean),
        Field::optional("rcv-settle-mode", FieldType::UByte),
        Field::optional("state", FieldType::Described),
        Field::optional("resume", FieldType::Boolean),
        Field::optional("aborted", FieldType::Boolean),
        Field::optional("batchable", FieldType::Boolean),
    ];

    fn to_fields(&self) -> Vec<Value> {
        vec![
            self.handle.into(),
            optional(&self.delivery_id),
            optional(&self.delivery_tag),
            optional(&self.message_format),
            optional(&self.settled),
            omit_default(&self.more, &false),
            optional(&self.rcv_settle_mode),
            optional(&self.state),
            omit_default(&self.resume, &false),
            omit_default(&self.aborted, &false),
            omit_default(&self.batchable, &false),
        ]
    }

    fn from_fields(reader: &mut FieldReader) -> Result<Self, Error> {
        Ok(Self {
            handle: reader.next()?,
            delivery_id: reader.next_optional()?,
            delivery_tag: reader.next_optional()?,
            message_format: reader.next_optional()?,
            settled: reader.next_optional()?,
            more: reader.next_or(false)?,
            rcv_settle_mode: reader.next_optional()?,
            state: reader.next_optional_from()?,
            resume: reader.next_or(false)?,
            aborted: reader.next_or(false)?,
            batchable: reader.next_or(false)?,
        })
    }
}

composite_serde!(Transfer);
