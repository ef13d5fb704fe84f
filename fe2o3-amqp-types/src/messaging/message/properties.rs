use fe2o3_amqp_codec::{
    composite::{optional, type_name, Composite, Field, FieldReader, FieldType},
    composite_serde,
    primitives::{Binary, Symbol, Timestamp, Uuid},
    Error, Value,
};
use serde::{de, ser, Deserialize, Serialize};

use crate::messaging::Address;

/// 3.2.11 Message ID ULong, 3.2.12 Message ID UUID, 3.2.13 Message ID Binary and
/// 3.2.14 Message ID String
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MessageId {
    /// <type name="message-id-ulong" class="restricted" source="ulong" provides="message-id"/>
    ULong(u64),

    /// <type name="message-id-uuid" class="restricted" source="uuid" provides="message-id"/>
    Uuid(Uuid),

    /// <type name="message-id-binary" class="restricted" source="binary" provides="message-id"/>
    Binary(Binary),

    /// <type name="message-id-string" class="restricted" source="string" provides="message-id"/>
    String(String),
}

impl ser::Serialize for MessageId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            MessageId::ULong(val) => val.serialize(serializer),
            MessageId::Uuid(val) => val.serialize(serializer),
            MessageId::Binary(val) => val.serialize(serializer),
            MessageId::String(val) => val.serialize(serializer),
        }
    }
}

impl From<MessageId> for Value {
    fn from(id: MessageId) -> Self {
        match id {
            MessageId::ULong(val) => Value::Ulong(val),
            MessageId::Uuid(val) => Value::Uuid(val),
            MessageId::Binary(val) => Value::Binary(val),
            MessageId::String(val) => Value::String(val),
        }
    }
}

impl TryFrom<Value> for MessageId {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Ulong(val) => Ok(MessageId::ULong(val)),
            Value::Uuid(val) => Ok(MessageId::Uuid(val)),
            Value::Binary(val) => Ok(MessageId::Binary(val)),
            Value::String(val) => Ok(MessageId::String(val)),
            other => Err(Error::invalid_type("message-id", type_name(&other))),
        }
    }
}

impl<'de> de::Deserialize<'de> for MessageId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        MessageId::try_from(value).map_err(de::Error::custom)
    }
}

impl From<String> for MessageId {
    fn from(val: String) -> Self {
        MessageId::String(val)
    }
}

impl From<u64> for MessageId {
    fn from(val: u64) -> Self {
        MessageId::ULong(val)
    }
}

/// 3.2.4 Properties
/// Immutable properties of the message.
/// <type name="properties" class="composite" source="list" provides="section">
///     <descriptor name="amqp:properties:list" code="0x00000000:0x00000073"/>
///     <field name="message-id" type="*" requires="message-id"/>
///     <field name="user-id" type="binary"/>
///     <field name="to" type="*" requires="address"/>
///     <field name="subject" type="string"/>
///     <field name="reply-to" type="*" requires="address"/>
///     <field name="correlation-id" type="*" requires="message-id"/>
///     <field name="content-type" type="symbol"/>
///     <field name="content-encoding" type="symbol"/>
///     <field name="absolute-expiry-time" type="timestamp"/>
///     <field name="creation-time" type="timestamp"/>
///     <field name="group-id" type="string"/>
///     <field name="group-sequence" type="sequence-no"/>
///     <field name="reply-to-group-id" type="string"/>
/// </type>
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Properties {
    /// Application message identifier
    pub message_id: Option<MessageId>,

    /// Creating user id
    pub user_id: Option<Binary>,

    /// The address of the node the message is destined for
    pub to: Option<Address>,

    /// The subject of the message
    pub subject: Option<String>,

    /// The node to send replies to
    pub reply_to: Option<Address>,

    /// Application correlation identifier
    pub correlation_id: Option<MessageId>,

    /// MIME content type
    pub content_type: Option<Symbol>,

    /// MIME content type
    pub content_encoding: Option<Symbol>,

    /// The time when this message is considered expired
    pub absolute_expiry_time: Option<Timestamp>,

    /// The time when this message was created
    pub creation_time: Option<Timestamp>,

    /// The group this message belongs to
    pub group_id: Option<String>,

    /// The relative position of this message within its group
    pub group_sequence: Option<u32>,

    /// The group the reply message belongs to
    pub reply_to_group_id: Option<String>,
}

impl Composite for Properties {
    const NAME: &'static str = "amqp:properties:list";
    const CODE: u64 = 0x0000_0000_0000_0073;
    const FIELDS: &'static [Field] = &[
        Field::optional("message-id", FieldType::Any),
        Field::optional("user-id", FieldType::Binary),
        Field::optional("to", FieldType::Any),
        Field::optional("subject", FieldType::String),
        Field::optional("reply-to", FieldType::Any),
        Field::optional("correlation-id", FieldType::Any),
        Field::optional("content-type", FieldType::Symbol),
        Field::optional("content-encoding", FieldType::Symbol),
        Field::optional("absolute-expiry-time", FieldType::Timestamp),
        Field::optional("creation-time", FieldType::Timestamp),
        Field::optional("group-id", FieldType::String),
        Field::optional("group-sequence", FieldType::UInt),
        Field::optional("reply-to-group-id", FieldType::String),
    ];

    fn to_fields(&self) -> Vec<Value> {
        vec![
            optional(&self.message_id),
            optional(&self.user_id),
            optional(&self.to),
            optional(&self.subject),
            optional(&self.reply_to),
            optional(&self.correlation_id),
            optional(&self.content_type),
            optional(&self.content_encoding),
            optional(&self.absolute_expiry_time),
            optional(&self.creation_time),
            optional(&self.group_id),
            optional(&self.group_sequence),
            optional(&self.reply_to_group_id),
        ]
    }

    fn from_fields(reader: &mut FieldReader) -> Result<Self, Error> {
        Ok(Self {
            message_id: reader.next_optional_from()?,
            user_id: reader.next_optional()?,
            to: reader.next_optional()?,
            subject: reader.next_optional()?,
            reply_to: reader.next_optional()?,
            correlation_id: reader.next_optional_from()?,
            content_type: reader.next_optional()?,
            content_encoding: reader.next_optional()?,
            absolute_expiry_time: reader.next_optional()?,
            creation_time: reader.next_optional()?,
            group_id: reader.next_optional()?,
            group_sequence: reader.next_optional()?,
            reply_to_group_id: reader.next_optional()?,
        })
    }
}

composite_serde!(Properties);
