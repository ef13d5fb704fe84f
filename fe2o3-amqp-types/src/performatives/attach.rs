use fe2o3_amqp_codec::{
    composite::{omit_default, optional, Composite, Field, FieldReader, FieldType},
    composite_serde,
    primitives::{Array, OrderedMap, Symbol},
    Error, Value,
};

use crate::{
    definitions::{
        DeliveryTag, Fields, Handle, ReceiverSettleMode, Role, SenderSettleMode, SequenceNo,
    },
    messaging::{DeliveryState, Source, TargetArchetype},
};

/// 2.7.3 Attach
/// Attach a link to a session.
/// <type name="attach" class="composite" source="list" provides="frame">
///     <descriptor name="amqp:attach:list" code="0x00000000:0x00000012"/>
///     <field name="name" type="string" mandatory="true"/>
///     <field name="handle" type="handle" mandatory="true"/>
///     <field name="role" type="role" mandatory="true"/>
///     <field name="snd-settle-mode" type="sender-settle-mode" default="mixed"/>
///     <field name="rcv-settle-mode" type="receiver-settle-mode" default="first"/>
///     <field name="source" type="*" requires="source"/>
///     <field name="target" type="*" requires="target"/>
///     <field name="unsettled" type="map"/>
///     <field name="incomplete-unsettled" type="boolean" default="false"/>
///     <field name="initial-delivery-count" type="sequence-no"/>
///     <field name="max-message-size" type="ulong"/>
///     <field name="offered-capabilities" type="symbol" multiple="true"/>
///     <field name="desired-capabilities" type="symbol" multiple="true"/>
///     <field name="properties" type="fields"/>
/// </type>
#[derive(Debug, Clone, PartialEq)]
pub struct Attach {
    /// <field name="name" type="string" mandatory="true"/>
    pub name: String,

    /// <field name="handle" type="handle" mandatory="true"/>
    pub handle: Handle,

    /// <field name="role" type="role" mandatory="true"/>
    pub role: Role,

    /// <field name="snd-settle-mode" type="sender-settle-mode" default="mixed"/>
    ///
    /// When set at the sender this indicates the actual settlement mode in use.
    pub snd_settle_mode: SenderSettleMode,

    /// <field name="rcv-settle-mode" type="receiver-settle-mode" default="first"/>
    ///
    /// When set at the receiver this indicates the actual settlement mode in use.
    pub rcv_settle_mode: ReceiverSettleMode,

    /// <field name="source" type="*" requires="source"/>
    ///
    /// A link with no source will never produce outgoing messages
    pub source: Option<Source>,

    /// <field name="target" type="*" requires="target"/>
    ///
    /// A link with no target will never permit incoming messages.
    pub target: Option<TargetArchetype>,

    /// <field name="unsettled" type="map"/>
    pub unsettled: Option<OrderedMap<DeliveryTag, Value>>,

    /// <field name="incomplete-unsettled" type="boolean" default="false"/>
    pub incomplete_unsettled: bool,

    /// <field name="initial-delivery-count" type="sequence-no"/>
    ///
    /// This MUST NOT be null if role is sender, and it is ignored if the role is receiver.
    pub initial_delivery_count: Option<SequenceNo>,

    /// <field name="max-message-size" type="ulong"/>
    pub max_message_size: Option<u64>,

    /// <field name="offered-capabilities" type="symbol" multiple="true"/>
    pub offered_capabilities: Option<Array<Symbol>>,

    /// <field name="desired-capabilities" type="symbol" multiple="true"/>
    pub desired_capabilities: Option<Array<Symbol>>,

    /// <field name="properties" type="fields"/>
    pub properties: Option<Fields>,
}

impl Attach {
    /// Target address if the target is a plain [`crate::messaging::Target`]
    pub fn target_address(&self) -> Option<&str> {
        match &self.target {
            Some(TargetArchetype::Target(target)) => target.address.as_deref(),
            _ => None,
        }
    }

    /// Delivery state recorded for a tag in the unsettled map, if any
    pub fn unsettled_state(&self, tag: &DeliveryTag) -> Option<Result<DeliveryState, Error>> {
        self.unsettled
            .as_ref()
            .and_then(|map| map.get(tag))
            .map(|value| DeliveryState::try_from(value.clone()))
    }
}

impl Composite for Attach {
    const NAME: &'static str = "amqp:attach:list";
    const CODE: u64 = 0x0000_0000_0000_0012;
    const FIELDS: &'static [Field] = &[
        Field::mandatory("name", FieldType::String),
        Field::mandatory("handle", FieldType::UInt),
        Field::mandatory("role", FieldType::Boolean),
        Field::optional("snd-settle-mode", FieldType::UByte),
        Field::optional("rcv-settle-mode", FieldType::UByte),
        Field::optional("source", FieldType::Described),
        Field::optional("target", FieldType::Described),
        Field::optional("unsettled", FieldType::Map),
        Field::optional("incomplete-unsettled", FieldType::Boolean),
        Field::optional("initial-delivery-count", FieldType::UInt),
        Field::optional("max-message-size", FieldType::ULong),
        Field::optional("offered-capabilities", FieldType::Symbols),
        Field::optional("desired-capabilities", FieldType::Symbols),
        Field::optional("properties", FieldType::Map),
    ];

    fn to_fields(&self) -> Vec<Value> {
        vec![
            self.name.clone().into(),
            self.handle.into(),
            self.role.into(),
            omit_default(&self.snd_settle_mode, &SenderSettleMode::default()),
            omit_default(&self.rcv_settle_mode, &ReceiverSettleMode::default()),
            optional(&self.source),
            optional(&self.target),
            optional(&self.unsettled),
            omit_default(&self.incomplete_unsettled, &false),
            optional(&self.initial_delivery_count),
            optional(&self.max_message_size),
            optional(&self.offered_capabilities),
            optional(&self.desired_capabilities),
            optional(&self.properties),
        ]
    }

    fn from_fields(reader: &mut FieldReader) -> Result<Self, Error> {
        Ok(Self {
            name: reader.next()?,
            handle: reader.next()?,
            role: reader.next()?,
            snd_settle_mode: reader.next_or_default()?,
            rcv_settle_mode: reader.next_or_default()?,
            source: reader.next_optional_from()?,
            target: reader.next_optional_from()?,
            unsettled: reader.next_map()?,
            incomplete_unsettled: reader.next_or(false)?,
            initial_delivery_count: reader.next_optional()?,
            max_message_size: reader.next_optional()?,
            offered_capabilities: reader.next_multiple()?,
            desired_capabilities: reader.next_multiple()?,
            properties: reader.next_map()?,
        })
    }
}

composite_serde!(Attach);
