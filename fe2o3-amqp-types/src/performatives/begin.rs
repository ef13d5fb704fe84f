use fe2o3_amqp_codec::{
    composite::{omit_default, optional, Composite, Field, FieldReader, FieldType},
    composite_serde,
    primitives::{Array, Symbol},
    Error, Value,
};

use crate::definitions::{Fields, Handle, TransferNumber};

/// 2.7.2 Begin
/// Begin a session on a channel.
/// <type name="begin" class="composite" source="list" provides="frame">
///     <descriptor name="amqp:begin:list" code="0x00000000:0x00000011"/>
///     <field name="remote-channel" type="ushort"/>
///     <field name="next-outgoing-id" type="transfer-number" mandatory="true"/>
///     <field name="incoming-window" type="uint" mandatory="true"/>
///     <field name="outgoing-window" type="uint" mandatory="true"/>
///     <field name="handle-max" type="handle" default="4294967295"/>
///     <field name="offered-capabilities" type="symbol" multiple="true"/>
///     <field name="desired-capabilities" type="symbol" multiple="true"/>
///     <field name="properties" type="fields"/>
/// </type>
#[derive(Debug, Clone, PartialEq)]
pub struct Begin {
    /// If a session is locally initiated, the remote-channel MUST NOT be set. When an endpoint
    /// responds to a remotely initiated session, the remote-channel MUST be set to the channel
    /// on which the remote session sent the begin.
    pub remote_channel: Option<u16>,

    /// <field name="next-outgoing-id" type="transfer-number" mandatory="true"/>
    pub next_outgoing_id: TransferNumber,

    /// <field name="incoming-window" type="uint" mandatory="true"/>
    pub incoming_window: u32,

    /// <field name="outgoing-window" type="uint" mandatory="true"/>
    pub outgoing_window: u32,

    /// <field name="handle-max" type="handle" default="4294967295"/>
    pub handle_max: Handle,

    /// <field name="offered-capabilities" type="symbol" multiple="true"/>
    pub offered_capabilities: Option<Array<Symbol>>,

    /// <field name="desired-capabilities" type="symbol" multiple="true"/>
    pub desired_capabilities: Option<Array<Symbol>>,

    /// <field name="properties" type="fields"/>
    pub properties: Option<Fields>,
}

impl Composite for Begin {
    const NAME: &'static str = "amqp:begin:list";
    const CODE: u64 = 0x0000_0000_0000_0011;
    const FIELDS: &'static [Field] = &[
        Field::optional("remote-channel", FieldType::UShort),
        Field::mandatory("next-outgoing-id", FieldType::UInt),
        Field::mandatory("incoming-window", FieldType::UInt),
        Field::mandatory("outgoing-window", FieldType::UInt),
        Field::optional("handle-max", FieldType::UInt),
        Field::optional("offered-capabilities", FieldType::Symbols),
        Field::optional("desired-capabilities", FieldType::Symbols),
        Field::optional("properties", FieldType::Map),
    ];

    fn to_fields(&self) -> Vec<Value> {
        vec![
            optional(&self.remote_channel),
            self.next_outgoing_id.into(),
            self.incoming_window.into(),
            self.outgoing_window.into(),
            omit_default(&self.handle_max, &Handle(u32::MAX)),
            optional(&self.offered_capabilities),
            optional(&self.desired_capabilities),
            optional(&self.properties),
        ]
    }

    fn from_fields(reader: &mut FieldReader) -> Result<Self, Error> {
        Ok(Self {
            remote_channel: reader.next_optional()?,
            next_outgoing_id: reader.next()?,
            incoming_window: reader.next()?,
            outgoing_window: reader.next()?,
            handle_max: reader.next_or(Handle(u32::MAX))?,
            offered_capabilities: reader.next_multiple()?,
            desired_capabilities: reader.next_multiple()?,
            properties: reader.next_map()?,
        })
    }
}

composite_serde!(Begin);

#[cfg(test)]
mod tests {
    use fe2o3_amqp_codec::composite::{decode_composite, encode_composite};

    use crate::definitions::Handle;

    use super::Begin;

    #[test]
    fn begin_reply_round_trips() {
        let begin = Begin {
            remote_channel: Some(3),
            next_outgoing_id: 0,
            incoming_window: 2048,
            outgoing_window: 2048,
            handle_max: Handle(1023),
            offered_capabilities: None,
            desired_capabilities: None,
            properties: None,
        };
        let mut buf = bytes::BytesMut::new();
        encode_composite(&begin, &mut buf).unwrap();
        let (decoded, consumed) = decode_composite::<Begin>(&buf).unwrap();
        assert_eq!(decoded, begin);
        assert_eq!(consumed, buf.len());
    }

    #[test]
    fn begin_without_mandatory_window_is_rejected() {
        // remote-channel and next-outgoing-id only
        let buf = [0x00, 0x53, 0x11, 0xc0, 0x03, 0x02, 0x40, 0x43];
        assert!(decode_composite::<Begin>(&buf).is_err());
    }
}
