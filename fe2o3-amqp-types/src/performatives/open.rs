use fe2o3_amqp_codec::{
    composite::{omit_default, optional, Composite, Field, FieldReader, FieldType},
    composite_serde,
    primitives::{Array, Symbol},
    Error, Value,
};

use crate::definitions::{Fields, Milliseconds};

/// 2.7.1 Open
/// Negotiate connection parameters.
/// <type name="open" class="composite" source="list" provides="frame">
///     <descriptor name="amqp:open:list" code="0x00000000:0x00000010"/>
///     <field name="container-id" type="string" mandatory="true"/>
///     <field name="hostname" type="string"/>
///     <field name="max-frame-size" type="uint" default="4294967295"/>
///     <field name="channel-max" type="ushort" default="65535"/>
///     <field name="idle-time-out" type="milliseconds"/>
///     <field name="outgoing-locales" type="ietf-language-tag" multiple="true"/>
///     <field name="incoming-locales" type="ietf-language-tag" multiple="true"/>
///     <field name="offered-capabilities" type="symbol" multiple="true"/>
///     <field name="desired-capabilities" type="symbol" multiple="true"/>
///     <field name="properties" type="fields"/>
/// </type>
#[derive(Debug, Clone, PartialEq)]
pub struct Open {
    /// <field name="container-id" type="string" mandatory="true"/>
    pub container_id: String,

    /// <field name="hostname" type="string"/>
    pub hostname: Option<String>,

    /// <field name="max-frame-size" type="uint" default="4294967295"/>
    pub max_frame_size: u32,

    /// <field name="channel-max" type="ushort" default="65535"/>
    pub channel_max: u16,

    /// <field name="idle-time-out" type="milliseconds"/>
    pub idle_time_out: Option<Milliseconds>,

    /// <field name="outgoing-locales" type="ietf-language-tag" multiple="true"/>
    pub outgoing_locales: Option<Array<Symbol>>,

    /// <field name="incoming-locales" type="ietf-language-tag" multiple="true"/>
    pub incoming_locales: Option<Array<Symbol>>,

    /// <field name="offered-capabilities" type="symbol" multiple="true"/>
    pub offered_capabilities: Option<Array<Symbol>>,

    /// <field name="desired-capabilities" type="symbol" multiple="true"/>
    pub desired_capabilities: Option<Array<Symbol>>,

    /// <field name="properties" type="fields"/>
    pub properties: Option<Fields>,
}

impl Open {
    /// An open frame with every optional field left at its default
    pub fn new(container_id: impl Into<String>) -> Self {
        Self {
            container_id: container_id.into(),
            hostname: None,
            max_frame_size: u32::MAX,
            channel_max: u16::MAX,
            idle_time_out: None,
            outgoing_locales: None,
            incoming_locales: None,
            offered_capabilities: None,
            desired_capabilities: None,
            properties: None,
        }
    }

    /// Whether the peer offers the capability
    pub fn offers(&self, capability: &str) -> bool {
        self.offered_capabilities
            .as_ref()
            .map(|caps| caps.iter().any(|cap| cap.as_str() == capability))
            .unwrap_or(false)
    }
}

impl Composite for Open {
    const NAME: &'static str = "amqp:open:list";
    const CODE: u64 = 0x0000_0000_0000_0010;
    const FIELDS: &'static [Field] = &[
        Field::mandatory("container-id", FieldType::String),
        Field::optional("hostname", FieldType::String),
        Field::optional("max-frame-size", FieldType::UInt),
        Field::optional("channel-max", FieldType::UShort),
        Field::optional("idle-time-out", FieldType::UInt),
        Field::optional("outgoing-locales", FieldType::Symbols),
        Field::optional("incoming-locales", FieldType::Symbols),
        Field::optional("offered-capabilities", FieldType::Symbols),
        Field::optional("desired-capabilities", FieldType::Symbols),
        Field::optional("properties", FieldType::Map),
    ];

    fn to_fields(&self) -> Vec<Value> {
        vec![
            self.container_id.clone().into(),
            optional(&self.hostname),
            omit_default(&self.max_frame_size, &u32::MAX),
            omit_default(&self.channel_max, &u16::MAX),
            optional(&self.idle_time_out),
            optional(&self.outgoing_locales),
            optional(&self.incoming_locales),
            optional(&self.offered_capabilities),
            optional(&self.desired_capabilities),
            optional(&self.properties),
        ]
    }

    fn from_fields(reader: &mut FieldReader) -> Result<Self, Error> {
        Ok(Self {
            container_id: reader.next()?,
            hostname: reader.next_optional()?,
            max_frame_size: reader.next_or(u32::MAX)?,
            channel_max: reader.next_or(u16::MAX)?,
            idle_time_out: reader.next_optional()?,
            outgoing_locales: reader.next_multiple()?,
            incoming_locales: reader.next_multiple()?,
            offered_capabilities: reader.next_multiple()?,
            desired_capabilities: reader.next_multiple()?,
            properties: reader.next_map()?,
        })
    }
}

composite_serde!(Open);

#[cfg(test)]
mod tests {
    use fe2o3_amqp_codec::{
        composite::{decode_composite, encode_composite},
        primitives::{Array, Symbol},
    };

    use super::Open;

    #[test]
    fn minimal_open_encoding() {
        let open = Open::new("1234");
        let mut buf = bytes::BytesMut::new();
        encode_composite(&open, &mut buf).unwrap();
        assert_eq!(
            &buf[..],
            &[0x00, 0x53, 0x10, 0xc0, 0x07, 0x01, 0xa1, 0x04, b'1', b'2', b'3', b'4']
        );
    }

    #[test]
    fn open_with_capabilities_round_trips() {
        let mut open = Open::new("broker");
        open.max_frame_size = 65536;
        open.channel_max = 255;
        open.offered_capabilities = Some(Array(vec![Symbol::from("ANONYMOUS-RELAY")]));
        let mut buf = bytes::BytesMut::new();
        encode_composite(&open, &mut buf).unwrap();
        let (decoded, _) = decode_composite::<Open>(&buf).unwrap();
        assert_eq!(decoded, open);
        assert!(decoded.offers("ANONYMOUS-RELAY"));
    }
}
