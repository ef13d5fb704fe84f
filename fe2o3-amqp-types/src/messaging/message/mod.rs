//! 3.2 Message Format

use bytes::{Bytes, BytesMut};
use fe2o3_amqp_codec::{
    composite::{described, descriptor_of, from_described, is, type_name},
    decode,
    descriptor::Descriptor,
    encode,
    primitives::OrderedMap,
    Error, Value,
};

mod body;
mod header;
mod properties;

pub use body::Body;
pub use header::Header;
pub use properties::{MessageId, Properties};

/// 3.2.2 Delivery Annotations, 3.2.3 Message Annotations and 3.2.10 Footer
///
/// Keys are symbols or ulongs
pub type Annotations = OrderedMap<Value, Value>;

/// 3.2.5 Application Properties
///
/// Keys are strings and values are restricted to simple types
pub type ApplicationProperties = OrderedMap<String, Value>;

const DELIVERY_ANNOTATIONS: (&str, u64) = ("amqp:delivery-annotations:map", 0x71);
const MESSAGE_ANNOTATIONS: (&str, u64) = ("amqp:message-annotations:map", 0x72);
const APPLICATION_PROPERTIES: (&str, u64) = ("amqp:application-properties:map", 0x74);
const DATA: (&str, u64) = ("amqp:data:binary", 0x75);
const AMQP_SEQUENCE: (&str, u64) = ("amqp:amqp-sequence:list", 0x76);
const AMQP_VALUE: (&str, u64) = ("amqp:amqp-value:*", 0x77);
const FOOTER: (&str, u64) = ("amqp:footer:map", 0x78);

/// A bare message together with its annotations, as carried in the payload of one or more
/// transfers
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Message {
    /// Transport headers
    pub header: Option<Header>,

    /// Delivery annotations
    pub delivery_annotations: Option<Annotations>,

    /// Message annotations
    pub message_annotations: Option<Annotations>,

    /// Immutable properties of the message
    pub properties: Option<Properties>,

    /// Application properties
    pub application_properties: Option<ApplicationProperties>,

    /// Body sections
    pub body: Body,

    /// Footer
    pub footer: Option<Annotations>,
}

impl Message {
    /// A message with only a body
    pub fn new(body: impl Into<Body>) -> Self {
        Self {
            body: body.into(),
            ..Default::default()
        }
    }

    /// Sets `properties.to`
    pub fn with_to(mut self, to: impl Into<String>) -> Self {
        self.properties.get_or_insert_with(Properties::default).to = Some(to.into());
        self
    }

    /// The address the message is destined for
    pub fn to(&self) -> Option<&str> {
        self.properties.as_ref().and_then(|p| p.to.as_deref())
    }

    /// MIME content type
    pub fn content_type(&self) -> Option<&str> {
        self.properties
            .as_ref()
            .and_then(|p| p.content_type.as_ref())
            .map(|s| s.as_str())
    }

    /// Decodes the concatenated payload of a delivery
    pub fn decode(payload: &[u8]) -> Result<Self, Error> {
        let mut remaining = payload;
        let mut message = Message::default();

        while !remaining.is_empty() {
            let (section, consumed) = decode::<Value>(remaining)?;
            remaining = &remaining[consumed..];

            let descriptor = match descriptor_of(&section) {
                Some(descriptor) => descriptor.clone(),
                None => return Err(Error::invalid_type("message section", type_name(&section))),
            };

            if is::<Header>(&descriptor) {
                message.header = Some(from_described(section)?);
            } else if is::<Properties>(&descriptor) {
                message.properties = Some(from_described(section)?);
            } else if is_section(&descriptor, DELIVERY_ANNOTATIONS) {
                message.delivery_annotations = Some(annotations(inner(section))?);
            } else if is_section(&descriptor, MESSAGE_ANNOTATIONS) {
                message.message_annotations = Some(annotations(inner(section))?);
            } else if is_section(&descriptor, APPLICATION_PROPERTIES) {
                message.application_properties = Some(application_properties(inner(section))?);
            } else if is_section(&descriptor, FOOTER) {
                message.footer = Some(annotations(inner(section))?);
            } else if is_section(&descriptor, DATA) {
                let data = match inner(section) {
                    Value::Binary(data) => data,
                    other => return Err(Error::invalid_type("binary", type_name(&other))),
                };
                match &mut message.body {
                    Body::Empty => message.body = Body::Data(vec![data]),
                    Body::Data(sections) => sections.push(data),
                    _ => return Err(Error::InvalidValue("body")),
                }
            } else if is_section(&descriptor, AMQP_SEQUENCE) {
                let list = match inner(section) {
                    Value::List(list) => list,
                    other => return Err(Error::invalid_type("list", type_name(&other))),
                };
                match &mut message.body {
                    Body::Empty => message.body = Body::Sequence(vec![list]),
                    Body::Sequence(sections) => sections.push(list),
                    _ => return Err(Error::InvalidValue("body")),
                }
            } else if is_section(&descriptor, AMQP_VALUE) {
                match message.body {
                    Body::Empty => message.body = Body::Value(inner(section)),
                    _ => return Err(Error::InvalidValue("body")),
                }
            } else {
                return Err(Error::UnknownDescriptor(descriptor));
            }
        }

        Ok(message)
    }

    /// Encodes the message into a transfer payload
    pub fn encode(&self) -> Result<Bytes, Error> {
        let mut buf = BytesMut::new();
        if let Some(header) = &self.header {
            encode(header, &mut buf)?;
        }
        if let Some(annotations) = &self.delivery_annotations {
            let map = Value::Map(annotations.clone());
            encode(&section(DELIVERY_ANNOTATIONS, map), &mut buf)?;
        }
        if let Some(annotations) = &self.message_annotations {
            let map = Value::Map(annotations.clone());
            encode(&section(MESSAGE_ANNOTATIONS, map), &mut buf)?;
        }
        if let Some(properties) = &self.properties {
            encode(properties, &mut buf)?;
        }
        if let Some(application_properties) = &self.application_properties {
            let map = application_properties
                .iter()
                .map(|(key, value)| (Value::String(key.clone()), value.clone()))
                .collect();
            encode(&section(APPLICATION_PROPERTIES, Value::Map(map)), &mut buf)?;
        }
        match &self.body {
            Body::Data(sections) => {
                for data in sections {
                    encode(&section(DATA, Value::Binary(data.clone())), &mut buf)?;
                }
            }
            Body::Sequence(sections) => {
                for list in sections {
                    encode(&section(AMQP_SEQUENCE, Value::List(list.clone())), &mut buf)?;
                }
            }
            Body::Value(value) => encode(&section(AMQP_VALUE, value.clone()), &mut buf)?,
            Body::Empty => {}
        }
        if let Some(footer) = &self.footer {
            encode(&section(FOOTER, Value::Map(footer.clone())), &mut buf)?;
        }
        Ok(buf.freeze())
    }
}

fn is_section(descriptor: &Descriptor, (name, code): (&str, u64)) -> bool {
    match descriptor {
        Descriptor::Name(symbol) => symbol.as_str() == name,
        Descriptor::Code(value) => *value == code,
    }
}

fn section((_, code): (&str, u64), value: Value) -> Value {
    described(Descriptor::Code(code), value)
}

fn inner(section: Value) -> Value {
    match section {
        Value::Described(described) => described.value,
        other => other,
    }
}

fn annotations(value: Value) -> Result<Annotations, Error> {
    match value {
        Value::Map(map) => Ok(map),
        other => Err(Error::invalid_type("map", type_name(&other))),
    }
}

fn application_properties(value: Value) -> Result<ApplicationProperties, Error> {
    annotations(value)?
        .into_iter()
        .map(|(key, value)| match key {
            Value::String(key) => Ok((key, value)),
            other => Err(Error::invalid_type("string", type_name(&other))),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use fe2o3_amqp_codec::{
        primitives::{Binary, OrderedMap, Symbol},
        Value,
    };

    use super::{Body, Header, Message, Properties};

    #[test]
    fn amqp_value_body_encoding() {
        let message = Message::new("hi");
        let buf = message.encode().unwrap();
        assert_eq!(&buf[..], &[0x00, 0x53, 0x77, 0xa1, 0x02, b'h', b'i']);
        assert_eq!(Message::decode(&buf).unwrap(), message);
    }

    #[test]
    fn full_message_round_trips() {
        let mut annotations = OrderedMap::new();
        annotations.insert(Value::Symbol(Symbol::from("x-opt-key")), Value::Int(7));
        let mut application_properties = OrderedMap::new();
        application_properties.insert("k".to_string(), Value::Bool(true));

        let message = Message {
            header: Some(Header {
                durable: true,
                ..Default::default()
            }),
            delivery_annotations: None,
            message_annotations: Some(annotations),
            properties: Some(Properties {
                to: Some("queue".into()),
                content_type: Some(Symbol::from("text/plain")),
                ..Default::default()
            }),
            application_properties: Some(application_properties),
            body: Body::Data(vec![Binary::from(vec![1u8, 2]), Binary::from(vec![3u8])]),
            footer: None,
        };
        let buf = message.encode().unwrap();
        let decoded = Message::decode(&buf).unwrap();
        assert_eq!(decoded, message);
        assert_eq!(decoded.to(), Some("queue"));
        assert_eq!(decoded.content_type(), Some("text/plain"));
    }

    #[test]
    fn mixed_body_sections_are_rejected() {
        let mut buf = Message::new("a").encode().unwrap().to_vec();
        buf.extend_from_slice(&Message::new("b").encode().unwrap());
        assert!(Message::decode(&buf).is_err());
    }

    #[test]
    fn garbage_is_a_decode_error() {
        let err = Message::decode(&[0x00, 0x53]).unwrap_err();
        assert!(matches!(err, fe2o3_amqp_codec::Error::Amqp(_)));
    }

    #[test]
    fn section_without_descriptor_is_rejected() {
        let err = Message::decode(&[0xa1, 0x01, b'x']).unwrap_err();
        assert!(matches!(
            err,
            fe2o3_amqp_codec::Error::InvalidType {
                expected: "message section",
                ..
            }
        ));
    }
}
