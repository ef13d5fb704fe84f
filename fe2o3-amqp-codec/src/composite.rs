//! Table driven mapping of described list types
//!
//! Every composite type lists its fields in a static [`Field`] table. Encoding drops trailing
//! null fields and decoding validates presence and type of every field against the table
//! before the typed value is built from a [`FieldReader`].

use std::hash::Hash;

use bytes::BytesMut;
use serde::de::DeserializeOwned;
use serde_amqp::{
    described::Described,
    descriptor::Descriptor,
    from_value,
    primitives::{Array, OrderedMap},
    Value,
};

use crate::error::Error;

/// Wire type accepted by a composite field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// boolean
    Boolean,
    /// ubyte
    UByte,
    /// ushort
    UShort,
    /// uint
    UInt,
    /// ulong
    ULong,
    /// timestamp
    Timestamp,
    /// binary
    Binary,
    /// string
    String,
    /// symbol
    Symbol,
    /// symbol with `multiple="true"`, either a single symbol or an array of symbols
    Symbols,
    /// map
    Map,
    /// list
    List,
    /// any described type
    Described,
    /// `*` typed fields
    Any,
}

impl FieldType {
    /// Whether a non-null value may be held by a field of this type
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (FieldType::Any, _) => true,
            (FieldType::Boolean, Value::Bool(_))
            | (FieldType::UByte, Value::Ubyte(_))
            | (FieldType::UShort, Value::Ushort(_))
            | (FieldType::UInt, Value::Uint(_))
            | (FieldType::ULong, Value::Ulong(_))
            | (FieldType::Timestamp, Value::Timestamp(_))
            | (FieldType::Binary, Value::Binary(_))
            | (FieldType::String, Value::String(_))
            | (FieldType::Symbol, Value::Symbol(_))
            | (FieldType::Symbols, Value::Symbol(_))
            | (FieldType::Map, Value::Map(_))
            | (FieldType::List, Value::List(_))
            | (FieldType::Described, Value::Described(_)) => true,
            (FieldType::Symbols, Value::Array(array)) => {
                array.iter().all(|v| matches!(v, Value::Symbol(_)))
            }
            _ => false,
        }
    }
}

/// One entry in the field table of a composite type
#[derive(Debug, Clone, Copy)]
pub struct Field {
    /// Field name as it appears in the type definition
    pub name: &'static str,
    /// Whether the field must be present and non-null
    pub mandatory: bool,
    /// Accepted wire type
    pub ty: FieldType,
}

impl Field {
    /// A field that must be present
    pub const fn mandatory(name: &'static str, ty: FieldType) -> Self {
        Self {
            name,
            mandatory: true,
            ty,
        }
    }

    /// A field that may be null or omitted
    pub const fn optional(name: &'static str, ty: FieldType) -> Self {
        Self {
            name,
            mandatory: false,
            ty,
        }
    }
}

/// A described list type with a fixed field table
pub trait Composite: Sized {
    /// Symbolic descriptor, ie. `amqp:open:list`
    const NAME: &'static str;

    /// Numeric descriptor
    const CODE: u64;

    /// Field table in wire order
    const FIELDS: &'static [Field];

    /// Field values in wire order. Fields equal to their default should be [`Value::Null`].
    fn to_fields(&self) -> Vec<Value>;

    /// Builds the value from fields already validated against [`Composite::FIELDS`]
    fn from_fields(reader: &mut FieldReader) -> Result<Self, Error>;

    /// Numeric descriptor of the type
    fn descriptor() -> Descriptor {
        Descriptor::Code(Self::CODE)
    }
}

/// Name of the AMQP type held by the value
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Described(_) => "described",
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Ubyte(_) => "ubyte",
        Value::Ushort(_) => "ushort",
        Value::Uint(_) => "uint",
        Value::Ulong(_) => "ulong",
        Value::Byte(_) => "byte",
        Value::Short(_) => "short",
        Value::Int(_) => "int",
        Value::Long(_) => "long",
        Value::Float(_) => "float",
        Value::Double(_) => "double",
        Value::Decimal32(_) => "decimal32",
        Value::Decimal64(_) => "decimal64",
        Value::Decimal128(_) => "decimal128",
        Value::Char(_) => "char",
        Value::Timestamp(_) => "timestamp",
        Value::Uuid(_) => "uuid",
        Value::Binary(_) => "binary",
        Value::String(_) => "string",
        Value::Symbol(_) => "symbol",
        Value::List(_) => "list",
        Value::Map(_) => "map",
        Value::Array(_) => "array",
    }
}

/// Wraps `value` into a described value
pub fn described(descriptor: Descriptor, value: Value) -> Value {
    Value::Described(Box::new(Described {
        descriptor,
        value,
    }))
}

/// Descriptor of a described value
pub fn descriptor_of(value: &Value) -> Option<&Descriptor> {
    match value {
        Value::Described(described) => Some(&described.descriptor),
        _ => None,
    }
}

/// Whether the descriptor names the composite `T`, either symbolically or by code
pub fn is<T: Composite>(descriptor: &Descriptor) -> bool {
    match descriptor {
        Descriptor::Name(name) => name.as_str() == T::NAME,
        Descriptor::Code(code) => *code == T::CODE,
    }
}

/// Converts a composite into a described list, omitting trailing null fields
pub fn to_described<T: Composite>(composite: &T) -> Value {
    let mut fields = composite.to_fields();
    while matches!(fields.last(), Some(Value::Null)) {
        fields.pop();
    }
    described(T::descriptor(), Value::List(fields))
}

/// Converts a described list into a composite
pub fn from_described<T: Composite>(value: Value) -> Result<T, Error> {
    let described = match value {
        Value::Described(described) => *described,
        other => return Err(Error::invalid_type("described", type_name(&other))),
    };
    if !is::<T>(&described.descriptor) {
        return Err(Error::UnexpectedDescriptor {
            expected: T::NAME,
            found: described.descriptor,
        });
    }
    let fields = match described.value {
        Value::List(fields) => fields,
        other => return Err(Error::invalid_type("list", type_name(&other))),
    };
    validate::<T>(&fields)?;

    let mut reader = FieldReader::new(T::NAME, T::FIELDS, fields);
    T::from_fields(&mut reader)
}

fn validate<T: Composite>(fields: &[Value]) -> Result<(), Error> {
    if fields.len() > T::FIELDS.len() {
        return Err(Error::TooManyFields {
            composite: T::NAME,
            max: T::FIELDS.len(),
            found: fields.len(),
        });
    }

    for (index, field) in T::FIELDS.iter().enumerate() {
        match fields.get(index) {
            None | Some(Value::Null) if field.mandatory => {
                return Err(Error::MissingMandatoryField {
                    composite: T::NAME,
                    field: field.name,
                })
            }
            None | Some(Value::Null) => {}
            Some(value) if !field.ty.accepts(value) => {
                return Err(Error::InvalidFieldType {
                    composite: T::NAME,
                    field: field.name,
                    found: type_name(value),
                })
            }
            Some(_) => {}
        }
    }
    Ok(())
}

/// Appends the encoded composite to the buffer
pub fn encode_composite<T: Composite>(composite: &T, buf: &mut BytesMut) -> Result<(), Error> {
    crate::encode(&to_described(composite), buf)
}

/// Decodes a composite from the beginning of `bytes`, returning the number of bytes consumed
pub fn decode_composite<T: Composite>(bytes: &[u8]) -> Result<(T, usize), Error> {
    let (value, consumed) = crate::decode::<Value>(bytes)?;
    Ok((from_described(value)?, consumed))
}

/// Converts an optional field, mapping `None` to [`Value::Null`]
pub fn optional<T>(value: &Option<T>) -> Value
where
    T: Clone + Into<Value>,
{
    value.clone().map(Into::into).unwrap_or(Value::Null)
}

/// Returns [`Value::Null`] if the value equals the default of the field, which lets the
/// trailing field omission drop it
pub fn omit_default<T>(value: &T, default: &T) -> Value
where
    T: PartialEq + Clone + Into<Value>,
{
    match value == default {
        true => Value::Null,
        false => value.clone().into(),
    }
}

/// Sequential access to the fields of a composite in wire order
///
/// Primitive fields are converted with serde. Fields holding described values go through
/// `TryFrom<Value>` and maps keep their values untyped.
#[derive(Debug)]
pub struct FieldReader {
    composite: &'static str,
    fields: &'static [Field],
    values: std::vec::IntoIter<Value>,
    index: usize,
}

impl FieldReader {
    fn new(composite: &'static str, fields: &'static [Field], values: Vec<Value>) -> Self {
        Self {
            composite,
            fields,
            values: values.into_iter(),
            index: 0,
        }
    }

    fn take(&mut self) -> (&'static str, Value) {
        let name = self
            .fields
            .get(self.index)
            .map(|field| field.name)
            .unwrap_or("<unknown>");
        self.index += 1;
        (name, self.values.next().unwrap_or(Value::Null))
    }

    fn take_optional(&mut self) -> (&'static str, Option<Value>) {
        match self.take() {
            (field, Value::Null) => (field, None),
            (field, value) => (field, Some(value)),
        }
    }

    fn invalid(&self, field: &'static str, found: &'static str) -> Error {
        Error::InvalidFieldType {
            composite: self.composite,
            field,
            found,
        }
    }

    fn convert<T: DeserializeOwned>(&self, field: &'static str, value: Value) -> Result<T, Error> {
        let found = type_name(&value);
        from_value(value).map_err(|_| self.invalid(field, found))
    }

    /// Reads a mandatory field
    pub fn next<T: DeserializeOwned>(&mut self) -> Result<T, Error> {
        match self.take_optional() {
            (field, None) => Err(Error::MissingMandatoryField {
                composite: self.composite,
                field,
            }),
            (field, Some(value)) => self.convert(field, value),
        }
    }

    /// Reads an optional field
    pub fn next_optional<T: DeserializeOwned>(&mut self) -> Result<Option<T>, Error> {
        match self.take_optional() {
            (_, None) => Ok(None),
            (field, Some(value)) => self.convert(field, value).map(Some),
        }
    }

    /// Reads an optional field, substituting `default` when it is null or absent
    pub fn next_or<T: DeserializeOwned>(&mut self, default: T) -> Result<T, Error> {
        Ok(self.next_optional()?.unwrap_or(default))
    }

    /// Reads an optional field, substituting [`Default::default`] when it is null or absent
    pub fn next_or_default<T: DeserializeOwned + Default>(&mut self) -> Result<T, Error> {
        Ok(self.next_optional()?.unwrap_or_default())
    }

    /// Reads a mandatory field holding a described value
    pub fn next_from<T>(&mut self) -> Result<T, Error>
    where
        T: TryFrom<Value, Error = Error>,
    {
        match self.take_optional() {
            (field, None) => Err(Error::MissingMandatoryField {
                composite: self.composite,
                field,
            }),
            (_, Some(value)) => T::try_from(value),
        }
    }

    /// Reads an optional field holding a described value
    pub fn next_optional_from<T>(&mut self) -> Result<Option<T>, Error>
    where
        T: TryFrom<Value, Error = Error>,
    {
        self.take_optional().1.map(T::try_from).transpose()
    }

    /// Reads an optional `*` typed field as is
    pub fn next_value(&mut self) -> Option<Value> {
        self.take_optional().1
    }

    /// Reads an optional map field, converting the keys and keeping the values untyped
    pub fn next_map<K>(&mut self) -> Result<Option<OrderedMap<K, Value>>, Error>
    where
        K: DeserializeOwned + Hash + Eq,
    {
        match self.take_optional() {
            (_, None) => Ok(None),
            (field, Some(Value::Map(map))) => map
                .into_iter()
                .map(|(key, value)| Ok((self.convert(field, key)?, value)))
                .collect::<Result<_, Error>>()
                .map(Some),
            (field, Some(other)) => Err(self.invalid(field, type_name(&other))),
        }
    }

    /// Reads an optional field declared with `multiple="true"`. A single value is accepted in
    /// place of an array holding only that value.
    pub fn next_multiple<T: DeserializeOwned>(&mut self) -> Result<Option<Array<T>>, Error> {
        match self.take_optional() {
            (_, None) => Ok(None),
            (field, Some(value @ Value::Array(_))) => self.convert(field, value).map(Some),
            (field, Some(value)) => {
                let single = self.convert(field, value)?;
                Ok(Some(Array(vec![single])))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_amqp::{
        descriptor::Descriptor,
        primitives::{Array, Symbol},
        to_vec, Value,
    };

    use crate::error::Error;

    use super::{
        decode_composite, described, from_described, omit_default, optional, to_described,
        Composite, Field, FieldReader, FieldType,
    };

    #[derive(Debug, PartialEq)]
    struct Sample {
        name: String,
        count: u32,
        labels: Option<Array<Symbol>>,
    }

    impl Composite for Sample {
        const NAME: &'static str = "test:sample:list";
        const CODE: u64 = 0x0000_beef_0000_0001;
        const FIELDS: &'static [Field] = &[
            Field::mandatory("name", FieldType::String),
            Field::optional("count", FieldType::UInt),
            Field::optional("labels", FieldType::Symbols),
        ];

        fn to_fields(&self) -> Vec<Value> {
            vec![
                Value::from(self.name.clone()),
                omit_default(&self.count, &7),
                optional(&self.labels),
            ]
        }

        fn from_fields(reader: &mut FieldReader) -> Result<Self, Error> {
            Ok(Self {
                name: reader.next()?,
                count: reader.next_or(7)?,
                labels: reader.next_multiple()?,
            })
        }
    }

    fn code() -> Descriptor {
        Descriptor::Code(Sample::CODE)
    }

    #[test]
    fn trailing_nulls_are_omitted() {
        let sample = Sample {
            name: "a".into(),
            count: 7,
            labels: None,
        };
        let buf = to_vec(&to_described(&sample)).unwrap();
        // 0x00 0x80 <8 byte code> list8 size=4 count=1 str8 "a"
        assert_eq!(&buf[10..], &[0xc0, 0x04, 0x01, 0xa1, 0x01, b'a']);

        let (decoded, consumed) = decode_composite::<Sample>(&buf).unwrap();
        assert_eq!(decoded, sample);
        assert_eq!(consumed, buf.len());
    }

    #[test]
    fn symbol_array_is_encoded_as_array() {
        let sample = Sample {
            name: "a".into(),
            count: 1,
            labels: Some(Array(vec![Symbol::from("x"), Symbol::from("y")])),
        };
        let value = to_described(&sample);
        let (decoded, _) = decode_composite::<Sample>(&to_vec(&value).unwrap()).unwrap();
        assert_eq!(decoded, sample);

        let fields = match value {
            Value::Described(described) => described.value,
            other => panic!("{:?}", other),
        };
        assert!(matches!(&fields, Value::List(fields) if matches!(fields[2], Value::Array(_))));
    }

    #[test]
    fn symbolic_descriptor_is_accepted() {
        let value = described(
            Descriptor::Name(Symbol::from("test:sample:list")),
            Value::List(vec![Value::from("b"), Value::Uint(1)]),
        );
        let sample: Sample = from_described(value).unwrap();
        assert_eq!(sample.count, 1);
    }

    #[test]
    fn single_symbol_is_read_as_array() {
        let value = described(
            code(),
            Value::List(vec![
                Value::from("a"),
                Value::Null,
                Value::Symbol(Symbol::from("x")),
            ]),
        );
        let sample: Sample = from_described(value).unwrap();
        assert_eq!(sample.labels.unwrap().0, vec![Symbol::from("x")]);
    }

    #[test]
    fn missing_mandatory_field_is_rejected() {
        let value = described(code(), Value::List(vec![]));
        assert!(matches!(
            from_described::<Sample>(value),
            Err(Error::MissingMandatoryField { field: "name", .. })
        ));
    }

    #[test]
    fn wrong_field_type_is_rejected() {
        let value = described(
            code(),
            Value::List(vec![Value::from("a"), Value::from("seven")]),
        );
        assert!(matches!(
            from_described::<Sample>(value),
            Err(Error::InvalidFieldType { field: "count", .. })
        ));
    }

    #[test]
    fn extra_fields_are_rejected() {
        let value = described(
            code(),
            Value::List(vec![Value::from("a"), Value::Null, Value::Null, Value::Null]),
        );
        assert!(matches!(
            from_described::<Sample>(value),
            Err(Error::TooManyFields { max: 3, found: 4, .. })
        ));
    }

    #[test]
    fn unexpected_descriptor_is_rejected() {
        let value = described(Descriptor::Code(0x10), Value::List(vec![Value::from("a")]));
        assert!(matches!(
            from_described::<Sample>(value),
            Err(Error::UnexpectedDescriptor { .. })
        ));
    }
}
