use fe2o3_amqp_codec::{
    composite::{optional, Composite, Field, FieldReader, FieldType},
    composite_serde, Value,
};

use crate::transaction::TransactionError;

use super::{AmqpError, ConnectionError, ErrorCondition, Fields, LinkError, SessionError};

/// 2.8.14 Error
/// Details of an error.
/// <type name="error" class="composite" source="list">
///     <descriptor name="amqp:error:list" code="0x00000000:0x0000001d"/>
///     <field name="condition" type="symbol" requires="error-condition" mandatory="true"/>
///     <field name="description" type="string"/>
///     <field name="info" type="fields"/>
/// </type>
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    /// A symbolic value indicating the error condition.
    pub condition: ErrorCondition,

    /// This text supplies any supplementary details not indicated by the condition field.
    /// This text can be logged as an aid to resolving issues.
    pub description: Option<String>,

    /// Map carrying information about the error condition
    pub info: Option<Fields>,
}

impl Error {
    /// Creates a new error
    pub fn new(
        condition: impl Into<ErrorCondition>,
        description: Option<String>,
        info: Option<Fields>,
    ) -> Self {
        Self {
            condition: condition.into(),
            description,
            info,
        }
    }

    /// An error with only a condition
    pub fn with_condition(condition: impl Into<ErrorCondition>) -> Self {
        Self::new(condition, None, None)
    }
}

macro_rules! impl_from_condition {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Error {
                fn from(condition: $ty) -> Self {
                    Self::with_condition(condition)
                }
            }
        )*
    };
}

impl_from_condition!(
    ErrorCondition,
    AmqpError,
    ConnectionError,
    SessionError,
    LinkError,
    TransactionError
);

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.description {
            Some(description) => write!(f, "{}: {}", self.condition, description),
            None => write!(f, "{}", self.condition),
        }
    }
}

impl std::error::Error for Error {}

impl Composite for Error {
    const NAME: &'static str = "amqp:error:list";
    const CODE: u64 = 0x0000_0000_0000_001d;
    const FIELDS: &'static [Field] = &[
        Field::mandatory("condition", FieldType::Symbol),
        Field::optional("description", FieldType::String),
        Field::optional("info", FieldType::Map),
    ];

    fn to_fields(&self) -> Vec<Value> {
        vec![
            self.condition.clone().into(),
            optional(&self.description),
            optional(&self.info),
        ]
    }

    fn from_fields(reader: &mut FieldReader) -> Result<Self, fe2o3_amqp_codec::Error> {
        Ok(Self {
            condition: reader.next()?,
            description: reader.next_optional()?,
            info: reader.next_map()?,
        })
    }
}

composite_serde!(Error);
