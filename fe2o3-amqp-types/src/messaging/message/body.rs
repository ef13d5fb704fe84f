use fe2o3_amqp_codec::{primitives::Binary, Value};

/// The body of a message, made of one or more body sections of a single kind
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Body {
    /// 3.2.6 Data, one or more binary sections
    Data(Vec<Binary>),

    /// 3.2.7 AMQP Sequence, one or more list sections
    Sequence(Vec<Vec<Value>>),

    /// 3.2.8 AMQP Value, a single section of any type
    Value(Value),

    /// No body section present
    #[default]
    Empty,
}

impl Body {
    /// Whether no body section is present
    pub fn is_empty(&self) -> bool {
        matches!(self, Body::Empty)
    }

    /// The single amqp-value section, if that is how the body is carried
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Body::Value(value) => Some(value),
            _ => None,
        }
    }
}

impl From<Value> for Body {
    fn from(value: Value) -> Self {
        Body::Value(value)
    }
}

impl From<Binary> for Body {
    fn from(data: Binary) -> Self {
        Body::Data(vec![data])
    }
}

impl From<&str> for Body {
    fn from(value: &str) -> Self {
        Body::Value(Value::from(value))
    }
}
