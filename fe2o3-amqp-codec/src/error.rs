//! Custom error

use serde_amqp::descriptor::Descriptor;

/// Encoding and decoding errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Error raised by the primitive encoding layer
    #[error(transparent)]
    Amqp(#[from] serde_amqp::Error),

    /// A value of a different type is found
    #[error("Expecting {expected}, found {found}")]
    InvalidType {
        /// Name of the expected type
        expected: &'static str,
        /// Name of the type found
        found: &'static str,
    },

    /// A value of the right type holds something out of range
    #[error("Invalid value for {0}")]
    InvalidValue(&'static str),

    /// The descriptor of a described value doesn't match the expected composite type
    #[error("Expecting descriptor of {expected}, found {found:?}")]
    UnexpectedDescriptor {
        /// Symbolic name of the expected composite type
        expected: &'static str,
        /// Descriptor found
        found: Descriptor,
    },

    /// The descriptor is not known at a position that requires a specific set of types
    #[error("Unknown descriptor {0:?}")]
    UnknownDescriptor(Descriptor),

    /// A mandatory field of a composite type is absent or null
    #[error("Mandatory field {field} of {composite} is missing")]
    MissingMandatoryField {
        /// Composite type name
        composite: &'static str,
        /// Field name
        field: &'static str,
    },

    /// A field holds a value of the wrong type
    #[error("Field {field} of {composite} has invalid type {found}")]
    InvalidFieldType {
        /// Composite type name
        composite: &'static str,
        /// Field name
        field: &'static str,
        /// Name of the type found
        found: &'static str,
    },

    /// A composite list carries more fields than the type defines
    #[error("{composite} defines {max} fields, found {found}")]
    TooManyFields {
        /// Composite type name
        composite: &'static str,
        /// Number of fields defined
        max: usize,
        /// Number of fields found
        found: usize,
    },
}

impl Error {
    /// Shorthand for [`Error::InvalidType`]
    pub fn invalid_type(expected: &'static str, found: &'static str) -> Self {
        Self::InvalidType { expected, found }
    }
}
