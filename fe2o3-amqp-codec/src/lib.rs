#![deny(missing_docs, missing_debug_implementations)]

//! Composite types for the AMQP1.0 type system on top of [`serde_amqp`]
//!
//! Primitive values, their wire encoding and the untyped [`Value`] come from `serde_amqp`.
//! Described composite types (performatives, delivery states, termini, message sections)
//! implement [`composite::Composite`], which carries an explicit field table consumed by one
//! generic routine that maps a described list [`Value`] to the typed value and back.
//!
//! ```rust
//! use fe2o3_amqp_codec::{from_slice, to_vec, Value};
//!
//! let value = Value::from("hello");
//! let buf = to_vec(&value).unwrap();
//! assert_eq!(buf, [0xa1, 5, b'h', b'e', b'l', b'l', b'o']);
//! assert_eq!(from_slice::<Value>(&buf).unwrap(), value);
//! ```

use bytes::{BufMut, BytesMut};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_amqp::{de::Deserializer, read::IoReader, ser::Serializer};

pub mod composite;
pub mod error;

pub use serde;
pub use serde_amqp::{
    described, descriptor, from_slice, from_value, primitives, to_vec, Value,
};

pub use error::Error;

/// Appends the encoding of `value` to the buffer
pub fn encode<T: Serialize + ?Sized>(value: &T, buf: &mut BytesMut) -> Result<(), Error> {
    let mut serializer = Serializer::from(buf.writer());
    value.serialize(&mut serializer)?;
    Ok(())
}

/// Decodes one value from the beginning of `bytes`, returning it with the number of bytes
/// consumed
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<(T, usize), Error> {
    let mut remaining = bytes;
    let value = {
        let mut deserializer = Deserializer::new(IoReader::new(&mut remaining));
        T::deserialize(&mut deserializer)?
    };
    Ok((value, bytes.len() - remaining.len()))
}

/// Implements [`serde::Serialize`], [`serde::Deserialize`], `From<T> for Value` and
/// `TryFrom<Value>` for types that implement [`composite::Composite`]
#[macro_export]
macro_rules! composite_serde {
    ($($ty:ty),* $(,)?) => {
        $(
            impl $crate::serde::Serialize for $ty {
                fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
                where
                    S: $crate::serde::Serializer,
                {
                    let value = $crate::composite::to_described(self);
                    $crate::serde::Serialize::serialize(&value, serializer)
                }
            }

            impl From<&$ty> for $crate::Value {
                fn from(value: &$ty) -> Self {
                    $crate::composite::to_described(value)
                }
            }

            impl From<$ty> for $crate::Value {
                fn from(value: $ty) -> Self {
                    $crate::composite::to_described(&value)
                }
            }

            impl<'de> $crate::serde::Deserialize<'de> for $ty {
                fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
                where
                    D: $crate::serde::Deserializer<'de>,
                {
                    use $crate::serde::de::Error as _;
                    let value = <$crate::Value as $crate::serde::Deserialize>::deserialize(deserializer)?;
                    $crate::composite::from_described(value).map_err(D::Error::custom)
                }
            }

            impl TryFrom<$crate::Value> for $ty {
                type Error = $crate::Error;

                fn try_from(value: $crate::Value) -> Result<Self, Self::Error> {
                    $crate::composite::from_described(value)
                }
            }
        )*
    };
}
