#![deny(missing_docs, missing_debug_implementations)]

//! Implements the AMQP1.0 frame bodies, messaging and transaction types on top of the table
//! driven composites in `fe2o3-amqp-codec`. Every type implements [`serde::Serialize`] and
//! [`serde::Deserialize`] and is carried on the wire by `serde_amqp`.

#[macro_use]
mod macros;

pub mod definitions;
pub mod messaging;
pub mod performatives;
pub mod states;
pub mod transaction;

pub use fe2o3_amqp_codec as codec;
