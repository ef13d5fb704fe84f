//! Frame layout and the codec between frames and length delimited byte chunks

pub mod amqp;
mod error;

pub use error::Error;

/// Frame type of AMQP frames
pub const FRAME_TYPE_AMQP: u8 = 0x00;

/// Frame type of SASL frames, which this engine does not negotiate
pub const FRAME_TYPE_SASL: u8 = 0x01;

/// Size of the fixed frame header including the 4 byte size field
pub const FRAME_HEADER_SIZE: usize = 8;
