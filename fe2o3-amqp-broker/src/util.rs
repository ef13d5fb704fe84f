//! Common utilities

use fe2o3_amqp_types::definitions::SequenceNo;

/// Type state marker of a builder whose mandatory fields are set
#[derive(Debug)]
pub struct Initialized {}

/// Type state marker of a builder whose mandatory fields are not all set
#[derive(Debug)]
pub struct Uninitialized {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Running {
    Continue,
    Stop,
}

/// RFC-1982 serial number comparison over 32 bit sequence numbers
///
/// Returns `true` if `a` precedes `b`. The result is unspecified when the two values are
/// exactly 2^31 apart.
pub fn serial_lt(a: SequenceNo, b: SequenceNo) -> bool {
    a != b && b.wrapping_sub(a) < (1 << 31)
}

/// Whether `id` lies in the inclusive serial range `first..=last`
pub fn serial_in_range(id: SequenceNo, first: SequenceNo, last: SequenceNo) -> bool {
    id.wrapping_sub(first) <= last.wrapping_sub(first)
}
