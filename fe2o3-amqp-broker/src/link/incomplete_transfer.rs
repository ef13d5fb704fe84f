use bytes::{BufMut, BytesMut};
use fe2o3_amqp_types::performatives::Transfer;

use crate::Payload;

use super::Error;

macro_rules! or_assign {
    ($self:ident, $other:ident, $field:ident) => {
        match &$self.performative.$field {
            Some(value) => {
                if let Some(other_value) = $other.$field {
                    if *value != other_value {
                        return Err(Error::InconsistentFieldInMultiFrameDelivery);
                    }
                }
            }
            None => {
                $self.performative.$field = $other.$field;
            }
        }
    };

    ($self:ident, $other:ident, $($field:ident), *) => {
        $(or_assign!($self, $other, $field);)*
    }
}

/// A delivery whose last frame has not arrived
#[derive(Debug)]
pub(crate) struct IncompleteTransfer {
    pub performative: Transfer,
    pub buffer: BytesMut,
}

impl IncompleteTransfer {
    pub fn new(transfer: Transfer, partial_payload: Payload) -> Self {
        let mut buffer = BytesMut::with_capacity(partial_payload.len());
        buffer.put(partial_payload);
        Self {
            performative: transfer,
            buffer,
        }
    }

    /// Like `|=` operator but works on the field level
    pub fn or_assign(&mut self, other: Transfer) -> Result<(), Error> {
        or_assign! {
            self, other,
            delivery_id,
            delivery_tag,
            message_format
        };

        // An unset settled flag on a continuation is true only if an earlier frame was settled
        match &self.performative.settled {
            Some(value) => {
                if let Some(other_value) = other.settled {
                    if !value {
                        self.performative.settled = Some(other_value);
                    }
                }
            }
            None => self.performative.settled = other.settled,
        }

        if let Some(other_state) = other.state {
            match &self.performative.state {
                // a terminal state is never altered
                Some(state) if state.is_terminal() => {}
                _ => self.performative.state = Some(other_state),
            }
        }

        self.performative.more = other.more;
        self.performative.aborted = other.aborted;
        Ok(())
    }

    /// Append to the buffered payload
    pub fn append(&mut self, other: Payload) {
        self.buffer.put(other);
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn into_parts(self) -> (Transfer, Payload) {
        (self.performative, self.buffer.freeze())
    }
}
