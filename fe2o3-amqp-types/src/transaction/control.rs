use fe2o3_amqp_codec::{
    composite::{descriptor_of, from_described, is, type_name},
    Error, Value,
};

use crate::messaging::{Body, Message};

use super::{Declare, Discharge};

/// A message sent by a transaction controller to the coordinator
#[derive(Debug, Clone, PartialEq)]
pub enum ControlMessage {
    /// Allocate a new transaction
    Declare(Declare),

    /// Complete a transaction
    Discharge(Discharge),
}

/// Receives decoded control messages
pub trait ControlHandler {
    /// Value produced for every handled control message
    type Output;

    /// Handles a declare
    fn on_declare(&mut self, declare: Declare) -> Self::Output;

    /// Handles a discharge
    fn on_discharge(&mut self, discharge: Discharge) -> Self::Output;
}

impl ControlMessage {
    /// Extracts the control message from the single amqp-value section of a message
    pub fn from_message(message: &Message) -> Result<Self, Error> {
        let value = match &message.body {
            Body::Value(value) => value.clone(),
            _ => return Err(Error::InvalidValue("control message body")),
        };
        let descriptor = descriptor_of(&value)
            .cloned()
            .ok_or_else(|| Error::invalid_type("declare or discharge", type_name(&value)))?;

        if is::<Declare>(&descriptor) {
            from_described(value).map(ControlMessage::Declare)
        } else if is::<Discharge>(&descriptor) {
            from_described(value).map(ControlMessage::Discharge)
        } else {
            Err(Error::UnknownDescriptor(descriptor))
        }
    }

    /// Hands the message to the matching handler method
    pub fn dispatch<H: ControlHandler + ?Sized>(self, handler: &mut H) -> H::Output {
        match self {
            ControlMessage::Declare(declare) => handler.on_declare(declare),
            ControlMessage::Discharge(discharge) => handler.on_discharge(discharge),
        }
    }
}

impl From<Declare> for Message {
    fn from(declare: Declare) -> Self {
        Message::new(Value::from(declare))
    }
}

impl From<Discharge> for Message {
    fn from(discharge: Discharge) -> Self {
        Message::new(Value::from(discharge))
    }
}
