use fe2o3_amqp_codec::Value;
use serde::{de, ser, Deserialize, Serialize};

/// 2.8.2 Sender Settle Mode
/// Settlement policy for a sender.
/// <type name="sender-settle-mode" class="restricted" source="ubyte">
///     <choice name="unsettled" value="0"/>
///     <choice name="settled" value="1"/>
///     <choice name="mixed" value="2"/>
/// </type>
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SenderSettleMode {
    /// The sender will send all deliveries initially unsettled to the receiver.
    Unsettled = 0,

    /// The sender will send all deliveries settled to the receiver.
    Settled = 1,

    /// The sender MAY send a mixture of settled and unsettled deliveries to the receiver.
    #[default]
    Mixed = 2,
}

impl From<SenderSettleMode> for Value {
    fn from(mode: SenderSettleMode) -> Self {
        Value::Ubyte(mode as u8)
    }
}

impl ser::Serialize for SenderSettleMode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        (*self as u8).serialize(serializer)
    }
}

impl<'de> de::Deserialize<'de> for SenderSettleMode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        match u8::deserialize(deserializer)? {
            0 => Ok(SenderSettleMode::Unsettled),
            1 => Ok(SenderSettleMode::Settled),
            2 => Ok(SenderSettleMode::Mixed),
            _ => Err(de::Error::custom("Invalid value for SenderSettleMode")),
        }
    }
}

/// 2.8.3 Receiver Settle Mode
/// Settlement policy for a receiver.
/// <type name="receiver-settle-mode" class="restricted" source="ubyte">
///     <choice name="first" value="0"/>
///     <choice name="second" value="1"/>
/// </type>
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ReceiverSettleMode {
    /// The receiver will spontaneously settle all incoming transfers.
    #[default]
    First = 0,

    /// The receiver will only settle after sending the disposition to the sender and
    /// receiving a disposition indicating settlement of the delivery from the sender.
    Second = 1,
}

impl From<ReceiverSettleMode> for Value {
    fn from(mode: ReceiverSettleMode) -> Self {
        Value::Ubyte(mode as u8)
    }
}

impl ser::Serialize for ReceiverSettleMode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        (*self as u8).serialize(serializer)
    }
}

impl<'de> de::Deserialize<'de> for ReceiverSettleMode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        match u8::deserialize(deserializer)? {
            0 => Ok(ReceiverSettleMode::First),
            1 => Ok(ReceiverSettleMode::Second),
            _ => Err(de::Error::custom("Invalid value for ReceiverSettleMode")),
        }
    }
}
