use fe2o3_amqp_codec::Value;
use serde::{de, ser, Deserialize, Serialize};

/// 3.5.5 Terminus Durability
/// Durability policy for a terminus.
/// <type name="terminus-durability" class="restricted" source="uint">
///     <choice name="none" value="0"/>
///     <choice name="configuration" value="1"/>
///     <choice name="unsettled-state" value="2"/>
/// </type>
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TerminusDurability {
    /// <choice name="none" value="0"/>
    #[default]
    None = 0,

    /// <choice name="configuration" value="1"/>
    Configuration = 1,

    /// <choice name="unsettled-state" value="2"/>
    UnsettledState = 2,
}

impl From<TerminusDurability> for Value {
    fn from(durability: TerminusDurability) -> Self {
        Value::Uint(durability as u32)
    }
}

impl ser::Serialize for TerminusDurability {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        (*self as u32).serialize(serializer)
    }
}

impl<'de> de::Deserialize<'de> for TerminusDurability {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        match u32::deserialize(deserializer)? {
            0 => Ok(TerminusDurability::None),
            1 => Ok(TerminusDurability::Configuration),
            2 => Ok(TerminusDurability::UnsettledState),
            _ => Err(de::Error::custom("Invalid value for TerminusDurability")),
        }
    }
}

symbol_enum! {
    /// 3.5.6 Terminus Expiry Policy
    /// Expiry policy for a terminus.
    /// <type name="terminus-expiry-policy" class="restricted" source="symbol">
    pub enum TerminusExpiryPolicy {
        /// <choice name="link-detach" value="link-detach"/>
        LinkDetach => "link-detach",
        /// <choice name="session-end" value="session-end"/>
        SessionEnd => "session-end",
        /// <choice name="connection-close" value="connection-close"/>
        ConnectionClose => "connection-close",
        /// <choice name="never" value="never"/>
        Never => "never",
    }
}

impl Default for TerminusExpiryPolicy {
    fn default() -> Self {
        TerminusExpiryPolicy::SessionEnd
    }
}
