use fe2o3_amqp_codec::Value;
use serde::{de, ser, Deserialize, Serialize};

/// 2.8.1 Role
/// Link endpoint role.
/// <type name="role" class="restricted" source="boolean">
///     <choice name="sender" value="false"/>
///     <choice name="receiver" value="true"/>
/// </type>
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// <choice name="sender" value="false"/>
    Sender,

    /// <choice name="receiver" value="true"/>
    Receiver,
}

impl Role {
    /// The role of the peer endpoint of the same link
    pub fn opposite(&self) -> Self {
        match self {
            Role::Sender => Role::Receiver,
            Role::Receiver => Role::Sender,
        }
    }
}

impl From<Role> for bool {
    fn from(role: Role) -> Self {
        matches!(role, Role::Receiver)
    }
}

impl From<bool> for Role {
    fn from(val: bool) -> Self {
        match val {
            false => Role::Sender,
            true => Role::Receiver,
        }
    }
}

impl From<Role> for Value {
    fn from(role: Role) -> Self {
        Value::Bool(role.into())
    }
}

impl ser::Serialize for Role {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        bool::from(*self).serialize(serializer)
    }
}

impl<'de> de::Deserialize<'de> for Role {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        bool::deserialize(deserializer).map(Role::from)
    }
}
