use fe2o3_amqp_codec::{
    composite::{
        descriptor_of, from_described, is, omit_default, optional, to_described, type_name,
        Composite, Field, FieldReader, FieldType,
    },
    composite_serde,
    primitives::{Array, Symbol},
    Error, Value,
};

use crate::{definitions::Seconds, transaction::Coordinator};

use super::{Address, NodeProperties, TerminusDurability, TerminusExpiryPolicy};

/// 3.5.4 Target
///
/// <type name="target" class="composite" source="list" provides="target">
///     <descriptor name="amqp:target:list" code="0x00000000:0x00000029"/>
///     <field name="address" type="*" requires="address"/>
///     <field name="durable" type="terminus-durability" default="none"/>
///     <field name="expiry-policy" type="terminus-expiry-policy" default="session-end"/>
///     <field name="timeout" type="seconds" default="0"/>
///     <field name="dynamic" type="boolean" default="false"/>
///     <field name="dynamic-node-properties" type="node-properties"/>
///     <field name="capabilities" type="symbol" multiple="true"/>
/// </type>
///
/// A target without an address on a link attached by a sender is an anonymous relay target.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Target {
    /// <field name="address" type="*" requires="address"/>
    pub address: Option<Address>,

    /// <field name="durable" type="terminus-durability" default="none"/>
    pub durable: TerminusDurability,

    /// <field name="expiry-policy" type="terminus-expiry-policy" default="session-end"/>
    pub expiry_policy: TerminusExpiryPolicy,

    /// <field name="timeout" type="seconds" default="0"/>
    pub timeout: Seconds,

    /// <field name="dynamic" type="boolean" default="false"/>
    pub dynamic: bool,

    /// <field name="dynamic-node-properties" type="node-properties"/>
    pub dynamic_node_properties: Option<NodeProperties>,

    /// <field name="capabilities" type="symbol" multiple="true"/>
    pub capabilities: Option<Array<Symbol>>,
}

impl Target {
    /// A target at the given address
    pub fn with_address(address: impl Into<Address>) -> Self {
        Self {
            address: Some(address.into()),
            ..Default::default()
        }
    }
}

impl Composite for Target {
    const NAME: &'static str = "amqp:target:list";
    const CODE: u64 = 0x0000_0000_0000_0029;
    const FIELDS: &'static [Field] = &[
        Field::optional("address", FieldType::Any),
        Field::optional("durable", FieldType::UInt),
        Field::optional("expiry-policy", FieldType::Symbol),
        Field::optional("timeout", FieldType::UInt),
        Field::optional("dynamic", FieldType::Boolean),
        Field::optional("dynamic-node-properties", FieldType::Map),
        Field::optional("capabilities", FieldType::Symbols),
    ];

    fn to_fields(&self) -> Vec<Value> {
        vec![
            optional(&self.address),
            omit_default(&self.durable, &TerminusDurability::None),
            omit_default(&self.expiry_policy, &TerminusExpiryPolicy::SessionEnd),
            omit_default(&self.timeout, &0),
            omit_default(&self.dynamic, &false),
            optional(&self.dynamic_node_properties),
            optional(&self.capabilities),
        ]
    }

    fn from_fields(reader: &mut FieldReader) -> Result<Self, Error> {
        Ok(Self {
            address: reader.next_optional()?,
            durable: reader.next_or_default()?,
            expiry_policy: reader.next_or_default()?,
            timeout: reader.next_or(0)?,
            dynamic: reader.next_or(false)?,
            dynamic_node_properties: reader.next_map()?,
            capabilities: reader.next_multiple()?,
        })
    }
}

composite_serde!(Target);

/// The target field of an attach, which is either a regular target or a transaction
/// coordinator
#[derive(Debug, Clone, PartialEq)]
pub enum TargetArchetype {
    /// 3.5.4 Target
    Target(Target),

    /// 4.5.1 Coordinator
    Coordinator(Coordinator),
}

impl From<Target> for TargetArchetype {
    fn from(target: Target) -> Self {
        Self::Target(target)
    }
}

impl From<Coordinator> for TargetArchetype {
    fn from(coordinator: Coordinator) -> Self {
        Self::Coordinator(coordinator)
    }
}

impl From<&TargetArchetype> for Value {
    fn from(target: &TargetArchetype) -> Self {
        match target {
            TargetArchetype::Target(target) => to_described(target),
            TargetArchetype::Coordinator(coordinator) => to_described(coordinator),
        }
    }
}

impl TryFrom<Value> for TargetArchetype {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let descriptor = match descriptor_of(&value) {
            Some(descriptor) => descriptor.clone(),
            None => return Err(Error::invalid_type("target", type_name(&value))),
        };
        if is::<Target>(&descriptor) {
            from_described(value).map(TargetArchetype::Target)
        } else if is::<Coordinator>(&descriptor) {
            from_described(value).map(TargetArchetype::Coordinator)
        } else {
            Err(Error::UnknownDescriptor(descriptor))
        }
    }
}

described_enum_serde!(TargetArchetype);
