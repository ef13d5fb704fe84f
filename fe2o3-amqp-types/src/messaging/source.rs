use fe2o3_amqp_codec::{
    composite::{omit_default, optional, Composite, Field, FieldReader, FieldType},
    composite_serde,
    primitives::{Array, Symbol},
    Error, Value,
};

use crate::definitions::Seconds;

use super::{
    Address, FilterSet, NodeProperties, Outcome, TerminusDurability, TerminusExpiryPolicy,
};

/// 3.5.3 Source
///
/// <type name="source" class="composite" source="list" provides="source">
///     <descriptor name="amqp:source:list" code="0x00000000:0x00000028"/>
///     <field name="address" type="*" requires="address"/>
///     <field name="durable" type="terminus-durability" default="none"/>
///     <field name="expiry-policy" type="terminus-expiry-policy" default="session-end"/>
///     <field name="timeout" type="seconds" default="0"/>
///     <field name="dynamic" type="boolean" default="false"/>
///     <field name="dynamic-node-properties" type="node-properties"/>
///     <field name="distribution-mode" type="symbol" requires="distribution-mode"/>
///     <field name="filter" type="filter-set"/>
///     <field name="default-outcome" type="*" requires="outcome"/>
///     <field name="outcomes" type="symbol" multiple="true"/>
///     <field name="capabilities" type="symbol" multiple="true"/>
/// </type>
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Source {
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

    /// Properties of the dynamically created node
    ///
    /// If the dynamic field is not set to true this field MUST be left unset.
    pub dynamic_node_properties: Option<NodeProperties>,

    /// <field name="distribution-mode" type="symbol" requires="distribution-mode"/>
    pub distribution_mode: Option<Symbol>,

    /// <field name="filter" type="filter-set"/>
    pub filter: Option<FilterSet>,

    /// Indicates the outcome to be used for transfers that have not reached a terminal state at
    /// the receiver when the transfer is settled, including when the source is destroyed.
    pub default_outcome: Option<Outcome>,

    /// The values in this field are the symbolic descriptors of the outcomes that can be chosen
    /// on this link.
    pub outcomes: Option<Array<Symbol>>,

    /// <field name="capabilities" type="symbol" multiple="true"/>
    pub capabilities: Option<Array<Symbol>>,
}

impl Source {
    /// A source at the given address
    pub fn with_address(address: impl Into<Address>) -> Self {
        Self {
            address: Some(address.into()),
            ..Default::default()
        }
    }
}

impl Composite for Source {
    const NAME: &'static str = "amqp:source:list";
    const CODE: u64 = 0x0000_0000_0000_0028;
    const FIELDS: &'static [Field] = &[
        Field::optional("address", FieldType::Any),
        Field::optional("durable", FieldType::UInt),
        Field::optional("expiry-policy", FieldType::Symbol),
        Field::optional("timeout", FieldType::UInt),
        Field::optional("dynamic", FieldType::Boolean),
        Field::optional("dynamic-node-properties", FieldType::Map),
        Field::optional("distribution-mode", FieldType::Symbol),
        Field::optional("filter", FieldType::Map),
        Field::optional("default-outcome", FieldType::Described),
        Field::optional("outcomes", FieldType::Symbols),
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
            optional(&self.distribution_mode),
            optional(&self.filter),
            optional(&self.default_outcome),
            optional(&self.outcomes),
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
            distribution_mode: reader.next_optional()?,
            filter: reader.next_map()?,
            default_outcome: reader.next_optional_from()?,
            outcomes: reader.next_multiple()?,
            capabilities: reader.next_multiple()?,
        })
    }
}

composite_serde!(Source);
