//! Types defined in AMQP 1.0 specification Part 3: Messaging

/* -------------------------- 3.2 Messaging Format -------------------------- */
pub mod message;
pub use message::{
    Annotations, ApplicationProperties, Body, Header, Message, MessageId, Properties,
};

/* --------------------------- 3.4 Delivery State --------------------------- */
mod delivery_state;
pub use delivery_state::*;

/* -------------------------- 3.5 Source and Target ------------------------- */
mod source;
pub use source::Source;

mod target;
pub use target::{Target, TargetArchetype};

mod terminus;
pub use terminus::{TerminusDurability, TerminusExpiryPolicy};

/// 3.5.1 Address
/// Address of a node.
/// <type name="address-string" class="restricted" source="string" provides="address"/>
pub type Address = String;

/// 3.5.8 Filter Set
/// <type name="filter-set" class="restricted" source="map"/>
pub type FilterSet =
    fe2o3_amqp_codec::primitives::OrderedMap<fe2o3_amqp_codec::primitives::Symbol, fe2o3_amqp_codec::Value>;

/// 3.5.9 Node Properties
/// <type name="node-properties" class="restricted" source="fields"/>
pub type NodeProperties = crate::definitions::Fields;
