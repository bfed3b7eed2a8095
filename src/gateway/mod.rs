//! Device gateway collaborator
//!
//! The gateway reports a flat set of named attributes per physical node.
//! Each poll returns a complete snapshot; the binding never patches nodes
//! incrementally.

pub mod snapshot;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use snapshot::SnapshotGateway;

use crate::Result;

/// Data type reported for attributes that carry no value
pub const DATA_TYPE_NONE: &str = "none";

/// A single named data point on a node
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attribute {
    /// Attribute name as reported by the gateway
    pub name: String,

    /// Data type (e.g. "number", "boolean", "string")
    #[serde(default)]
    pub data_type: String,

    /// Unit of the value, empty when unitless
    #[serde(default)]
    pub unit: String,

    /// Current value, string-encoded
    #[serde(default)]
    pub value: String,

    /// Gateway accepts writes to this attribute
    #[serde(default)]
    pub writable: bool,

    /// Attribute is a sensor reading
    #[serde(default)]
    pub is_sensor: bool,

    /// Attribute controls an actuator
    #[serde(default)]
    pub is_actuator: bool,

    /// Standardized vocabulary tag, empty when unmapped
    #[serde(default)]
    pub vocab_type: String,
}

impl Attribute {
    /// Create a read-only property attribute
    #[must_use]
    pub fn new(name: &str, data_type: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            data_type: data_type.to_string(),
            value: value.to_string(),
            ..Self::default()
        }
    }

    /// Return this attribute with the given unit
    #[must_use]
    pub fn with_unit(mut self, unit: &str) -> Self {
        self.unit = unit.to_string();
        self
    }

    /// Return this attribute with the given vocabulary tag
    #[must_use]
    pub fn with_vocab(mut self, vocab_type: &str) -> Self {
        self.vocab_type = vocab_type.to_string();
        self
    }

    /// Mark the attribute writable
    #[must_use]
    pub const fn writable(mut self) -> Self {
        self.writable = true;
        self
    }

    /// Mark the attribute as a sensor reading
    #[must_use]
    pub const fn sensor(mut self) -> Self {
        self.is_sensor = true;
        self
    }

    /// Mark the attribute as an actuator control
    #[must_use]
    pub const fn actuator(mut self) -> Self {
        self.is_actuator = true;
        self
    }

    /// Whether the attribute carries a value at all
    #[must_use]
    pub fn has_data(&self) -> bool {
        !self.data_type.is_empty() && self.data_type != DATA_TYPE_NONE
    }

    /// Value with the unit appended, the way it is shown as an initial value
    #[must_use]
    pub fn display_value(&self) -> String {
        if self.unit.is_empty() {
            self.value.clone()
        } else {
            format!("{} {}", self.value, self.unit)
        }
    }
}

/// A physical device exposed by the gateway
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Stable node ID, also used as the thing ID
    pub id: String,

    /// Display name
    #[serde(default)]
    pub name: String,

    /// Longer description
    #[serde(default)]
    pub description: String,

    /// Device type tag
    #[serde(default)]
    pub device_type: String,

    /// Attributes by name
    #[serde(default)]
    pub attrs: BTreeMap<String, Attribute>,
}

impl Node {
    /// Create a node without attributes
    #[must_use]
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            ..Self::default()
        }
    }

    /// Return this node with the given device type
    #[must_use]
    pub fn with_device_type(mut self, device_type: &str) -> Self {
        self.device_type = device_type.to_string();
        self
    }

    /// Return this node with the given description
    #[must_use]
    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    /// Return this node with an added attribute, keyed by its name
    #[must_use]
    pub fn with_attribute(mut self, attr: Attribute) -> Self {
        self.attrs.insert(attr.name.clone(), attr);
        self
    }

    /// Look up an attribute by name
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attrs.get(name)
    }
}

/// Client for the device gateway
///
/// Implementations bound their own I/O with a timeout; the binding never
/// holds a lock across these calls.
#[async_trait]
pub trait GatewayClient: Send + Sync {
    /// Poll all nodes with their current attribute values
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::GatewayUnreachable`] when the gateway cannot be
    /// reached and [`crate::Error::GatewayProtocol`] on a malformed response
    async fn poll_nodes(&self) -> Result<Vec<Node>>;

    /// Write a value to a node attribute
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::GatewayWrite`] if the gateway refuses the write
    async fn write_data(&self, node_id: &str, attr_name: &str, value: &str) -> Result<()>;
}
