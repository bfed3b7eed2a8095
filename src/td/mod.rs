//! Thing description documents
//!
//! A description lists a node's affordances: readable properties, events a
//! sensor emits and actions an actuator accepts. Documents are keyed by the
//! node ID and serialize to JSON for the bus.

pub mod classify;
pub mod synth;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub use classify::{Affordance, classify};
pub use synth::{binding_description, synthesize};

use crate::Result;

/// Device type of the binding's own description
pub const DEVICE_TYPE_SERVICE: &str = "service";

/// Schema of a value carried by an affordance
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSchema {
    /// Data type of the value
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub data_type: String,

    /// Unit of the value
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub unit: String,

    /// Value at the time the description was created, unit appended
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_value: Option<String>,

    /// Whether the value can only be read
    #[serde(default)]
    pub read_only: bool,
}

/// A readable (and possibly writable) property
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyAffordance {
    pub title: String,

    /// Vocabulary tag
    #[serde(rename = "@type", default, skip_serializing_if = "String::is_empty")]
    pub vocab_type: String,

    #[serde(flatten)]
    pub schema: DataSchema,
}

/// An event emitted by a sensor
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventAffordance {
    pub title: String,

    #[serde(rename = "@type", default, skip_serializing_if = "String::is_empty")]
    pub vocab_type: String,

    /// Event payload schema, absent when the event carries no value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<DataSchema>,
}

/// An action accepted by an actuator
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionAffordance {
    pub title: String,

    #[serde(rename = "@type", default, skip_serializing_if = "String::is_empty")]
    pub vocab_type: String,

    /// Input schema, absent when the action takes no parameter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<DataSchema>,
}

/// Description document of a single thing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThingDescription {
    pub id: String,

    /// Device type tag
    #[serde(rename = "@type", default)]
    pub device_type: String,

    pub title: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    /// ID of the binding that publishes this thing
    #[serde(rename = "publisherID", default)]
    pub publisher_id: String,

    /// Creation time, RFC 3339
    pub created: String,

    /// Last modification time, RFC 3339
    pub modified: String,

    #[serde(default)]
    pub properties: BTreeMap<String, PropertyAffordance>,

    #[serde(default)]
    pub events: BTreeMap<String, EventAffordance>,

    #[serde(default)]
    pub actions: BTreeMap<String, ActionAffordance>,
}

impl ThingDescription {
    /// Create an empty description
    #[must_use]
    pub fn new(id: &str, device_type: &str, title: &str) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id: id.to_string(),
            device_type: device_type.to_string(),
            title: title.to_string(),
            description: String::new(),
            publisher_id: String::new(),
            created: now.clone(),
            modified: now,
            properties: BTreeMap::new(),
            events: BTreeMap::new(),
            actions: BTreeMap::new(),
        }
    }

    /// Return this description with the given publisher
    #[must_use]
    pub fn with_publisher(mut self, publisher_id: &str) -> Self {
        self.publisher_id = publisher_id.to_string();
        self
    }

    /// Total number of properties, events and actions
    #[must_use]
    pub fn affordance_count(&self) -> usize {
        self.properties.len() + self.events.len() + self.actions.len()
    }

    /// Serialize to the JSON document published on the bus
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails
    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}
