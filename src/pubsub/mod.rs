//! Message bus collaborator
//!
//! The binding publishes descriptions, sensor events and property batches,
//! and receives action requests. Action delivery is fire-and-forget: handlers
//! return nothing and may run concurrently with each other.

pub mod local;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

pub use local::{BusMessage, LocalBus};

use crate::Result;

/// Request to write a value to a thing attribute
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionRequest {
    /// Sender of the request
    #[serde(default)]
    pub publisher_id: String,

    /// Target thing (node) ID
    pub thing_id: String,

    /// Attribute name
    pub name: String,

    /// Value to write, string-encoded
    pub value: String,
}

impl ActionRequest {
    #[must_use]
    pub fn new(thing_id: &str, name: &str, value: &str) -> Self {
        Self {
            publisher_id: String::new(),
            thing_id: thing_id.to_string(),
            name: name.to_string(),
            value: value.to_string(),
        }
    }
}

/// Callback invoked for each delivered action
pub type ActionHandler = Arc<dyn Fn(ActionRequest) -> BoxFuture<'static, ()> + Send + Sync>;

/// Property values of one thing, by attribute name
pub type PropertyMap = BTreeMap<String, Vec<u8>>;

/// Publish/subscribe port of the message bus
#[async_trait]
pub trait PubSubPort: Send + Sync {
    /// Publish a thing description document
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Publish`] if the bus rejects the message
    async fn publish_description(&self, thing_id: &str, device_type: &str, doc: Vec<u8>)
    -> Result<()>;

    /// Publish a single event value
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Publish`] if the bus rejects the message
    async fn publish_event(&self, thing_id: &str, name: &str, payload: Vec<u8>) -> Result<()>;

    /// Publish a batch of property values
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Publish`] if the bus rejects the message
    async fn publish_properties(&self, thing_id: &str, props: PropertyMap) -> Result<()>;

    /// Subscribe to action requests; an empty filter matches everything
    ///
    /// # Errors
    ///
    /// Returns error if the subscription cannot be established
    async fn subscribe_actions(
        &self,
        thing_filter: &str,
        name_filter: &str,
        handler: ActionHandler,
    ) -> Result<()>;

    /// Drop all subscriptions held by this port
    async fn release(&self);
}
