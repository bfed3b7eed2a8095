//! State shared between the heartbeat and action-triggered refreshes
//!
//! One lock guards both the node cache and the change tracker. Callers hold
//! it per access only, never across gateway or bus I/O.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use crate::gateway::{Attribute, Node};
use crate::tracker::ChangeTracker;

/// Shared handle to the binding state
pub type SharedState = Arc<Mutex<BindingState>>;

/// Node cache and value stamps
#[derive(Debug)]
pub struct BindingState {
    /// Nodes from the most recent successful poll, by ID
    nodes: HashMap<String, Node>,
    pub tracker: ChangeTracker,
}

impl BindingState {
    /// Create an empty state
    #[must_use]
    pub fn new(republish_interval: Duration) -> Self {
        Self {
            nodes: HashMap::new(),
            tracker: ChangeTracker::new(republish_interval),
        }
    }

    /// Create an empty state behind the shared lock
    #[must_use]
    pub fn shared(republish_interval: Duration) -> SharedState {
        Arc::new(Mutex::new(Self::new(republish_interval)))
    }

    /// Replace the node cache with a fresh poll result
    pub fn replace_nodes(&mut self, nodes: &[Node]) {
        self.nodes = nodes.iter().map(|n| (n.id.clone(), n.clone())).collect();
    }

    #[must_use]
    pub fn node(&self, node_id: &str) -> Option<&Node> {
        self.nodes.get(node_id)
    }

    #[must_use]
    pub fn attribute(&self, node_id: &str, attr_name: &str) -> Option<&Attribute> {
        self.nodes.get(node_id)?.attribute(attr_name)
    }

    /// Number of cached nodes
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}
