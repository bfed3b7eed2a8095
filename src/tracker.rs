//! Change detection for published attribute values
//!
//! An unchanged value is suppressed until it is older than the republish
//! interval. Every accepted publish resets the age, so an idle attribute is
//! republished once per interval as a liveness signal.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

/// Last value accepted for publication
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueStamp {
    pub timestamp: Instant,
    pub value: String,
}

/// Tracks the last published value per (node, attribute)
#[derive(Debug)]
pub struct ChangeTracker {
    /// node ID → attribute name → stamp
    stamps: HashMap<String, HashMap<String, ValueStamp>>,
    republish_interval: Duration,
}

impl ChangeTracker {
    /// Create an empty tracker
    #[must_use]
    pub fn new(republish_interval: Duration) -> Self {
        Self {
            stamps: HashMap::new(),
            republish_interval,
        }
    }

    /// Whether a value should be published at `now`
    ///
    /// Skips only when a stamp exists, the value is unchanged and the stamp
    /// is younger than the republish interval.
    #[must_use]
    pub fn should_publish(
        &self,
        node_id: &str,
        attr_name: &str,
        value: &str,
        now: Instant,
    ) -> bool {
        self.get(node_id, attr_name).is_none_or(|prev| {
            prev.value != value
                || now.saturating_duration_since(prev.timestamp) >= self.republish_interval
        })
    }

    /// Record an accepted publish
    pub fn record(&mut self, node_id: &str, attr_name: &str, value: &str, now: Instant) {
        self.stamps
            .entry(node_id.to_string())
            .or_default()
            .insert(
                attr_name.to_string(),
                ValueStamp {
                    timestamp: now,
                    value: value.to_string(),
                },
            );
    }

    /// Last stamp of an attribute
    #[must_use]
    pub fn get(&self, node_id: &str, attr_name: &str) -> Option<&ValueStamp> {
        self.stamps.get(node_id)?.get(attr_name)
    }

    /// Number of tracked (node, attribute) pairs
    #[must_use]
    pub fn len(&self) -> usize {
        self.stamps.values().map(HashMap::len).sum()
    }

    /// Whether nothing has been published yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stamps.is_empty()
    }
}
