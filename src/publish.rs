//! Publishing node descriptions and attribute values
//!
//! Publishing is best-effort: a failed message is logged and the remaining
//! nodes and attributes are still attempted. The last error is returned.

use std::sync::Arc;

use tokio::time::Instant;

use crate::gateway::Node;
use crate::pubsub::{PropertyMap, PubSubPort};
use crate::state::SharedState;
use crate::td::{classify, synthesize};
use crate::{Error, Result};

/// Counts of messages sent in one publish cycle
#[derive(Debug, Default)]
struct PublishStats {
    events: usize,
    property_batches: usize,
    skipped: usize,
    failed: usize,
}

/// Turns node snapshots into bus messages
pub struct PublishEngine {
    pubsub: Arc<dyn PubSubPort>,
    state: SharedState,
    publisher_id: String,
}

impl PublishEngine {
    #[must_use]
    pub fn new(pubsub: Arc<dyn PubSubPort>, state: SharedState, publisher_id: &str) -> Self {
        Self {
            pubsub,
            state,
            publisher_id: publisher_id.to_string(),
        }
    }

    /// Publish the description document of every node
    ///
    /// # Errors
    ///
    /// Returns the last error if one or more publications failed
    pub async fn publish_descriptions(&self, nodes: &[Node]) -> Result<()> {
        let mut last_err = None;
        let mut published = 0usize;

        for node in nodes {
            let td = synthesize(node).with_publisher(&self.publisher_id);
            let result = match td.to_json() {
                Ok(doc) => {
                    self.pubsub
                        .publish_description(&td.id, &td.device_type, doc)
                        .await
                }
                Err(e) => Err(e),
            };
            match result {
                Ok(()) => published += 1,
                Err(e) => {
                    tracing::warn!(node = %node.id, error = %e, "failed to publish description");
                    last_err = Some(e);
                }
            }
        }

        tracing::info!(
            published,
            failed = nodes.len() - published,
            "published thing descriptions"
        );
        last_err.map_or(Ok(()), Err)
    }

    /// Publish attribute values of every node
    ///
    /// Sensor values go out as one event each. All other accepted values of a
    /// node are batched into a single properties message. With `only_changes`
    /// set, values the change tracker suppresses are skipped.
    ///
    /// # Errors
    ///
    /// Returns the last error if one or more publications failed
    pub async fn publish_values(&self, nodes: &[Node], only_changes: bool) -> Result<()> {
        let mut stats = PublishStats::default();
        let mut last_err: Option<Error> = None;

        for node in nodes {
            let mut props = PropertyMap::new();

            for (name, attr) in &node.attrs {
                if !self.accept(&node.id, name, &attr.value, only_changes).await {
                    stats.skipped += 1;
                    continue;
                }

                if classify(attr).is_event() {
                    match self
                        .pubsub
                        .publish_event(&node.id, name, attr.value.clone().into_bytes())
                        .await
                    {
                        Ok(()) => stats.events += 1,
                        Err(e) => {
                            tracing::warn!(
                                node = %node.id,
                                attr = %name,
                                error = %e,
                                "failed to publish event"
                            );
                            stats.failed += 1;
                            last_err = Some(e);
                        }
                    }
                } else {
                    props.insert(name.clone(), attr.value.clone().into_bytes());
                }
            }

            if !props.is_empty() {
                match self.pubsub.publish_properties(&node.id, props).await {
                    Ok(()) => stats.property_batches += 1,
                    Err(e) => {
                        tracing::warn!(node = %node.id, error = %e, "failed to publish properties");
                        stats.failed += 1;
                        last_err = Some(e);
                    }
                }
            }
        }

        tracing::debug!(
            events = stats.events,
            property_batches = stats.property_batches,
            skipped = stats.skipped,
            failed = stats.failed,
            "published node values"
        );
        last_err.map_or(Ok(()), Err)
    }

    /// Gate a value through the change tracker, recording it when accepted
    async fn accept(
        &self,
        node_id: &str,
        attr_name: &str,
        value: &str,
        only_changes: bool,
    ) -> bool {
        let now = Instant::now();
        let mut state = self.state.lock().await;
        if only_changes && !state.tracker.should_publish(node_id, attr_name, value, now) {
            return false;
        }
        state.tracker.record(node_id, attr_name, value, now);
        true
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::gateway::Attribute;
    use crate::pubsub::{BusMessage, LocalBus};
    use crate::state::BindingState;

    fn engine(bus: &Arc<LocalBus>) -> PublishEngine {
        PublishEngine::new(
            Arc::clone(bus) as Arc<dyn PubSubPort>,
            BindingState::shared(Duration::from_secs(3600)),
            "test-binding",
        )
    }

    fn drain(rx: &mut tokio::sync::broadcast::Receiver<BusMessage>) -> Vec<BusMessage> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    fn multi_node() -> Node {
        Node::new("N1", "Multi")
            .with_attribute(Attribute::new("temp", "number", "20.5").sensor())
            .with_attribute(Attribute::new("humidity", "number", "40").sensor())
            .with_attribute(Attribute::new("family", "string", "28"))
            .with_attribute(Attribute::new("relay", "boolean", "0").writable().actuator())
    }

    #[tokio::test]
    async fn sensors_individually_properties_batched() {
        let bus = Arc::new(LocalBus::new());
        let mut rx = bus.subscribe();

        engine(&bus).publish_values(&[multi_node()], true).await.unwrap();

        let messages = drain(&mut rx);
        let events = messages
            .iter()
            .filter(|m| matches!(m, BusMessage::Event { .. }))
            .count();
        assert_eq!(events, 2);

        let batches: Vec<_> = messages
            .iter()
            .filter_map(|m| match m {
                BusMessage::Properties { props, .. } => Some(props),
                _ => None,
            })
            .collect();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 2);
        assert_eq!(batches[0]["relay"], b"0".to_vec());
    }

    #[tokio::test]
    async fn repeated_cycle_publishes_nothing() {
        let bus = Arc::new(LocalBus::new());
        let mut rx = bus.subscribe();
        let engine = engine(&bus);

        engine.publish_values(&[multi_node()], true).await.unwrap();
        drain(&mut rx);

        engine.publish_values(&[multi_node()], true).await.unwrap();
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn all_values_without_change_detection() {
        let bus = Arc::new(LocalBus::new());
        let mut rx = bus.subscribe();
        let engine = engine(&bus);

        engine.publish_values(&[multi_node()], true).await.unwrap();
        drain(&mut rx);

        engine.publish_values(&[multi_node()], false).await.unwrap();
        assert_eq!(drain(&mut rx).len(), 3);
    }

    #[tokio::test]
    async fn descriptions_carry_publisher() {
        let bus = Arc::new(LocalBus::new());
        let mut rx = bus.subscribe();

        engine(&bus)
            .publish_descriptions(&[multi_node().with_device_type("multisensor")])
            .await
            .unwrap();

        let messages = drain(&mut rx);
        assert_eq!(messages.len(), 1);
        let BusMessage::Description { thing_id, device_type, doc } = &messages[0] else {
            panic!("expected a description");
        };
        assert_eq!(thing_id, "N1");
        assert_eq!(device_type, "multisensor");

        let td: crate::td::ThingDescription = serde_json::from_slice(doc).unwrap();
        assert_eq!(td.publisher_id, "test-binding");
        assert_eq!(td.events.len(), 2);
    }

    #[tokio::test]
    async fn publish_errors_surface_after_full_cycle() {
        let bus = Arc::new(LocalBus::new());
        bus.release().await;
        let engine = engine(&bus);

        let err = engine.publish_values(&[multi_node()], true).await.unwrap_err();
        assert!(matches!(err, Error::Publish(_)));

        // every attribute was still recorded as attempted
        assert_eq!(engine.state.lock().await.tracker.len(), 4);
    }
}
