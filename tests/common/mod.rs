//! Shared test utilities

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use thing_binding::gateway::{Attribute, GatewayClient, Node};
use thing_binding::pubsub::{ActionHandler, ActionRequest, BusMessage, PropertyMap, PubSubPort};
use thing_binding::{Error, Result};
use tokio::time::Instant;

/// Gateway that serves fixed nodes and records polls and writes
#[derive(Default)]
pub struct MockGateway {
    nodes: Mutex<Vec<Node>>,
    failures: AtomicUsize,
    poll_delay: Mutex<Duration>,
    poll_times: Mutex<Vec<Instant>>,
    writes: Mutex<Vec<(String, String, String)>>,
}

impl MockGateway {
    pub fn new(nodes: Vec<Node>) -> Self {
        Self {
            nodes: Mutex::new(nodes),
            ..Self::default()
        }
    }

    /// Fail the next `count` polls
    pub fn fail_next_polls(&self, count: usize) {
        self.failures.store(count, Ordering::SeqCst);
    }

    /// Make every poll take `delay` before answering
    pub fn set_poll_delay(&self, delay: Duration) {
        *self.poll_delay.lock().unwrap() = delay;
    }

    pub fn poll_count(&self) -> usize {
        self.poll_times.lock().unwrap().len()
    }

    pub fn poll_times(&self) -> Vec<Instant> {
        self.poll_times.lock().unwrap().clone()
    }

    pub fn writes(&self) -> Vec<(String, String, String)> {
        self.writes.lock().unwrap().clone()
    }
}

#[async_trait]
impl GatewayClient for MockGateway {
    async fn poll_nodes(&self) -> Result<Vec<Node>> {
        self.poll_times.lock().unwrap().push(Instant::now());

        let delay = *self.poll_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(Error::GatewayUnreachable("gateway offline".to_string()));
        }
        Ok(self.nodes.lock().unwrap().clone())
    }

    async fn write_data(&self, node_id: &str, attr_name: &str, value: &str) -> Result<()> {
        self.writes.lock().unwrap().push((
            node_id.to_string(),
            attr_name.to_string(),
            value.to_string(),
        ));

        let mut nodes = self.nodes.lock().unwrap();
        if let Some(attr) = nodes
            .iter_mut()
            .find(|n| n.id == node_id)
            .and_then(|n| n.attrs.get_mut(attr_name))
        {
            attr.value = value.to_string();
        }
        Ok(())
    }
}

/// Bus that records every publication
#[derive(Default)]
pub struct MockBus {
    messages: Mutex<Vec<BusMessage>>,
    failing_things: Mutex<HashSet<String>>,
    handlers: Mutex<Vec<ActionHandler>>,
    refuse_subscriptions: AtomicBool,
    released: AtomicBool,
}

impl MockBus {
    /// Reject every publication about `thing_id`
    pub fn fail_thing(&self, thing_id: &str) {
        self.failing_things
            .lock()
            .unwrap()
            .insert(thing_id.to_string());
    }

    pub fn refuse_subscriptions(&self) {
        self.refuse_subscriptions.store(true, Ordering::SeqCst);
    }

    pub fn messages(&self) -> Vec<BusMessage> {
        self.messages.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.messages.lock().unwrap().clear();
    }

    /// Event payloads published for one thing attribute
    pub fn events(&self, thing_id: &str, name: &str) -> Vec<String> {
        self.messages()
            .into_iter()
            .filter_map(|m| match m {
                BusMessage::Event {
                    thing_id: t,
                    name: n,
                    payload,
                } if t == thing_id && n == name => {
                    Some(String::from_utf8_lossy(&payload).into_owned())
                }
                _ => None,
            })
            .collect()
    }

    /// Number of descriptions published for a thing
    pub fn descriptions(&self, thing_id: &str) -> usize {
        self.messages()
            .iter()
            .filter(|m| matches!(m, BusMessage::Description { .. }) && m.thing_id() == thing_id)
            .count()
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    /// Deliver an action to every subscribed handler, one task each
    pub fn deliver(&self, action: &ActionRequest) -> usize {
        let handlers = self.handlers.lock().unwrap().clone();
        for handler in &handlers {
            tokio::spawn(handler(action.clone()));
        }
        handlers.len()
    }

    fn record(&self, message: BusMessage) -> Result<()> {
        if self.failing_things.lock().unwrap().contains(message.thing_id()) {
            return Err(Error::Publish(format!("rejected '{}'", message.thing_id())));
        }
        self.messages.lock().unwrap().push(message);
        Ok(())
    }
}

#[async_trait]
impl PubSubPort for MockBus {
    async fn publish_description(
        &self,
        thing_id: &str,
        device_type: &str,
        doc: Vec<u8>,
    ) -> Result<()> {
        self.record(BusMessage::Description {
            thing_id: thing_id.to_string(),
            device_type: device_type.to_string(),
            doc,
        })
    }

    async fn publish_event(&self, thing_id: &str, name: &str, payload: Vec<u8>) -> Result<()> {
        self.record(BusMessage::Event {
            thing_id: thing_id.to_string(),
            name: name.to_string(),
            payload,
        })
    }

    async fn publish_properties(&self, thing_id: &str, props: PropertyMap) -> Result<()> {
        self.record(BusMessage::Properties {
            thing_id: thing_id.to_string(),
            props,
        })
    }

    async fn subscribe_actions(
        &self,
        _thing_filter: &str,
        _name_filter: &str,
        handler: ActionHandler,
    ) -> Result<()> {
        if self.refuse_subscriptions.load(Ordering::SeqCst) {
            return Err(Error::Connection("subscription refused".to_string()));
        }
        self.handlers.lock().unwrap().push(handler);
        Ok(())
    }

    async fn release(&self) {
        self.released.store(true, Ordering::SeqCst);
        self.handlers.lock().unwrap().clear();
    }
}

/// Thermometer node with one sensor reading
#[must_use]
pub fn thermometer(id: &str, temp: &str) -> Node {
    Node::new(id, "Thermometer")
        .with_device_type("thermometer")
        .with_attribute(
            Attribute::new("temp", "number", temp)
                .with_unit("C")
                .sensor(),
        )
}

/// Switch node with a writable relay and a read-only label
#[must_use]
pub fn switch(id: &str) -> Node {
    Node::new(id, "Switch")
        .with_device_type("onOffSwitch")
        .with_attribute(Attribute::new("relay", "boolean", "0").writable().actuator())
        .with_attribute(Attribute::new("label", "string", "pump"))
}
