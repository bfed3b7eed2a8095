//! In-process message bus
//!
//! Publications are broadcast to every subscriber of [`LocalBus::subscribe`].
//! Injected actions are handed to each matching subscription on its own task.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, broadcast};

use super::{ActionHandler, ActionRequest, PropertyMap, PubSubPort};
use crate::{Error, Result};

/// Broadcast channel capacity
const CHANNEL_CAPACITY: usize = 256;

/// A message published on the bus
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusMessage {
    Description {
        thing_id: String,
        device_type: String,
        doc: Vec<u8>,
    },
    Event {
        thing_id: String,
        name: String,
        payload: Vec<u8>,
    },
    Properties {
        thing_id: String,
        props: PropertyMap,
    },
}

impl BusMessage {
    /// Thing the message is about
    #[must_use]
    pub fn thing_id(&self) -> &str {
        match self {
            Self::Description { thing_id, .. }
            | Self::Event { thing_id, .. }
            | Self::Properties { thing_id, .. } => thing_id,
        }
    }
}

struct Subscription {
    thing_filter: String,
    name_filter: String,
    handler: ActionHandler,
}

impl Subscription {
    fn matches(&self, action: &ActionRequest) -> bool {
        (self.thing_filter.is_empty() || self.thing_filter == action.thing_id)
            && (self.name_filter.is_empty() || self.name_filter == action.name)
    }
}

/// In-process bus backed by a broadcast channel
pub struct LocalBus {
    tx: broadcast::Sender<BusMessage>,
    subscriptions: Mutex<Vec<Subscription>>,
    released: AtomicBool,
}

impl Default for LocalBus {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalBus {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            tx,
            subscriptions: Mutex::new(Vec::new()),
            released: AtomicBool::new(false),
        }
    }

    /// Subscribe to everything published from now on
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<BusMessage> {
        self.tx.subscribe()
    }

    /// Deliver an action to every matching subscription
    ///
    /// Each handler runs on its own task; the result is not reported back.
    /// Returns the number of handlers the action was delivered to.
    pub async fn inject_action(&self, action: ActionRequest) -> usize {
        let handlers: Vec<ActionHandler> = self
            .subscriptions
            .lock()
            .await
            .iter()
            .filter(|s| s.matches(&action))
            .map(|s| std::sync::Arc::clone(&s.handler))
            .collect();

        for handler in &handlers {
            tokio::spawn(handler(action.clone()));
        }
        handlers.len()
    }

    /// Number of active action subscriptions
    pub async fn subscription_count(&self) -> usize {
        self.subscriptions.lock().await.len()
    }

    /// Whether [`PubSubPort::release`] has been called
    #[must_use]
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    fn send(&self, message: BusMessage) -> Result<()> {
        if self.is_released() {
            return Err(Error::Publish(format!(
                "bus released, dropping message for '{}'",
                message.thing_id()
            )));
        }
        // No receivers is not an error: nobody is listening yet
        let _ = self.tx.send(message);
        Ok(())
    }
}

#[async_trait]
impl PubSubPort for LocalBus {
    async fn publish_description(
        &self,
        thing_id: &str,
        device_type: &str,
        doc: Vec<u8>,
    ) -> Result<()> {
        self.send(BusMessage::Description {
            thing_id: thing_id.to_string(),
            device_type: device_type.to_string(),
            doc,
        })
    }

    async fn publish_event(&self, thing_id: &str, name: &str, payload: Vec<u8>) -> Result<()> {
        self.send(BusMessage::Event {
            thing_id: thing_id.to_string(),
            name: name.to_string(),
            payload,
        })
    }

    async fn publish_properties(&self, thing_id: &str, props: PropertyMap) -> Result<()> {
        self.send(BusMessage::Properties {
            thing_id: thing_id.to_string(),
            props,
        })
    }

    async fn subscribe_actions(
        &self,
        thing_filter: &str,
        name_filter: &str,
        handler: ActionHandler,
    ) -> Result<()> {
        if self.is_released() {
            return Err(Error::Connection("bus released".to_string()));
        }
        self.subscriptions.lock().await.push(Subscription {
            thing_filter: thing_filter.to_string(),
            name_filter: name_filter.to_string(),
            handler,
        });
        Ok(())
    }

    async fn release(&self) {
        self.released.store(true, Ordering::SeqCst);
        self.subscriptions.lock().await.clear();
        tracing::debug!("local bus released");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    use futures::FutureExt;

    use super::*;

    fn counting_handler(count: Arc<AtomicUsize>) -> ActionHandler {
        Arc::new(move |_action: ActionRequest| {
            let count = Arc::clone(&count);
            async move {
                count.fetch_add(1, Ordering::SeqCst);
            }
            .boxed()
        })
    }

    #[tokio::test]
    async fn publications_reach_subscribers() {
        let bus = LocalBus::new();
        let mut rx = bus.subscribe();

        bus.publish_event("N1", "temp", b"20.5".to_vec()).await.unwrap();

        let msg = rx.recv().await.unwrap();
        assert_eq!(
            msg,
            BusMessage::Event {
                thing_id: "N1".to_string(),
                name: "temp".to_string(),
                payload: b"20.5".to_vec(),
            }
        );
    }

    #[tokio::test]
    async fn publish_without_subscribers_succeeds() {
        let bus = LocalBus::new();
        assert!(bus.publish_properties("N1", PropertyMap::new()).await.is_ok());
    }

    #[tokio::test]
    async fn actions_respect_filters() {
        let bus = LocalBus::new();
        let all = Arc::new(AtomicUsize::new(0));
        let relay_only = Arc::new(AtomicUsize::new(0));

        bus.subscribe_actions("", "", counting_handler(Arc::clone(&all)))
            .await
            .unwrap();
        bus.subscribe_actions("N1", "relay", counting_handler(Arc::clone(&relay_only)))
            .await
            .unwrap();

        assert_eq!(bus.inject_action(ActionRequest::new("N1", "relay", "1")).await, 2);
        assert_eq!(bus.inject_action(ActionRequest::new("N2", "relay", "1")).await, 1);

        tokio::task::yield_now().await;
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        assert_eq!(all.load(Ordering::SeqCst), 2);
        assert_eq!(relay_only.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn release_drops_subscriptions_and_refuses_publishing() {
        let bus = LocalBus::new();
        bus.subscribe_actions("", "", counting_handler(Arc::new(AtomicUsize::new(0))))
            .await
            .unwrap();
        assert_eq!(bus.subscription_count().await, 1);

        bus.release().await;
        assert!(bus.is_released());
        assert_eq!(bus.subscription_count().await, 0);
        assert!(matches!(
            bus.publish_event("N1", "temp", Vec::new()).await,
            Err(Error::Publish(_))
        ));
    }
}
