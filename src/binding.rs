//! Binding lifecycle
//!
//! Wires the gateway, the bus, the publish engine, the action dispatcher and
//! the heartbeat together around one shared state.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::actions::ActionDispatcher;
use crate::config::BindingConfig;
use crate::gateway::{GatewayClient, Node};
use crate::publish::PublishEngine;
use crate::pubsub::PubSubPort;
use crate::scheduler::{PollCycle, RunState, Scheduler};
use crate::state::{BindingState, SharedState};
use crate::td::binding_description;
use crate::{Error, Result};

/// A running device binding
///
/// A binding runs once: after it has stopped, build a new one.
pub struct Binding {
    config: BindingConfig,
    gateway: Arc<dyn GatewayClient>,
    pubsub: Arc<dyn PubSubPort>,
    state: SharedState,
    engine: PublishEngine,
    shutdown: CancellationToken,
    refreshes: TaskTracker,
    running: AtomicBool,
}

impl Binding {
    /// Create a binding
    #[must_use]
    pub fn new(
        config: BindingConfig,
        gateway: Arc<dyn GatewayClient>,
        pubsub: Arc<dyn PubSubPort>,
    ) -> Self {
        let state = BindingState::shared(config.republish_duration());
        let engine =
            PublishEngine::new(Arc::clone(&pubsub), Arc::clone(&state), &config.binding_id);

        Self {
            config,
            gateway,
            pubsub,
            state,
            engine,
            shutdown: CancellationToken::new(),
            refreshes: TaskTracker::new(),
            running: AtomicBool::new(false),
        }
    }

    /// Binding instance ID
    #[must_use]
    pub fn id(&self) -> &str {
        &self.config.binding_id
    }

    /// Shared node cache and change tracker
    #[must_use]
    pub const fn state(&self) -> &SharedState {
        &self.state
    }

    #[must_use]
    pub fn status(&self) -> RunState {
        if self.running.load(Ordering::SeqCst) {
            RunState::Running
        } else {
            RunState::Stopped
        }
    }

    /// Run the binding until `cancel` fires or [`Binding::stop`] is called
    ///
    /// Publishes the binding's own description, subscribes to actions and
    /// starts the heartbeat. On the way out it waits for the heartbeat and
    /// any running action refresh, then releases the bus subscriptions.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if the bus cannot be reached at startup
    pub async fn start(self: &Arc<Self>, cancel: CancellationToken) -> Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            tracing::warn!(binding = %self.id(), "binding already running");
            return Ok(());
        }

        if let Err(e) = self.connect().await {
            self.running.store(false, Ordering::SeqCst);
            return Err(e);
        }

        let scheduler = Scheduler::new(
            Arc::clone(self) as Arc<dyn PollCycle>,
            self.config.td_interval,
            self.config.poll_interval,
            self.shutdown.child_token(),
        );
        let heartbeat = tokio::spawn(scheduler.run());

        tracing::info!(binding = %self.id(), "binding running");

        tokio::select! {
            () = cancel.cancelled() => {}
            () = self.shutdown.cancelled() => {}
        }

        self.stop();
        if let Err(e) = heartbeat.await {
            tracing::warn!(error = %e, "heartbeat task ended abnormally");
        }
        self.refreshes.close();
        self.refreshes.wait().await;
        self.pubsub.release().await;
        self.running.store(false, Ordering::SeqCst);

        tracing::info!(binding = %self.id(), "binding stopped");
        Ok(())
    }

    /// Publish the service description and subscribe to actions
    async fn connect(self: &Arc<Self>) -> Result<()> {
        let td = binding_description(self.id());
        self.pubsub
            .publish_description(&td.id, &td.device_type, td.to_json()?)
            .await
            .map_err(|e| {
                Error::Connection(format!("failed to publish binding description: {e}"))
            })?;

        let dispatcher = Arc::new(ActionDispatcher::new(
            Arc::clone(&self.state),
            Arc::clone(&self.gateway),
            Arc::clone(self) as Arc<dyn PollCycle>,
            self.config.refresh_durations(),
            self.shutdown.child_token(),
            self.refreshes.clone(),
        ));
        self.pubsub
            .subscribe_actions("", "", dispatcher.into_handler())
            .await
            .map_err(|e| Error::Connection(format!("failed to subscribe to actions: {e}")))
    }

    /// Request shutdown
    ///
    /// Idempotent and returns immediately. An in-flight poll is not
    /// interrupted; the heartbeat notices at its next tick. Pending action
    /// refreshes are abandoned.
    pub fn stop(&self) {
        if !self.shutdown.is_cancelled() {
            tracing::info!(binding = %self.id(), "stopping binding");
            self.shutdown.cancel();
        }
    }

    /// Poll the gateway and replace the node cache on success
    ///
    /// # Errors
    ///
    /// Returns the gateway error; the cache is left untouched
    pub async fn poll_nodes(&self) -> Result<Vec<Node>> {
        let nodes = self.gateway.poll_nodes().await?;
        self.state.lock().await.replace_nodes(&nodes);
        tracing::debug!(count = nodes.len(), "polled gateway");
        Ok(nodes)
    }
}

#[async_trait]
impl PollCycle for Binding {
    async fn poll(&self) -> Result<Vec<Node>> {
        self.poll_nodes().await
    }

    async fn announce(&self, nodes: &[Node]) -> Result<()> {
        self.engine.publish_descriptions(nodes).await
    }

    async fn publish(&self, nodes: &[Node], only_changes: bool) -> Result<()> {
        self.engine.publish_values(nodes, only_changes).await
    }
}
