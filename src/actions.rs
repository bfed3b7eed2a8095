//! Inbound action handling
//!
//! Actions are validated against the node cache of the most recent poll,
//! written to the gateway, and followed by forced reconciliation refreshes.
//! Nothing is reported back to the sender.

use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::error::RejectReason;
use crate::gateway::GatewayClient;
use crate::pubsub::{ActionHandler, ActionRequest};
use crate::scheduler::PollCycle;
use crate::state::SharedState;
use crate::{Error, Result};

/// Routes action requests to gateway writes
pub struct ActionDispatcher {
    state: SharedState,
    gateway: Arc<dyn GatewayClient>,
    cycle: Arc<dyn PollCycle>,
    refresh_delays: Vec<Duration>,
    cancel: CancellationToken,
    tasks: TaskTracker,
}

impl ActionDispatcher {
    /// Create a dispatcher
    ///
    /// Refreshes are spawned on `tasks`; pending ones are abandoned once
    /// `cancel` fires.
    #[must_use]
    pub fn new(
        state: SharedState,
        gateway: Arc<dyn GatewayClient>,
        cycle: Arc<dyn PollCycle>,
        refresh_delays: Vec<Duration>,
        cancel: CancellationToken,
        tasks: TaskTracker,
    ) -> Self {
        Self {
            state,
            gateway,
            cycle,
            refresh_delays,
            cancel,
            tasks,
        }
    }

    /// Check that the action targets a known, writable attribute
    ///
    /// # Errors
    ///
    /// Returns [`Error::ActionRejected`] naming why the action cannot be written
    pub async fn validate(&self, action: &ActionRequest) -> Result<()> {
        let state = self.state.lock().await;

        let Some(node) = state.node(&action.thing_id) else {
            return Err(Error::rejected(
                &action.thing_id,
                &action.name,
                RejectReason::UnknownThing,
            ));
        };
        let Some(attr) = node.attribute(&action.name) else {
            return Err(Error::rejected(
                &action.thing_id,
                &action.name,
                RejectReason::UnknownAttribute,
            ));
        };
        if !attr.writable {
            return Err(Error::rejected(
                &action.thing_id,
                &action.name,
                RejectReason::ReadOnly,
            ));
        }
        Ok(())
    }

    /// Handle one action request
    ///
    /// Returns once the write has been attempted. The reconciliation
    /// refreshes run on a spawned task; its handle is returned when one was
    /// scheduled. A cancelled dispatcher drops actions.
    pub async fn handle(&self, action: ActionRequest) -> Option<tokio::task::JoinHandle<()>> {
        tracing::info!(
            thing = %action.thing_id,
            attr = %action.name,
            value = %action.value,
            publisher = %action.publisher_id,
            "action received"
        );

        if self.cancel.is_cancelled() {
            tracing::debug!(thing = %action.thing_id, "dispatcher stopped, action dropped");
            return None;
        }

        if let Err(e) = self.validate(&action).await {
            tracing::warn!(error = %e, "action dropped");
            return None;
        }

        if let Err(e) = self
            .gateway
            .write_data(&action.thing_id, &action.name, &action.value)
            .await
        {
            tracing::warn!(
                thing = %action.thing_id,
                attr = %action.name,
                error = %e,
                "gateway write failed"
            );
        }

        Some(self.schedule_refreshes())
    }

    fn schedule_refreshes(&self) -> tokio::task::JoinHandle<()> {
        let cycle = Arc::clone(&self.cycle);
        let delays = self.refresh_delays.clone();
        let cancel = self.cancel.clone();

        self.tasks.spawn(async move {
            for delay in delays {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => {
                        tracing::debug!("reconciliation refreshes cancelled");
                        return;
                    }
                    () = tokio::time::sleep(delay) => {}
                }
                if let Err(e) = cycle.refresh(true).await {
                    tracing::warn!(error = %e, "reconciliation refresh failed");
                }
            }
        })
    }

    /// Wrap the dispatcher as a bus action handler
    #[must_use]
    pub fn into_handler(self: Arc<Self>) -> ActionHandler {
        Arc::new(move |action: ActionRequest| {
            let dispatcher = Arc::clone(&self);
            async move {
                dispatcher.handle(action).await;
            }
            .boxed()
        })
    }
}
