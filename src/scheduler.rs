//! Heartbeat scheduler
//!
//! A single 1-second tick drives two independent countdowns: one for
//! re-announcing descriptions (rare) and one for polling values (frequent).
//! Both start at zero so the first tick does both. A failed poll leaves the
//! countdowns alone and is retried on the next tick, without backoff.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::Result;
use crate::gateway::Node;

/// Tick period of the heartbeat
pub const TICK: Duration = Duration::from_secs(1);

/// One poll-and-publish cycle, as seen by the scheduler and the action
/// dispatcher
#[async_trait]
pub trait PollCycle: Send + Sync {
    /// Poll the gateway and refresh the node cache
    async fn poll(&self) -> Result<Vec<Node>>;

    /// Publish the description of every node
    async fn announce(&self, nodes: &[Node]) -> Result<()>;

    /// Publish node values
    async fn publish(&self, nodes: &[Node], only_changes: bool) -> Result<()>;

    /// Poll and publish values in one go
    ///
    /// # Errors
    ///
    /// Returns the poll error, or the last publish error
    async fn refresh(&self, only_changes: bool) -> Result<()> {
        let nodes = self.poll().await?;
        self.publish(&nodes, only_changes).await
    }
}

/// Lifecycle of the heartbeat
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Stopped,
    Running,
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stopped => write!(f, "stopped"),
            Self::Running => write!(f, "running"),
        }
    }
}

/// Second counters until the next announcement and poll
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScheduleState {
    pub td_countdown: i64,
    pub poll_countdown: i64,
}

/// What a single tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Poll countdown still running
    Idle,
    /// Poll failed; retried next tick
    PollFailed,
    /// Poll succeeded and values were published
    Published {
        /// Descriptions were re-announced on this tick
        announced: bool,
    },
}

/// Timer loop coordinating polls and announcements
pub struct Scheduler {
    cycle: Arc<dyn PollCycle>,
    td_interval: i64,
    poll_interval: i64,
    state: ScheduleState,
    cancel: CancellationToken,
}

impl Scheduler {
    /// Create a scheduler; intervals are in seconds
    #[must_use]
    pub fn new(
        cycle: Arc<dyn PollCycle>,
        td_interval: u32,
        poll_interval: u32,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            cycle,
            td_interval: i64::from(td_interval),
            poll_interval: i64::from(poll_interval),
            state: ScheduleState::default(),
            cancel,
        }
    }

    /// Current countdowns
    #[must_use]
    pub const fn state(&self) -> ScheduleState {
        self.state
    }

    /// Run until cancelled
    ///
    /// Cancellation is observed between ticks; an in-flight poll is not
    /// interrupted.
    pub async fn run(mut self) {
        tracing::info!(
            td_interval = self.td_interval,
            poll_interval = self.poll_interval,
            "heartbeat started"
        );

        let mut ticker = tokio::time::interval(TICK);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            self.tick().await;
        }

        tracing::info!("heartbeat stopped");
    }

    /// Advance both countdowns by one second and act on them
    pub async fn tick(&mut self) -> TickOutcome {
        self.state.td_countdown -= 1;
        self.state.poll_countdown -= 1;

        if self.state.poll_countdown > 0 {
            return TickOutcome::Idle;
        }

        let nodes = match self.cycle.poll().await {
            Ok(nodes) => nodes,
            Err(e) => {
                tracing::warn!(error = %e, "gateway poll failed, retrying next tick");
                return TickOutcome::PollFailed;
            }
        };

        let announced = self.state.td_countdown <= 0;
        if announced {
            if let Err(e) = self.cycle.announce(&nodes).await {
                tracing::warn!(error = %e, "description announcement incomplete");
            }
            self.state.td_countdown = self.td_interval;
        }

        if let Err(e) = self.cycle.publish(&nodes, true).await {
            tracing::warn!(error = %e, "value publication incomplete");
        }
        self.state.poll_countdown = self.poll_interval;

        TickOutcome::Published { announced }
    }
}
