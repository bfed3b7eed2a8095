//! Thing Binding - publishes device gateway nodes onto a message bus
//!
//! The binding polls a device gateway for a flat set of named attributes per
//! node, classifies them into properties, events and actions, and republishes
//! them onto a message bus. Unchanged values are suppressed until the
//! republish interval expires. Action requests from the bus are written back
//! to the gateway.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                  Message bus                         │
//! │   descriptions  │  events  │  properties  │ actions │
//! └────────────────────┬────────────────────────────────┘
//!                      │ PubSubPort
//! ┌────────────────────▼────────────────────────────────┐
//! │                    Binding                           │
//! │  Scheduler  │  PublishEngine  │  ActionDispatcher   │
//! │         ChangeTracker  │  node cache                 │
//! └────────────────────┬────────────────────────────────┘
//!                      │ GatewayClient
//! ┌────────────────────▼────────────────────────────────┐
//! │                 Device gateway                       │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod actions;
pub mod binding;
pub mod config;
pub mod error;
pub mod gateway;
pub mod publish;
pub mod pubsub;
pub mod scheduler;
pub mod state;
pub mod td;
pub mod tracker;

pub use actions::ActionDispatcher;
pub use binding::Binding;
pub use config::BindingConfig;
pub use error::{Error, RejectReason, Result};
pub use gateway::{Attribute, GatewayClient, Node, SnapshotGateway};
pub use publish::PublishEngine;
pub use pubsub::{ActionRequest, LocalBus, PubSubPort};
pub use scheduler::{PollCycle, RunState, ScheduleState, Scheduler, TickOutcome};
pub use tracker::ChangeTracker;
