//! Error types for the thing binding

use std::fmt;

use thiserror::Error;

/// Result type alias for binding operations
pub type Result<T> = std::result::Result<T, Error>;

/// Why an inbound action was dropped without reaching the gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// No node with this ID in the most recent poll
    UnknownThing,
    /// The node has no attribute with this name
    UnknownAttribute,
    /// The attribute exists but the gateway does not accept writes to it
    ReadOnly,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownThing => write!(f, "unknown thing"),
            Self::UnknownAttribute => write!(f, "unknown attribute"),
            Self::ReadOnly => write!(f, "read-only attribute"),
        }
    }
}

/// Errors that can occur in the binding
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Bus or gateway connection could not be established at startup
    #[error("connection error: {0}")]
    Connection(String),

    /// Gateway address is invalid or the gateway did not answer
    #[error("gateway unreachable: {0}")]
    GatewayUnreachable(String),

    /// Gateway answered with a malformed response
    #[error("gateway protocol error: {0}")]
    GatewayProtocol(String),

    /// Gateway refused or failed a write
    #[error("gateway write error: {0}")]
    GatewayWrite(String),

    /// A single bus publication failed
    #[error("publish error: {0}")]
    Publish(String),

    /// Inbound action dropped before reaching the gateway
    #[error("action '{name}' on '{thing_id}' rejected: {reason}")]
    ActionRejected {
        thing_id: String,
        name: String,
        reason: RejectReason,
    },

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Whether this is a transient poll failure that the heartbeat retries
    #[must_use]
    pub const fn is_gateway_poll(&self) -> bool {
        matches!(self, Self::GatewayUnreachable(_) | Self::GatewayProtocol(_))
    }

    /// Build an [`Error::ActionRejected`]
    #[must_use]
    pub fn rejected(thing_id: &str, name: &str, reason: RejectReason) -> Self {
        Self::ActionRejected {
            thing_id: thing_id.to_string(),
            name: name.to_string(),
            reason,
        }
    }
}
