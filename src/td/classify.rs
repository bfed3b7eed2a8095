//! Attribute classification
//!
//! Every attribute maps to exactly one primary affordance, decided once from
//! its flags.

use crate::gateway::Attribute;

/// Primary affordance of an attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Affordance {
    /// Plain property
    Property {
        /// The gateway refuses writes
        read_only: bool,
    },
    /// Sensor reading published as an event
    SensorEvent {
        /// Writable sensor, also reachable through an action
        actionable: bool,
    },
    /// Actuator control, exposed only as an action
    ActuatorAction,
}

impl Affordance {
    /// Values of this attribute are published as individual events
    #[must_use]
    pub const fn is_event(self) -> bool {
        matches!(self, Self::SensorEvent { .. })
    }

    /// The description carries an action for this attribute
    #[must_use]
    pub const fn has_action(self) -> bool {
        matches!(
            self,
            Self::SensorEvent { actionable: true } | Self::ActuatorAction
        )
    }
}

/// Classify an attribute
///
/// Sensor takes precedence over actuator; anything that is neither is a
/// property.
#[must_use]
pub const fn classify(attr: &Attribute) -> Affordance {
    if attr.is_sensor {
        Affordance::SensorEvent {
            actionable: attr.writable,
        }
    } else if attr.is_actuator {
        Affordance::ActuatorAction
    } else {
        Affordance::Property {
            read_only: !attr.writable,
        }
    }
}
