//! Description synthesis from node snapshots

use super::{
    ActionAffordance, Affordance, DEVICE_TYPE_SERVICE, DataSchema, EventAffordance,
    PropertyAffordance, ThingDescription, classify,
};
use crate::gateway::{Attribute, Node};

/// Build the description document of a node
///
/// - Sensors become events; writable sensors also get an action
/// - Actuators become actions only
/// - Everything else becomes a property, read-only unless writable
#[must_use]
pub fn synthesize(node: &Node) -> ThingDescription {
    let mut td = ThingDescription::new(&node.id, &node.device_type, &node.name);
    td.description.clone_from(&node.description);

    for (name, attr) in &node.attrs {
        match classify(attr) {
            Affordance::SensorEvent { actionable } => {
                td.events.insert(name.clone(), event_affordance(attr));
                if actionable {
                    td.actions.insert(name.clone(), action_affordance(attr));
                }
            }
            Affordance::ActuatorAction => {
                td.actions.insert(name.clone(), action_affordance(attr));
            }
            Affordance::Property { read_only } => {
                td.properties
                    .insert(name.clone(), property_affordance(attr, read_only));
            }
        }
    }

    td
}

/// Description of the binding service itself
#[must_use]
pub fn binding_description(binding_id: &str) -> ThingDescription {
    let mut td = ThingDescription::new(binding_id, DEVICE_TYPE_SERVICE, "Gateway protocol binding")
        .with_publisher(binding_id);
    td.description =
        "Polls the device gateway and publishes its nodes as things".to_string();
    td
}

fn property_affordance(attr: &Attribute, read_only: bool) -> PropertyAffordance {
    PropertyAffordance {
        title: attr.name.clone(),
        vocab_type: attr.vocab_type.clone(),
        schema: DataSchema {
            data_type: attr.data_type.clone(),
            unit: attr.unit.clone(),
            initial_value: Some(attr.display_value()),
            read_only,
        },
    }
}

fn event_affordance(attr: &Attribute) -> EventAffordance {
    EventAffordance {
        title: attr.name.clone(),
        vocab_type: attr.vocab_type.clone(),
        data: attr.has_data().then(|| DataSchema {
            data_type: attr.data_type.clone(),
            unit: attr.unit.clone(),
            initial_value: Some(attr.display_value()),
            read_only: true,
        }),
    }
}

fn action_affordance(attr: &Attribute) -> ActionAffordance {
    ActionAffordance {
        title: attr.name.clone(),
        vocab_type: attr.vocab_type.clone(),
        input: attr.has_data().then(|| DataSchema {
            data_type: attr.data_type.clone(),
            unit: attr.unit.clone(),
            initial_value: None,
            read_only: false,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::DATA_TYPE_NONE;

    fn sample_node() -> Node {
        Node::new("C100100000267C7E", "Relay board")
            .with_device_type("switch")
            .with_description("Dual relay")
            .with_attribute(
                Attribute::new("temp", "number", "20.5")
                    .with_unit("C")
                    .with_vocab("temperature")
                    .sensor(),
            )
            .with_attribute(Attribute::new("relay", "boolean", "0").writable().actuator())
            .with_attribute(Attribute::new("family", "string", "28"))
            .with_attribute(Attribute::new("label", "string", "kitchen").writable())
    }

    #[test]
    fn node_identity_carries_over() {
        let td = synthesize(&sample_node());
        assert_eq!(td.id, "C100100000267C7E");
        assert_eq!(td.title, "Relay board");
        assert_eq!(td.device_type, "switch");
        assert_eq!(td.description, "Dual relay");
    }

    #[test]
    fn sensor_becomes_event_with_unit_in_initial_value() {
        let td = synthesize(&sample_node());
        let event = &td.events["temp"];
        assert_eq!(event.vocab_type, "temperature");

        let data = event.data.as_ref().unwrap();
        assert_eq!(data.data_type, "number");
        assert_eq!(data.unit, "C");
        assert_eq!(data.initial_value.as_deref(), Some("20.5 C"));

        assert!(!td.properties.contains_key("temp"));
        assert!(!td.actions.contains_key("temp"));
    }

    #[test]
    fn writable_sensor_yields_event_and_action() {
        let node = Node::new("N1", "Dimmer").with_attribute(
            Attribute::new("level", "number", "40")
                .with_unit("%")
                .sensor()
                .writable(),
        );
        let td = synthesize(&node);

        assert!(td.events.contains_key("level"));
        let input = td.actions["level"].input.as_ref().unwrap();
        assert_eq!(input.data_type, "number");
        assert_eq!(input.unit, "%");
        assert!(input.initial_value.is_none());
        assert!(td.properties.is_empty());
    }

    #[test]
    fn actuator_is_action_only() {
        let td = synthesize(&sample_node());
        assert!(td.actions.contains_key("relay"));
        assert!(!td.events.contains_key("relay"));
        assert!(!td.properties.contains_key("relay"));
    }

    #[test]
    fn properties_follow_writable_flag() {
        let td = synthesize(&sample_node());
        assert!(td.properties["family"].schema.read_only);
        assert!(!td.properties["label"].schema.read_only);
        assert_eq!(
            td.properties["label"].schema.initial_value.as_deref(),
            Some("kitchen")
        );
    }

    #[test]
    fn one_primary_affordance_per_attribute() {
        let node = sample_node();
        let td = synthesize(&node);
        for name in node.attrs.keys() {
            let primary = usize::from(td.properties.contains_key(name))
                + usize::from(td.events.contains_key(name))
                + usize::from(td.actions.contains_key(name) && !td.events.contains_key(name));
            assert_eq!(primary, 1, "{name}");
        }
    }

    #[test]
    fn valueless_attributes_have_no_schema() {
        let node = Node::new("N1", "Counter")
            .with_attribute(Attribute::new("reset", DATA_TYPE_NONE, "").actuator())
            .with_attribute(Attribute::new("tick", DATA_TYPE_NONE, "").sensor());
        let td = synthesize(&node);
        assert!(td.actions["reset"].input.is_none());
        assert!(td.events["tick"].data.is_none());
    }

    #[test]
    fn synthesis_is_deterministic() {
        let node = sample_node();
        let a = synthesize(&node);
        let b = synthesize(&node);
        assert_eq!(a.properties, b.properties);
        assert_eq!(a.events, b.events);
        assert_eq!(a.actions, b.actions);
    }

    #[test]
    fn binding_description_is_a_service() {
        let td = binding_description("gw-1");
        assert_eq!(td.id, "gw-1");
        assert_eq!(td.device_type, DEVICE_TYPE_SERVICE);
        assert_eq!(td.publisher_id, "gw-1");
        assert_eq!(td.affordance_count(), 0);
    }
}
