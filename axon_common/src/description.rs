//! Resource description model.
//!
//! A `ResourceDescription` is the backend-agnostic inventory of a robot:
//! joints and sensors, each with a parameter map and the command/state
//! interface names it declares. The description is deserializable so a
//! robot can be written down in TOML (see [`crate::config`]).

use serde::Deserialize;
use std::collections::BTreeMap;

/// One joint or sensor with its declared interfaces.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ComponentDescription {
    /// Unique component name.
    pub name: String,
    /// Free-form string parameters (`mimic`, `initial_position`, ...).
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
    /// Writable interface names declared by this component.
    #[serde(default)]
    pub command_interfaces: Vec<String>,
    /// Readable interface names declared by this component.
    #[serde(default)]
    pub state_interfaces: Vec<String>,
}

/// Full robot resource description consumed by backends.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResourceDescription {
    /// Backend-level parameters (`disable_commands`, offsets, ...).
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
    /// Joints in declaration order.
    #[serde(default)]
    pub joints: Vec<ComponentDescription>,
    /// Sensors in declaration order.
    #[serde(default)]
    pub sensors: Vec<ComponentDescription>,
}

impl ResourceDescription {
    /// Index of the joint with the given name.
    pub fn joint_index(&self, name: &str) -> Option<usize> {
        self.joints.iter().position(|j| j.name == name)
    }

    /// Index of the sensor with the given name.
    pub fn sensor_index(&self, name: &str) -> Option<usize> {
        self.sensors.iter().position(|s| s.name == name)
    }

    /// Joint names in declaration order.
    pub fn joint_names(&self) -> Vec<String> {
        self.joints.iter().map(|j| j.name.clone()).collect()
    }

    /// Backend parameter interpreted as a boolean flag.
    ///
    /// Missing keys are `false`; the accepted spellings match the
    /// conventional description files (`true` / `True`).
    pub fn flag(&self, key: &str) -> bool {
        matches!(self.parameters.get(key).map(String::as_str), Some("true") | Some("True"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_joint_description() -> ResourceDescription {
        toml::from_str(
            r#"
[parameters]
disable_commands = "false"

[[joints]]
name = "joint1"
command_interfaces = ["position", "velocity"]
state_interfaces = ["position", "velocity"]

[joints.parameters]
initial_position = "1.57"

[[joints]]
name = "joint2"
command_interfaces = ["position"]
state_interfaces = ["position"]

[[sensors]]
name = "tcp_force"
state_interfaces = ["force.x", "force.y"]
"#,
        )
        .expect("description should parse")
    }

    #[test]
    fn parses_joints_and_sensors_in_order() {
        let desc = two_joint_description();
        assert_eq!(desc.joint_names(), vec!["joint1", "joint2"]);
        assert_eq!(desc.sensors.len(), 1);
        assert_eq!(desc.sensors[0].state_interfaces, vec!["force.x", "force.y"]);
    }

    #[test]
    fn joint_index_lookup() {
        let desc = two_joint_description();
        assert_eq!(desc.joint_index("joint2"), Some(1));
        assert_eq!(desc.joint_index("nope"), None);
        assert_eq!(desc.sensor_index("tcp_force"), Some(0));
    }

    #[test]
    fn flag_parsing() {
        let mut desc = two_joint_description();
        assert!(!desc.flag("disable_commands"));
        desc.parameters.insert("disable_commands".into(), "True".into());
        assert!(desc.flag("disable_commands"));
        assert!(!desc.flag("unknown_key"));
    }

    #[test]
    fn joint_parameters_are_preserved() {
        let desc = two_joint_description();
        assert_eq!(
            desc.joints[0].parameters.get("initial_position").map(String::as_str),
            Some("1.57")
        );
    }
}
