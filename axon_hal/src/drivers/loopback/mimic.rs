//! Mimic joint coupling.
//!
//! A mimic joint derives its every state from another joint's state via
//! a fixed multiplier; its own commands never drive it. Relations are
//! resolved once at configure time and applied every cycle, last among
//! the state updates so followers always see the leader's fresh value.

use crate::storage::InterfaceStorage;
use axon_common::backend::ConfigError;
use axon_common::description::ResourceDescription;
use tracing::debug;

/// One resolved follower → leader relation.
#[derive(Debug, Clone, PartialEq)]
pub struct MimicJoint {
    /// Follower joint column.
    pub joint_index: usize,
    /// Leader joint column.
    pub mimicked_joint_index: usize,
    /// State multiplier (default 1.0).
    pub multiplier: f64,
}

/// Resolve all `mimic` declarations in the description.
///
/// # Errors
/// `ConfigError::DanglingMimic` if a named leader joint does not exist;
/// `ConfigError::MalformedParameter` if a `multiplier` is not numeric.
pub fn discover_mimic_joints(
    description: &ResourceDescription,
) -> Result<Vec<MimicJoint>, ConfigError> {
    let mut mimics = Vec::new();
    for (joint_index, joint) in description.joints.iter().enumerate() {
        let Some(leader) = joint.parameters.get("mimic") else {
            continue;
        };
        let Some(mimicked_joint_index) = description.joint_index(leader) else {
            return Err(ConfigError::DanglingMimic {
                joint: joint.name.clone(),
                leader: leader.clone(),
            });
        };
        let multiplier = match joint.parameters.get("multiplier") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::MalformedParameter {
                entity: joint.name.clone(),
                key: "multiplier".to_string(),
                value: raw.clone(),
            })?,
            None => 1.0,
        };
        debug!(
            follower = %joint.name,
            leader = %leader,
            multiplier,
            "resolved mimic joint"
        );
        mimics.push(MimicJoint {
            joint_index,
            mimicked_joint_index,
            multiplier,
        });
    }
    Ok(mimics)
}

/// Overwrite each follower's state in every joint interface row with
/// `multiplier * leader state`, standard and other banks alike.
pub fn apply_mimic(mimics: &[MimicJoint], storage: &mut InterfaceStorage) {
    for mimic in mimics {
        for row in 0..storage.standard().interface_count() {
            let leader = storage.standard().state(row, mimic.mimicked_joint_index);
            storage
                .standard_mut()
                .set_state(row, mimic.joint_index, mimic.multiplier * leader);
        }
        for row in 0..storage.other().interface_count() {
            let leader = storage.other().state(row, mimic.mimicked_joint_index);
            storage
                .other_mut()
                .set_state(row, mimic.joint_index, mimic.multiplier * leader);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axon_common::interface::POSITION_ROW;

    fn description(mimic: &str, multiplier: Option<&str>) -> ResourceDescription {
        let mut toml = format!(
            r#"
[[joints]]
name = "joint1"
command_interfaces = ["position"]
state_interfaces = ["position"]

[[joints]]
name = "joint2"
command_interfaces = ["position"]
state_interfaces = ["position"]

[joints.parameters]
mimic = "{mimic}"
"#
        );
        if let Some(m) = multiplier {
            toml.push_str(&format!("multiplier = \"{m}\"\n"));
        }
        toml::from_str(&toml).expect("description should parse")
    }

    #[test]
    fn resolves_leader_and_multiplier() {
        let mimics = discover_mimic_joints(&description("joint1", Some("-2.0"))).unwrap();
        assert_eq!(
            mimics,
            vec![MimicJoint {
                joint_index: 1,
                mimicked_joint_index: 0,
                multiplier: -2.0,
            }]
        );
    }

    #[test]
    fn multiplier_defaults_to_one() {
        let mimics = discover_mimic_joints(&description("joint1", None)).unwrap();
        assert_eq!(mimics[0].multiplier, 1.0);
    }

    #[test]
    fn dangling_leader_fails_configuration() {
        let err = discover_mimic_joints(&description("ghost", None)).unwrap_err();
        assert!(matches!(err, ConfigError::DanglingMimic { .. }));
    }

    #[test]
    fn malformed_multiplier_fails_configuration() {
        let err = discover_mimic_joints(&description("joint1", Some("twice"))).unwrap_err();
        assert!(matches!(err, ConfigError::MalformedParameter { .. }));
    }

    #[test]
    fn apply_overwrites_follower_states() {
        let desc = description("joint1", Some("-1.0"));
        let mut storage = InterfaceStorage::from_description(&desc).unwrap();
        storage.standard_mut().set_state(POSITION_ROW, 0, 3.0);
        storage.standard_mut().set_state(POSITION_ROW, 1, 99.0);

        let mimics = discover_mimic_joints(&desc).unwrap();
        apply_mimic(&mimics, &mut storage);

        assert_eq!(storage.standard().state(POSITION_ROW, 1), -3.0);
        // leader untouched
        assert_eq!(storage.standard().state(POSITION_ROW, 0), 3.0);
    }
}
