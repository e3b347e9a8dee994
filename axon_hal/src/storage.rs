//! Interface catalog and command/state value storage.
//!
//! Interface names declared in the resource description are partitioned
//! into the fixed standard vocabulary and a discovered "other"
//! vocabulary (first-seen order, deduplicated); sensors get their own
//! vocabulary. Each vocabulary is backed by a [`ValueBank`]: a command
//! matrix and a state matrix sized `[interfaces][entities]`, every cell
//! starting at the `NaN` unset sentinel.

use axon_common::backend::ConfigError;
use axon_common::description::{ComponentDescription, ResourceDescription};
use axon_common::interface::{Bank, InterfaceHandle, Slot, STANDARD_INTERFACES, VELOCITY_ROW};
use tracing::debug;

/// Command and state matrices for one interface vocabulary.
///
/// For the sensor vocabulary the command matrix holds the fake sensor
/// commands; sensors have no real command side.
#[derive(Debug, Clone)]
pub struct ValueBank {
    interfaces: Vec<String>,
    commands: Vec<Vec<f64>>,
    states: Vec<Vec<f64>>,
}

impl ValueBank {
    /// Allocate a bank with every cell set to the unset sentinel.
    pub fn new(interfaces: Vec<String>, entities: usize) -> Self {
        let commands = vec![vec![f64::NAN; entities]; interfaces.len()];
        let states = commands.clone();
        Self {
            interfaces,
            commands,
            states,
        }
    }

    /// Interface names of this bank, in row order.
    pub fn interfaces(&self) -> &[String] {
        &self.interfaces
    }

    /// Number of interface rows.
    pub fn interface_count(&self) -> usize {
        self.interfaces.len()
    }

    /// Number of entity columns.
    pub fn entity_count(&self) -> usize {
        self.commands.first().map_or(0, Vec::len)
    }

    /// Row of the given interface name, if it belongs to this bank.
    pub fn row(&self, interface: &str) -> Option<usize> {
        self.interfaces.iter().position(|i| i == interface)
    }

    /// Command value of one cell.
    pub fn command(&self, row: usize, col: usize) -> f64 {
        self.commands[row][col]
    }

    /// State value of one cell.
    pub fn state(&self, row: usize, col: usize) -> f64 {
        self.states[row][col]
    }

    /// Write a command value.
    pub fn set_command(&mut self, row: usize, col: usize, value: f64) {
        self.commands[row][col] = value;
    }

    /// Write a state value.
    pub fn set_state(&mut self, row: usize, col: usize, value: f64) {
        self.states[row][col] = value;
    }

    /// Whole command row, e.g. to seed per-cycle memory.
    pub fn command_row(&self, row: usize) -> &[f64] {
        &self.commands[row]
    }

    /// Overwrite state cells from `initial_<interface>` parameters.
    ///
    /// Cells without a declared initial value keep the unset sentinel.
    fn apply_initial_values(
        &mut self,
        components: &[ComponentDescription],
    ) -> Result<(), ConfigError> {
        for (col, component) in components.iter().enumerate() {
            for (row, interface) in self.interfaces.iter().enumerate() {
                let key = format!("initial_{interface}");
                if let Some(raw) = component.parameters.get(&key) {
                    let value: f64 =
                        raw.parse()
                            .map_err(|_| ConfigError::MalformedInitialValue {
                                entity: component.name.clone(),
                                interface: interface.clone(),
                                value: raw.clone(),
                            })?;
                    self.states[row][col] = value;
                }
            }
        }
        Ok(())
    }
}

/// Full interface storage of one backend.
///
/// Owns three banks (standard joints, other joints, sensors) plus the
/// description they were built from, which fixes entity columns and the
/// export order.
#[derive(Debug, Clone)]
pub struct InterfaceStorage {
    description: ResourceDescription,
    standard: ValueBank,
    other: ValueBank,
    sensor: ValueBank,
}

impl InterfaceStorage {
    /// Classify interfaces and allocate storage from a description.
    ///
    /// # Errors
    /// `ConfigError::MalformedInitialValue` if a declared initial value
    /// is not numeric.
    pub fn from_description(description: &ResourceDescription) -> Result<Self, ConfigError> {
        let standard_names: Vec<String> =
            STANDARD_INTERFACES.iter().map(|s| s.to_string()).collect();

        // Discover non-standard joint interfaces, first-seen order.
        let mut other_names: Vec<String> = Vec::new();
        for joint in &description.joints {
            for interface in joint
                .command_interfaces
                .iter()
                .chain(joint.state_interfaces.iter())
            {
                if !standard_names.iter().any(|s| s == interface)
                    && !other_names.iter().any(|o| o == interface)
                {
                    other_names.push(interface.clone());
                }
            }
        }

        let mut sensor_names: Vec<String> = Vec::new();
        for sensor in &description.sensors {
            for interface in &sensor.state_interfaces {
                if !sensor_names.iter().any(|s| s == interface) {
                    sensor_names.push(interface.clone());
                }
            }
        }

        debug!(
            other = other_names.len(),
            sensor = sensor_names.len(),
            "classified non-standard interfaces"
        );

        let joints = description.joints.len();
        let mut standard = ValueBank::new(standard_names, joints);
        let mut other = ValueBank::new(other_names, joints);
        let mut sensor = ValueBank::new(sensor_names, description.sensors.len());

        standard.apply_initial_values(&description.joints)?;
        other.apply_initial_values(&description.joints)?;
        sensor.apply_initial_values(&description.sensors)?;

        Ok(Self {
            description: description.clone(),
            standard,
            other,
            sensor,
        })
    }

    /// The description this storage was built from.
    pub fn description(&self) -> &ResourceDescription {
        &self.description
    }

    /// Number of joint columns.
    pub fn joint_count(&self) -> usize {
        self.description.joints.len()
    }

    /// Number of sensor columns.
    pub fn sensor_count(&self) -> usize {
        self.description.sensors.len()
    }

    /// Standard joint bank.
    pub fn standard(&self) -> &ValueBank {
        &self.standard
    }

    /// Standard joint bank, mutable.
    pub fn standard_mut(&mut self) -> &mut ValueBank {
        &mut self.standard
    }

    /// Other (non-standard) joint bank.
    pub fn other(&self) -> &ValueBank {
        &self.other
    }

    /// Other joint bank, mutable.
    pub fn other_mut(&mut self) -> &mut ValueBank {
        &mut self.other
    }

    /// Sensor bank.
    pub fn sensor(&self) -> &ValueBank {
        &self.sensor
    }

    /// Sensor bank, mutable.
    pub fn sensor_mut(&mut self) -> &mut ValueBank {
        &mut self.sensor
    }

    /// Resolve `(entity, interface)` to its storage slot.
    ///
    /// Returns `None` when the entity is unknown or the interface was
    /// never classified for its kind of entity.
    pub fn slot(&self, entity: &str, interface: &str) -> Option<Slot> {
        if let Some(col) = self.description.joint_index(entity) {
            if let Some(row) = self.standard.row(interface) {
                return Some(Slot {
                    bank: Bank::Standard,
                    row,
                    col,
                });
            }
            return self.other.row(interface).map(|row| Slot {
                bank: Bank::Other,
                row,
                col,
            });
        }
        if let Some(col) = self.description.sensor_index(entity) {
            return self.sensor.row(interface).map(|row| Slot {
                bank: Bank::Sensor,
                row,
                col,
            });
        }
        None
    }

    /// State value behind a slot.
    pub fn state(&self, slot: Slot) -> f64 {
        self.bank(slot.bank).state(slot.row, slot.col)
    }

    /// Command value behind a slot.
    pub fn command(&self, slot: Slot) -> f64 {
        self.bank(slot.bank).command(slot.row, slot.col)
    }

    /// Write a command value behind a slot.
    pub fn set_command(&mut self, slot: Slot, value: f64) {
        self.bank_mut(slot.bank).set_command(slot.row, slot.col, value)
    }

    /// Write a state value behind a slot.
    pub fn set_state(&mut self, slot: Slot, value: f64) {
        self.bank_mut(slot.bank).set_state(slot.row, slot.col, value)
    }

    fn bank(&self, bank: Bank) -> &ValueBank {
        match bank {
            Bank::Standard => &self.standard,
            Bank::Other => &self.other,
            Bank::Sensor => &self.sensor,
        }
    }

    fn bank_mut(&mut self, bank: Bank) -> &mut ValueBank {
        match bank {
            Bank::Standard => &mut self.standard,
            Bank::Other => &mut self.other,
            Bank::Sensor => &mut self.sensor,
        }
    }

    /// Export every declared state interface, joints first then sensors,
    /// each in declaration order.
    ///
    /// # Panics
    /// Panics if a declared interface resolves to no slot. Classification
    /// happens at configure time, so this cannot occur short of a bug.
    pub fn export_state_handles(&self) -> Vec<InterfaceHandle> {
        let mut handles = Vec::new();
        for joint in &self.description.joints {
            for interface in &joint.state_interfaces {
                handles.push(self.handle_for(&joint.name, interface));
            }
        }
        for sensor in &self.description.sensors {
            for interface in &sensor.state_interfaces {
                handles.push(self.handle_for(&sensor.name, interface));
            }
        }
        handles
    }

    /// Export every declared command interface in declaration order.
    ///
    /// With `fake_sensor_commands` the sensors' state interfaces are
    /// exported as writable fake commands as well.
    ///
    /// # Panics
    /// Same invariant as [`Self::export_state_handles`].
    pub fn export_command_handles(&self, fake_sensor_commands: bool) -> Vec<InterfaceHandle> {
        let mut handles = Vec::new();
        for joint in &self.description.joints {
            for interface in &joint.command_interfaces {
                handles.push(self.handle_for(&joint.name, interface));
            }
        }
        if fake_sensor_commands {
            for sensor in &self.description.sensors {
                for interface in &sensor.state_interfaces {
                    handles.push(self.handle_for(&sensor.name, interface));
                }
            }
        }
        handles
    }

    fn handle_for(&self, entity: &str, interface: &str) -> InterfaceHandle {
        let Some(slot) = self.slot(entity, interface) else {
            panic!("interface '{entity}/{interface}' was not classified at configure time");
        };
        InterfaceHandle {
            entity: entity.to_string(),
            interface: interface.to_string(),
            slot,
        }
    }

    /// Zero the velocity command row (loopback joints start at rest).
    pub fn zero_velocity_commands(&mut self) {
        for col in 0..self.joint_count() {
            self.standard.set_command(VELOCITY_ROW, col, 0.0);
        }
    }

    /// Default every still-unset standard joint state to zero.
    pub fn default_unset_states_to_zero(&mut self) {
        for row in 0..self.standard.interface_count() {
            for col in 0..self.joint_count() {
                if self.standard.state(row, col).is_nan() {
                    self.standard.set_state(row, col, 0.0);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axon_common::interface::POSITION_ROW;

    fn description() -> ResourceDescription {
        toml::from_str(
            r#"
[[joints]]
name = "joint1"
command_interfaces = ["position", "velocity", "stiffness"]
state_interfaces = ["position", "velocity", "stiffness"]

[joints.parameters]
initial_position = "3.45"

[[joints]]
name = "joint2"
command_interfaces = ["position"]
state_interfaces = ["position"]

[[sensors]]
name = "tcp_force"
state_interfaces = ["fx", "fy"]
"#,
        )
        .expect("description should parse")
    }

    #[test]
    fn classifies_standard_and_other_interfaces() {
        let storage = InterfaceStorage::from_description(&description()).unwrap();
        assert_eq!(storage.standard().interface_count(), 4);
        assert_eq!(storage.other().interfaces(), ["stiffness"]);
        assert_eq!(storage.sensor().interfaces(), ["fx", "fy"]);
    }

    #[test]
    fn cells_default_to_the_unset_sentinel() {
        let storage = InterfaceStorage::from_description(&description()).unwrap();
        // joint2 declared no initial position
        assert!(storage.standard().state(POSITION_ROW, 1).is_nan());
        assert!(storage.standard().command(POSITION_ROW, 0).is_nan());
        assert!(storage.other().state(0, 0).is_nan());
    }

    #[test]
    fn initial_values_overwrite_states() {
        let storage = InterfaceStorage::from_description(&description()).unwrap();
        assert_eq!(storage.standard().state(POSITION_ROW, 0), 3.45);
    }

    #[test]
    fn malformed_initial_value_is_a_config_error() {
        let mut desc = description();
        desc.joints[0]
            .parameters
            .insert("initial_velocity".into(), "fast".into());
        let err = InterfaceStorage::from_description(&desc).unwrap_err();
        assert!(matches!(err, ConfigError::MalformedInitialValue { .. }));
    }

    #[test]
    fn undeclared_interfaces_have_no_slot() {
        let storage = InterfaceStorage::from_description(&description()).unwrap();
        assert!(storage.slot("joint1", "temperature").is_none());
        assert!(storage.slot("ghost", "position").is_none());
        // sensors only own sensor-bank rows
        assert!(storage.slot("tcp_force", "position").is_none());
    }

    #[test]
    fn slot_addresses_the_right_bank() {
        let storage = InterfaceStorage::from_description(&description()).unwrap();
        let std_slot = storage.slot("joint2", "position").unwrap();
        assert_eq!(std_slot.bank, Bank::Standard);
        assert_eq!((std_slot.row, std_slot.col), (POSITION_ROW, 1));

        let other_slot = storage.slot("joint1", "stiffness").unwrap();
        assert_eq!(other_slot.bank, Bank::Other);
        assert_eq!((other_slot.row, other_slot.col), (0, 0));

        let sensor_slot = storage.slot("tcp_force", "fy").unwrap();
        assert_eq!(sensor_slot.bank, Bank::Sensor);
        assert_eq!((sensor_slot.row, sensor_slot.col), (1, 0));
    }

    #[test]
    fn export_is_idempotent() {
        let storage = InterfaceStorage::from_description(&description()).unwrap();
        let first = storage.export_state_handles();
        let second = storage.export_state_handles();
        assert_eq!(first, second);
        // every declared state interface, exactly once
        assert_eq!(first.len(), 3 + 1 + 2);
    }

    #[test]
    fn fake_sensor_commands_add_sensor_handles_to_export() {
        let storage = InterfaceStorage::from_description(&description()).unwrap();
        let without = storage.export_command_handles(false);
        let with = storage.export_command_handles(true);
        assert_eq!(without.len(), 4);
        assert_eq!(with.len(), 6);
        assert!(with.iter().any(|h| h.full_name() == "tcp_force/fx"));
    }

    #[test]
    fn command_writes_round_trip_through_slots() {
        let mut storage = InterfaceStorage::from_description(&description()).unwrap();
        let slot = storage.slot("joint1", "stiffness").unwrap();
        storage.set_command(slot, 7.5);
        assert_eq!(storage.command(slot), 7.5);
        assert!(storage.state(slot).is_nan());
    }
}
