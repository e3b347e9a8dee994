//! Loopback backend implementation of the `Backend` trait.

use super::mimic::{MimicJoint, discover_mimic_joints};
use super::mode::CommandModeGate;
use super::stepper::SimulationStepper;
use crate::storage::InterfaceStorage;
use axon_common::backend::{Backend, BackendError, ConfigError, InterfaceAccess, ModeSwitchError};
use axon_common::description::ResourceDescription;
use axon_common::interface::{InterfaceHandle, Slot};
use std::time::Duration;
use tracing::{info, warn};

/// Factory for the backend registry.
pub fn loopback_backend() -> Box<dyn Backend> {
    Box::new(LoopbackSystem::new())
}

/// Simulation backend: commands written this cycle become the states
/// read next cycle, without any physical transport.
///
/// Recognized backend parameters: `disable_commands`,
/// `fake_sensor_commands`, `position_state_following_offset`,
/// `custom_interface_with_following_offset`; per-joint `mimic`,
/// `multiplier` and `initial_<interface>`.
pub struct LoopbackSystem {
    storage: Option<InterfaceStorage>,
    stepper: Option<SimulationStepper>,
    gate: CommandModeGate,
    mimic_joints: Vec<MimicJoint>,
    joint_names: Vec<String>,
}

impl LoopbackSystem {
    /// Create an unconfigured loopback backend.
    pub fn new() -> Self {
        Self {
            storage: None,
            stepper: None,
            gate: CommandModeGate::new(),
            mimic_joints: Vec::new(),
            joint_names: Vec::new(),
        }
    }

    fn storage(&self) -> &InterfaceStorage {
        self.storage.as_ref().expect("loopback backend is not configured")
    }

    fn storage_mut(&mut self) -> &mut InterfaceStorage {
        self.storage.as_mut().expect("loopback backend is not configured")
    }

    fn stepper(&self) -> &SimulationStepper {
        self.stepper.as_ref().expect("loopback backend is not configured")
    }
}

impl Default for LoopbackSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl InterfaceAccess for LoopbackSystem {
    fn state(&self, slot: Slot) -> f64 {
        self.storage().state(slot)
    }

    fn command(&self, slot: Slot) -> f64 {
        self.storage().command(slot)
    }

    fn set_command(&mut self, slot: Slot, value: f64) {
        self.storage_mut().set_command(slot, value)
    }
}

impl Backend for LoopbackSystem {
    fn name(&self) -> &'static str {
        "loopback"
    }

    fn configure(&mut self, resources: &ResourceDescription) -> Result<(), ConfigError> {
        let mut storage = InterfaceStorage::from_description(resources)?;
        storage.default_unset_states_to_zero();
        storage.zero_velocity_commands();

        let fake_sensor_commands = resources.flag("fake_sensor_commands");
        // this way we simulate a disconnected driver
        let command_propagation_disabled = resources.flag("disable_commands");

        let mut following_offset = 0.0;
        let mut custom_offset_row = None;
        if let Some(raw) = resources.parameters.get("position_state_following_offset") {
            following_offset =
                raw.parse()
                    .map_err(|_| ConfigError::MalformedParameter {
                        entity: self.name().to_string(),
                        key: "position_state_following_offset".to_string(),
                        value: raw.clone(),
                    })?;
            if let Some(custom) = resources.parameters.get("custom_interface_with_following_offset")
            {
                match storage.other().row(custom) {
                    Some(row) => {
                        info!(
                            interface = %custom,
                            row,
                            "custom interface with following offset bound"
                        );
                        custom_offset_row = Some(row);
                    }
                    None => {
                        warn!(
                            interface = %custom,
                            "custom interface with following offset does not exist, \
                             offset will not be applied"
                        );
                    }
                }
            }
        }

        self.mimic_joints = discover_mimic_joints(resources)?;
        self.stepper = Some(SimulationStepper::new(
            &storage,
            following_offset,
            custom_offset_row,
            command_propagation_disabled,
            fake_sensor_commands,
        ));
        self.joint_names = resources.joint_names();
        info!(
            joints = resources.joints.len(),
            sensors = resources.sensors.len(),
            mimics = self.mimic_joints.len(),
            "loopback backend configured"
        );
        self.storage = Some(storage);
        Ok(())
    }

    fn export_state_interfaces(&self) -> Vec<InterfaceHandle> {
        self.storage().export_state_handles()
    }

    fn export_command_interfaces(&self) -> Vec<InterfaceHandle> {
        let fake = self.stepper().fake_sensor_commands();
        self.storage().export_command_handles(fake)
    }

    fn prepare_command_mode_switch(
        &mut self,
        start: &[String],
        stop: &[String],
    ) -> Result<(), ModeSwitchError> {
        self.gate.prepare(start, stop, &self.joint_names)
    }

    fn perform_command_mode_switch(
        &mut self,
        _start: &[String],
        _stop: &[String],
    ) -> Result<(), ModeSwitchError> {
        let mut storage = self.storage.take().expect("loopback backend is not configured");
        self.gate.perform(&mut storage);
        self.storage = Some(storage);
        Ok(())
    }

    fn read(&mut self, dt: Duration) -> Result<(), BackendError> {
        let storage = self.storage.as_mut().expect("loopback backend is not configured");
        let stepper = self.stepper.as_mut().expect("loopback backend is not configured");
        stepper.step(dt, storage, &self.gate, &self.mimic_joints);
        Ok(())
    }

    fn write(&mut self, _dt: Duration) -> Result<(), BackendError> {
        // commands already live in the shared storage
        Ok(())
    }
}
