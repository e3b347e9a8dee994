//! Command mode gate.
//!
//! Validates and executes control mode switches across the joint group.
//! All joints switch together and to the same mode, or the request is
//! rejected before anything changes: a two-phase prepare/perform
//! protocol.

use crate::storage::InterfaceStorage;
use axon_common::backend::ModeSwitchError;
use axon_common::interface::{HW_IF_POSITION, HW_IF_VELOCITY, POSITION_ROW, VELOCITY_ROW, full_name};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StoppingMode {
    Position,
    Velocity,
}

/// Gate deciding which control mode propagates commands each cycle.
#[derive(Debug, Default)]
pub struct CommandModeGate {
    pending_start: Vec<&'static str>,
    pending_stop: Vec<StoppingMode>,
    position_running: bool,
    velocity_running: bool,
}

impl CommandModeGate {
    /// Create a gate with no active mode.
    pub fn new() -> Self {
        Self::default()
    }

    /// Is position control currently propagating commands?
    pub fn position_running(&self) -> bool {
        self.position_running
    }

    /// Is velocity control currently propagating commands?
    pub fn velocity_running(&self) -> bool {
        self.velocity_running
    }

    /// Validate a mode switch request. Mutates nothing on error; the
    /// active mode is untouched either way until [`Self::perform`].
    ///
    /// `start` and `stop` hold full `joint/interface` names; interfaces
    /// other than position and velocity carry no mode and are ignored.
    ///
    /// # Errors
    /// `PartialGroup` if only a subset of the joint group is named,
    /// `MixedModes` if the named joints disagree on the mode.
    pub fn prepare(
        &mut self,
        start: &[String],
        stop: &[String],
        joint_names: &[String],
    ) -> Result<(), ModeSwitchError> {
        let mut start_modes: Vec<&'static str> = Vec::new();
        for key in start {
            for joint in joint_names {
                if *key == full_name(joint, HW_IF_POSITION) {
                    start_modes.push(HW_IF_POSITION);
                }
                if *key == full_name(joint, HW_IF_VELOCITY) {
                    start_modes.push(HW_IF_VELOCITY);
                }
            }
        }
        // the whole group switches at once, to one mode
        if !start_modes.is_empty() && start_modes.len() != joint_names.len() {
            return Err(ModeSwitchError::PartialGroup {
                named: start_modes.len(),
                group: joint_names.len(),
            });
        }
        if !start_modes.is_empty() && !start_modes.iter().all(|m| *m == start_modes[0]) {
            return Err(ModeSwitchError::MixedModes(
                start_modes.iter().map(|m| m.to_string()).collect(),
            ));
        }

        let mut stop_modes: Vec<StoppingMode> = Vec::new();
        for key in stop {
            for joint in joint_names {
                if *key == full_name(joint, HW_IF_POSITION) {
                    stop_modes.push(StoppingMode::Position);
                }
                if *key == full_name(joint, HW_IF_VELOCITY) {
                    stop_modes.push(StoppingMode::Velocity);
                }
            }
        }
        if !stop_modes.is_empty() && stop_modes.len() != joint_names.len() {
            return Err(ModeSwitchError::PartialGroup {
                named: stop_modes.len(),
                group: joint_names.len(),
            });
        }
        if !stop_modes.is_empty() && !stop_modes.iter().all(|m| *m == stop_modes[0]) {
            return Err(ModeSwitchError::MixedModes(
                stop_modes.iter().map(|m| format!("{m:?}")).collect(),
            ));
        }

        self.pending_start = start_modes;
        self.pending_stop = stop_modes;
        Ok(())
    }

    /// Apply the previously validated switch.
    ///
    /// Deactivates all modes, then activates at most one: position-hold
    /// seeds the position command from the current state, velocity-zero
    /// seeds the velocity command with 0.0 — either way the transition
    /// is continuous, without a jump. If neither mode was requested the
    /// gate goes idle and command propagation stops.
    pub fn perform(&mut self, storage: &mut InterfaceStorage) {
        self.position_running = false;
        self.velocity_running = false;

        if self.pending_start.contains(&HW_IF_POSITION) {
            for col in 0..storage.joint_count() {
                let state = storage.standard().state(POSITION_ROW, col);
                storage.standard_mut().set_command(POSITION_ROW, col, state);
            }
            self.position_running = true;
            debug!("position control mode active, commands seeded from state");
        } else if self.pending_start.contains(&HW_IF_VELOCITY) {
            for col in 0..storage.joint_count() {
                storage.standard_mut().set_command(VELOCITY_ROW, col, 0.0);
            }
            self.velocity_running = true;
            debug!("velocity control mode active, commands seeded to zero");
        } else {
            debug!("no control mode active, command propagation idle");
        }
    }
}
