//! Per-cycle state propagation for the loopback backend.
//!
//! Turns this cycle's commands into fresh states: position commands are
//! tracked (with an optional following offset), velocity commands are
//! Euler-integrated into position, everything else loops back verbatim.
//! Mimic coupling runs last so followers reflect the leader's
//! current-cycle state, then fake sensor commands (if enabled) drive
//! the sensor states.

use super::mimic::{MimicJoint, apply_mimic};
use super::mode::CommandModeGate;
use crate::storage::InterfaceStorage;
use axon_common::interface::{POSITION_ROW, VELOCITY_ROW};
use std::time::Duration;

/// State propagation engine of the loopback backend.
///
/// The previous-command memory used for velocity derivation is explicit
/// owned state here, carried across cycles.
#[derive(Debug)]
pub struct SimulationStepper {
    prev_position_commands: Vec<f64>,
    following_offset: f64,
    custom_offset_row: Option<usize>,
    command_propagation_disabled: bool,
    fake_sensor_commands: bool,
    primed: bool,
}

impl SimulationStepper {
    /// Create a stepper for the given storage.
    ///
    /// `custom_offset_row` designates the "other"-bank row that receives
    /// `position command + following offset` instead of its ordinary
    /// loopback; when set, the offset is no longer added to the position
    /// state itself.
    pub fn new(
        storage: &InterfaceStorage,
        following_offset: f64,
        custom_offset_row: Option<usize>,
        command_propagation_disabled: bool,
        fake_sensor_commands: bool,
    ) -> Self {
        Self {
            prev_position_commands: storage.standard().command_row(POSITION_ROW).to_vec(),
            following_offset,
            custom_offset_row,
            command_propagation_disabled,
            fake_sensor_commands,
            primed: false,
        }
    }

    /// Are fake sensor command interfaces enabled?
    pub fn fake_sensor_commands(&self) -> bool {
        self.fake_sensor_commands
    }

    /// Row of the custom offset interface, if bound.
    pub fn custom_offset_row(&self) -> Option<usize> {
        self.custom_offset_row
    }

    /// Propagate one cycle.
    ///
    /// `dt` is only consulted when positive and a prior cycle exists;
    /// otherwise every dt-dependent computation is skipped for this
    /// cycle only.
    pub fn step(
        &mut self,
        dt: Duration,
        storage: &mut InterfaceStorage,
        gate: &CommandModeGate,
        mimics: &[MimicJoint],
    ) {
        let dt_s = dt.as_secs_f64();
        let dt_valid = self.primed && dt_s > 0.0;
        self.primed = true;
        let joints = storage.joint_count();
        let propagate = !self.command_propagation_disabled;

        // position-controlled joints track their command
        if gate.position_running() && propagate {
            for col in 0..joints {
                let cmd = storage.standard().command(POSITION_ROW, col);
                if cmd.is_nan() {
                    continue;
                }
                let offset = if self.custom_offset_row.is_some() {
                    0.0
                } else {
                    self.following_offset
                };
                storage.standard_mut().set_state(POSITION_ROW, col, cmd + offset);
                if dt_valid {
                    let derived = (cmd - self.prev_position_commands[col]) / dt_s;
                    storage.standard_mut().set_state(VELOCITY_ROW, col, derived);
                }
            }
        }

        // velocity-controlled joints integrate into position
        if gate.velocity_running() && propagate {
            for col in 0..joints {
                let cmd = storage.standard().command(VELOCITY_ROW, col);
                if cmd.is_nan() {
                    continue;
                }
                if dt_valid {
                    let pos = storage.standard().state(POSITION_ROW, col);
                    storage
                        .standard_mut()
                        .set_state(POSITION_ROW, col, pos + cmd * dt_s);
                }
                storage.standard_mut().set_state(VELOCITY_ROW, col, cmd);
                // resync so "current commanded position" reflects where
                // the joint actually is
                let pos = storage.standard().state(POSITION_ROW, col);
                storage.standard_mut().set_command(POSITION_ROW, col, pos);
            }
        }

        // remember position commands for the next cycle's derivation
        for col in 0..joints {
            self.prev_position_commands[col] = storage.standard().command(POSITION_ROW, col);
        }

        // remaining standard rows loop back unconditionally
        for row in 2..storage.standard().interface_count() {
            for col in 0..joints {
                let cmd = storage.standard().command(row, col);
                if !cmd.is_nan() {
                    storage.standard_mut().set_state(row, col, cmd);
                }
            }
        }

        // other bank: loopback, with the offset override on the bound row
        for row in 0..storage.other().interface_count() {
            for col in 0..joints {
                if Some(row) == self.custom_offset_row {
                    let pos_cmd = storage.standard().command(POSITION_ROW, col);
                    if !pos_cmd.is_nan() {
                        storage
                            .other_mut()
                            .set_state(row, col, pos_cmd + self.following_offset);
                        continue;
                    }
                }
                let cmd = storage.other().command(row, col);
                if !cmd.is_nan() {
                    storage.other_mut().set_state(row, col, cmd);
                }
            }
        }

        // mimic couplings last, so followers see this cycle's leader state
        apply_mimic(mimics, storage);

        // sensors: only a fake command can drive them
        if self.fake_sensor_commands {
            for row in 0..storage.sensor().interface_count() {
                for col in 0..storage.sensor_count() {
                    let cmd = storage.sensor().command(row, col);
                    if !cmd.is_nan() {
                        storage.sensor_mut().set_state(row, col, cmd);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axon_common::description::ResourceDescription;

    const DT: Duration = Duration::from_millis(100);

    fn storage() -> InterfaceStorage {
        let desc: ResourceDescription = toml::from_str(
            r#"
[[joints]]
name = "j1"
command_interfaces = ["position", "velocity", "effort"]
state_interfaces = ["position", "velocity", "effort"]

[[sensors]]
name = "imu"
state_interfaces = ["gyro.z"]
"#,
        )
        .unwrap();
        let mut storage = InterfaceStorage::from_description(&desc).unwrap();
        storage.default_unset_states_to_zero();
        storage.zero_velocity_commands();
        storage
    }

    fn gate_in(mode: &str, storage: &mut InterfaceStorage) -> CommandModeGate {
        let mut gate = CommandModeGate::new();
        gate.prepare(&[format!("j1/{mode}")], &[], &["j1".to_string()])
            .unwrap();
        gate.perform(storage);
        gate
    }

    fn stepper(storage: &InterfaceStorage) -> SimulationStepper {
        SimulationStepper::new(storage, 0.0, None, false, false)
    }

    /// Prime past the first cycle so dt-dependent math is live.
    fn primed_stepper(storage: &mut InterfaceStorage, gate: &CommandModeGate) -> SimulationStepper {
        let mut s = stepper(storage);
        s.step(DT, storage, gate, &[]);
        s
    }

    #[test]
    fn velocity_command_integrates_into_position() {
        let mut storage = storage();
        storage.standard_mut().set_state(POSITION_ROW, 0, 5.0);
        let gate = gate_in("velocity", &mut storage);
        let mut stepper = primed_stepper(&mut storage, &gate);

        storage.standard_mut().set_command(VELOCITY_ROW, 0, 2.0);
        stepper.step(DT, &mut storage, &gate, &[]);

        assert!((storage.standard().state(POSITION_ROW, 0) - 5.2).abs() < 1e-12);
        assert_eq!(storage.standard().state(VELOCITY_ROW, 0), 2.0);
        // position command resynced to the integrated state
        assert!((storage.standard().command(POSITION_ROW, 0) - 5.2).abs() < 1e-12);
    }

    #[test]
    fn position_command_becomes_state_with_derived_velocity() {
        let mut storage = storage();
        let gate = gate_in("position", &mut storage);
        let mut stepper = primed_stepper(&mut storage, &gate);

        storage.standard_mut().set_command(POSITION_ROW, 0, 1.0);
        stepper.step(DT, &mut storage, &gate, &[]);

        assert_eq!(storage.standard().state(POSITION_ROW, 0), 1.0);
        // previous command was 0.0 (seeded by the mode gate)
        assert!((storage.standard().state(VELOCITY_ROW, 0) - 10.0).abs() < 1e-12);
    }

    #[test]
    fn following_offset_applies_to_position_state() {
        let mut storage = storage();
        let gate = gate_in("position", &mut storage);
        let mut stepper = SimulationStepper::new(&storage, 0.05, None, false, false);
        stepper.step(DT, &mut storage, &gate, &[]);

        storage.standard_mut().set_command(POSITION_ROW, 0, 1.0);
        stepper.step(DT, &mut storage, &gate, &[]);

        assert!((storage.standard().state(POSITION_ROW, 0) - 1.05).abs() < 1e-12);
    }

    #[test]
    fn first_cycle_skips_velocity_derivation() {
        let mut storage = storage();
        let gate = gate_in("position", &mut storage);
        let mut stepper = stepper(&storage);

        storage.standard_mut().set_command(POSITION_ROW, 0, 1.0);
        stepper.step(DT, &mut storage, &gate, &[]);

        assert_eq!(storage.standard().state(POSITION_ROW, 0), 1.0);
        // no prior timestamp: derived velocity untouched (zeroed default)
        assert_eq!(storage.standard().state(VELOCITY_ROW, 0), 0.0);
    }

    #[test]
    fn zero_dt_skips_integration() {
        let mut storage = storage();
        storage.standard_mut().set_state(POSITION_ROW, 0, 5.0);
        let gate = gate_in("velocity", &mut storage);
        let mut stepper = primed_stepper(&mut storage, &gate);

        storage.standard_mut().set_command(VELOCITY_ROW, 0, 2.0);
        stepper.step(Duration::ZERO, &mut storage, &gate, &[]);

        assert_eq!(storage.standard().state(POSITION_ROW, 0), 5.0);
        // the velocity state itself needs no dt
        assert_eq!(storage.standard().state(VELOCITY_ROW, 0), 2.0);
    }

    #[test]
    fn unset_commands_leave_states_alone() {
        let mut storage = storage();
        storage.standard_mut().set_state(POSITION_ROW, 0, 5.0);
        let gate = gate_in("position", &mut storage);
        let mut stepper = primed_stepper(&mut storage, &gate);

        // un-write the seeded position command
        storage.standard_mut().set_command(POSITION_ROW, 0, f64::NAN);
        stepper.step(DT, &mut storage, &gate, &[]);

        assert_eq!(storage.standard().state(POSITION_ROW, 0), 5.0);
    }

    #[test]
    fn effort_row_loops_back_unconditionally() {
        let mut storage = storage();
        let gate = CommandModeGate::new(); // no active mode
        let mut stepper = stepper(&storage);

        let effort_row = storage.standard().row("effort").unwrap();
        storage.standard_mut().set_command(effort_row, 0, 12.5);
        stepper.step(DT, &mut storage, &gate, &[]);

        assert_eq!(storage.standard().state(effort_row, 0), 12.5);
    }

    #[test]
    fn disabled_propagation_freezes_states() {
        let mut storage = storage();
        storage.standard_mut().set_state(POSITION_ROW, 0, 5.0);
        let gate = gate_in("velocity", &mut storage);
        let mut stepper = SimulationStepper::new(&storage, 0.0, None, true, false);
        stepper.step(DT, &mut storage, &gate, &[]);

        storage.standard_mut().set_command(VELOCITY_ROW, 0, 2.0);
        stepper.step(DT, &mut storage, &gate, &[]);

        assert_eq!(storage.standard().state(POSITION_ROW, 0), 5.0);
        assert_eq!(storage.standard().state(VELOCITY_ROW, 0), 0.0);
    }

    #[test]
    fn idle_gate_freezes_position_and_velocity() {
        let mut storage = storage();
        storage.standard_mut().set_state(POSITION_ROW, 0, 5.0);
        let gate = CommandModeGate::new();
        let mut stepper = primed_stepper(&mut storage, &gate);

        storage.standard_mut().set_command(POSITION_ROW, 0, 1.0);
        storage.standard_mut().set_command(VELOCITY_ROW, 0, 2.0);
        stepper.step(DT, &mut storage, &gate, &[]);

        assert_eq!(storage.standard().state(POSITION_ROW, 0), 5.0);
    }

    #[test]
    fn fake_sensor_commands_drive_sensor_states() {
        let mut storage = storage();
        let gate = CommandModeGate::new();
        let mut stepper = SimulationStepper::new(&storage, 0.0, None, false, true);

        storage.sensor_mut().set_command(0, 0, 0.7);
        stepper.step(DT, &mut storage, &gate, &[]);
        assert_eq!(storage.sensor().state(0, 0), 0.7);

        // without a fresh fake command the sensor holds its state
        storage.sensor_mut().set_command(0, 0, f64::NAN);
        stepper.step(DT, &mut storage, &gate, &[]);
        assert_eq!(storage.sensor().state(0, 0), 0.7);
    }

    #[test]
    fn sensors_hold_state_when_fake_commands_disabled() {
        let mut storage = storage();
        let gate = CommandModeGate::new();
        let mut stepper = stepper(&storage);

        storage.sensor_mut().set_command(0, 0, 0.7);
        stepper.step(DT, &mut storage, &gate, &[]);
        assert!(storage.sensor().state(0, 0).is_nan());
    }
}
