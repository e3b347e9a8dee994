//! Hardware backend trait and error types.
//!
//! This module defines:
//! - `Backend` trait - Interface for pluggable hardware backends
//! - `InterfaceAccess` trait - Per-cycle value access used by controllers
//! - `ConfigError` / `ModeSwitchError` / `BackendError` - Error types
//! - `BackendFactory` type alias - Factory function type

use crate::description::ResourceDescription;
use crate::interface::{InterfaceHandle, Slot};
use std::time::Duration;
use thiserror::Error;

/// Errors raised while interpreting a resource description.
///
/// All of these are fatal at configuration time: the backend never
/// reaches an operable state.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// A declared initial value did not parse as a number.
    #[error("'{entity}': initial value for '{interface}' is not numeric: '{value}'")]
    MalformedInitialValue {
        /// Entity carrying the parameter.
        entity: String,
        /// Interface the initial value was declared for.
        interface: String,
        /// Offending raw value.
        value: String,
    },

    /// A backend or component parameter did not parse.
    #[error("'{entity}': parameter '{key}' is not valid: '{value}'")]
    MalformedParameter {
        /// Component (or backend) owning the parameter.
        entity: String,
        /// Parameter key.
        key: String,
        /// Offending raw value.
        value: String,
    },

    /// A mimic declaration references a joint that does not exist.
    #[error("joint '{joint}' mimics unknown joint '{leader}'")]
    DanglingMimic {
        /// Follower joint.
        joint: String,
        /// Referenced leader name.
        leader: String,
    },
}

/// Errors from command mode switch validation.
///
/// Raised by `prepare_command_mode_switch` before any mutation; the
/// previously active mode is retained.
#[derive(Debug, Clone, Error)]
pub enum ModeSwitchError {
    /// The start set mixes more than one control mode.
    #[error("mixed control modes in start request: {0:?}")]
    MixedModes(Vec<String>),

    /// Only part of a coupled joint group was named.
    #[error("command mode switch must cover the whole joint group ({named} of {group} joints named)")]
    PartialGroup {
        /// Joints named in the request.
        named: usize,
        /// Size of the coupled group.
        group: usize,
    },
}

/// Error types for backend operations.
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    /// No backend with the requested type name is registered.
    #[error("backend type not found: {0}")]
    TypeNotFound(String),

    /// Configuration failed.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Hardware communication failed.
    #[error("hardware communication error: {0}")]
    Communication(String),
}

/// Per-cycle value access exposed to controllers.
///
/// Controllers read state values and write command values exclusively
/// through the [`Slot`]s of the handles they were granted at start. The
/// unset sentinel is `f64::NAN`; check it with `is_nan()`, never `==`.
pub trait InterfaceAccess {
    /// Current state value of a cell.
    fn state(&self, slot: Slot) -> f64;

    /// Current command value of a cell.
    fn command(&self, slot: Slot) -> f64;

    /// Write a command value into a cell.
    fn set_command(&mut self, slot: Slot, value: f64);
}

/// Factory function type for creating backend instances.
pub type BackendFactory = fn() -> Box<dyn Backend>;

/// Trait defining the interface for hardware backends.
///
/// A backend owns the command/state interface storage for one robot and
/// turns commands into fresh states each cycle, either through a real
/// transport or through the loopback simulation.
///
/// # Lifecycle
///
/// 1. `configure()` - Called once with the resource description
/// 2. `export_*_interfaces()` - Handle export, idempotent after configure
/// 3. `read()` / `write()` - Called every cycle from the RT loop
/// 4. `prepare_/perform_command_mode_switch()` - During controller switches
pub trait Backend: InterfaceAccess + Send {
    /// Unique backend type identifier (e.g. "loopback").
    fn name(&self) -> &'static str;

    /// Configure storage and per-cycle state from the description.
    ///
    /// # Errors
    /// Returns `ConfigError` for malformed initial values, dangling
    /// mimic references or unparseable backend parameters.
    fn configure(&mut self, resources: &ResourceDescription) -> Result<(), ConfigError>;

    /// Export all declared state interfaces in declaration order.
    ///
    /// Calling twice without reconfiguration yields handles pointing at
    /// identical storage cells.
    fn export_state_interfaces(&self) -> Vec<InterfaceHandle>;

    /// Export all declared command interfaces in declaration order.
    fn export_command_interfaces(&self) -> Vec<InterfaceHandle>;

    /// Validate a command mode switch without mutating any active mode.
    ///
    /// `start` and `stop` are full `entity/interface` names of the
    /// command interfaces changing hands.
    ///
    /// # Errors
    /// `ModeSwitchError` if the request mixes modes or names only part
    /// of the joint group.
    fn prepare_command_mode_switch(
        &mut self,
        start: &[String],
        stop: &[String],
    ) -> Result<(), ModeSwitchError>;

    /// Apply the previously validated mode switch.
    fn perform_command_mode_switch(
        &mut self,
        start: &[String],
        stop: &[String],
    ) -> Result<(), ModeSwitchError>;

    /// Read hardware state (or run one simulation step).
    ///
    /// `dt` is the elapsed time since the previous cycle. Called from
    /// the RT loop; must be deterministic (no allocation, no blocking).
    ///
    /// # Errors
    /// `BackendError::Communication` on transport failure.
    fn read(&mut self, dt: Duration) -> Result<(), BackendError>;

    /// Write commands to hardware.
    ///
    /// A loopback backend has nothing to do here; commands already live
    /// in the shared storage.
    fn write(&mut self, dt: Duration) -> Result<(), BackendError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display_names_the_joint() {
        let err = ConfigError::MalformedInitialValue {
            entity: "joint1".into(),
            interface: "position".into(),
            value: "abc".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("joint1"));
        assert!(msg.contains("abc"));
    }

    #[test]
    fn mode_switch_error_display() {
        let err = ModeSwitchError::PartialGroup { named: 1, group: 3 };
        assert!(err.to_string().contains("1 of 3"));
    }

    #[test]
    fn backend_error_wraps_config_error() {
        let err: BackendError = ConfigError::DanglingMimic {
            joint: "j2".into(),
            leader: "ghost".into(),
        }
        .into();
        assert!(err.to_string().contains("ghost"));
    }
}
