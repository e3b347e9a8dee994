//! Controller trait and lifecycle states.
//!
//! Controllers are independently developed control algorithms that claim
//! command interfaces on a backend and are driven from the RT loop. The
//! framework instantiates them through a factory registry keyed by type
//! name; no runtime reflection.

use crate::backend::InterfaceAccess;
use crate::description::ResourceDescription;
use crate::interface::InterfaceHandle;
use std::time::Duration;
use thiserror::Error;

/// Errors from controller lifecycle hooks.
#[derive(Debug, Clone, Error)]
pub enum ControllerError {
    /// `configure()` rejected the resource description.
    #[error("controller configuration rejected: {0}")]
    Configure(String),

    /// `on_start()` refused to activate.
    #[error("controller start rejected: {0}")]
    StartRejected(String),

    /// `on_stop()` failed.
    #[error("controller stop failed: {0}")]
    StopFailed(String),
}

/// Lifecycle state of a loaded controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ControllerState {
    /// Loaded but not yet configured.
    Unconfigured = 0,
    /// Configured, not running.
    Inactive = 1,
    /// Running: updated every cycle, holds its command claims.
    Active = 2,
}

impl ControllerState {
    /// Decode from the atomic representation.
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => ControllerState::Unconfigured,
            1 => ControllerState::Inactive,
            _ => ControllerState::Active,
        }
    }
}

/// Identity of a loaded controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerInfo {
    /// Instance name, unique within the manager.
    pub name: String,
    /// Registered type name the instance was created from.
    pub type_name: String,
}

/// Factory function type for creating controller instances.
pub type ControllerFactory = fn() -> Box<dyn Controller>;

/// Trait implemented by all controllers.
///
/// # Lifecycle
///
/// 1. `configure()` - Once after load, with the resource description
/// 2. `on_start()` - On activation, with the granted handles
/// 3. `update()` - Every cycle while active, RT constraints apply
/// 4. `on_stop()` - On deactivation; claims are released afterwards
pub trait Controller: Send {
    /// Configure from the resource description.
    ///
    /// # Errors
    /// `ControllerError::Configure` if the robot lacks what the
    /// controller needs.
    fn configure(&mut self, resources: &ResourceDescription) -> Result<(), ControllerError> {
        let _ = resources;
        Ok(())
    }

    /// Full names of the command interfaces this controller must claim
    /// exclusively while active.
    fn command_interface_claims(&self) -> Vec<String>;

    /// Full names of the state interfaces this controller reads.
    fn state_interface_claims(&self) -> Vec<String> {
        Vec::new()
    }

    /// Activation hook; the granted handles resolve the claims declared
    /// above, in the same order.
    ///
    /// # Errors
    /// `ControllerError::StartRejected` aborts activation; the claims
    /// are released again.
    fn on_start(
        &mut self,
        commands: Vec<InterfaceHandle>,
        states: Vec<InterfaceHandle>,
    ) -> Result<(), ControllerError>;

    /// Deactivation hook.
    ///
    /// # Errors
    /// `ControllerError::StopFailed` is logged; the controller is
    /// deactivated regardless.
    fn on_stop(&mut self) -> Result<(), ControllerError> {
        Ok(())
    }

    /// One control cycle. Called from the RT loop while active; must be
    /// deterministic and only touch the granted slots.
    fn update(&mut self, io: &mut dyn InterfaceAccess, dt: Duration);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_round_trips_through_u8() {
        for state in [
            ControllerState::Unconfigured,
            ControllerState::Inactive,
            ControllerState::Active,
        ] {
            assert_eq!(ControllerState::from_u8(state as u8), state);
        }
    }

    #[test]
    fn controller_error_display() {
        let err = ControllerError::StartRejected("missing handle".into());
        assert!(err.to_string().contains("missing handle"));
    }
}
