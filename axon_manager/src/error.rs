//! Manager error taxonomy.
//!
//! Every service surface has its own error enum so callers can match on
//! exactly the failures their operation can produce. RT-side failures
//! never panic; they surface here or in the log.

use axon_common::backend::{BackendError, ModeSwitchError};
use thiserror::Error;

/// Errors from [`crate::manager::ControllerManager::new`].
#[derive(Debug, Error)]
pub enum ManagerError {
    /// Backend instantiation or communication failed.
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Errors from loading a controller.
#[derive(Debug, Clone, Error)]
pub enum LoadError {
    /// No factory registered under this type name.
    #[error("unknown controller type '{0}'")]
    UnknownType(String),

    /// A controller with this instance name is already loaded.
    #[error("controller '{0}' is already loaded")]
    DuplicateName(String),

    /// The controller's `configure()` hook rejected the robot.
    #[error("controller '{name}' failed to configure: {reason}")]
    Configure {
        /// Instance name.
        name: String,
        /// Hook failure message.
        reason: String,
    },

    /// The published list generation could not be acquired for writing.
    #[error("timed out waiting for a writable controller list generation")]
    ListWriteTimeout,
}

/// Errors from unloading a controller.
#[derive(Debug, Clone, Error)]
pub enum UnloadError {
    /// No controller with this instance name is loaded.
    #[error("controller '{0}' is not loaded")]
    NotFound(String),

    /// Active controllers must be stopped before unloading.
    #[error("controller '{0}' is active; stop it before unloading")]
    Active(String),

    /// The published list generation could not be acquired for writing.
    #[error("timed out waiting for a writable controller list generation")]
    ListWriteTimeout,
}

/// Errors from a controller switch request.
#[derive(Debug, Clone, Error)]
pub enum SwitchError {
    /// A named controller is not loaded.
    #[error("controller '{0}' is not loaded")]
    UnknownController(String),

    /// A start candidate has not been configured yet.
    #[error("controller '{0}' is not configured and cannot be started")]
    NotConfigured(String),

    /// A start candidate is already active.
    #[error("controller '{0}' is already active")]
    AlreadyActive(String),

    /// A stop candidate is not active.
    #[error("controller '{0}' is not active")]
    AlreadyInactive(String),

    /// A claimed interface is not exported by the backend.
    #[error("controller '{controller}' claims unknown interface '{interface}'")]
    UnknownInterface {
        /// Claiming controller.
        controller: String,
        /// Full interface name that does not exist.
        interface: String,
    },

    /// A command interface is already held by a controller that is not
    /// part of the stop set.
    #[error(
        "command interface '{interface}' is held by '{held_by}' and \
         cannot be claimed by '{requested_by}'"
    )]
    ClaimConflict {
        /// Contested full interface name.
        interface: String,
        /// Current exclusive holder.
        held_by: String,
        /// Rejected claimant.
        requested_by: String,
    },

    /// The backend rejected the implied command mode transition.
    #[error("backend rejected the command mode switch: {0}")]
    ModeRejected(#[from] ModeSwitchError),

    /// Another switch is still being executed.
    #[error("a controller switch is already in progress")]
    SwitchInProgress,

    /// The real-time thread did not complete the switch in time.
    /// Carries what had already happened when the deadline passed.
    #[error("switch timed out ({} stopped, {} started)", stopped.len(), started.len())]
    Timeout {
        /// Controllers whose deactivation had completed.
        stopped: Vec<String>,
        /// Controllers whose activation had completed.
        started: Vec<String>,
    },

    /// One or more start hooks refused activation.
    #[error("controllers failed to start: {0:?}")]
    StartFailed(Vec<String>),
}
