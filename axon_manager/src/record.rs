//! Shared controller cells.
//!
//! Each loaded controller lives in exactly one [`ControllerCell`], shared
//! by reference between both list generations. Lifecycle state is an
//! atomic so the RT thread and service threads observe transitions
//! without locking; the controller object itself sits behind a mutex
//! that only the RT update loop and the lifecycle hooks contend on.

use axon_common::controller::{Controller, ControllerInfo, ControllerState};
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

/// A loaded controller instance with its identity and lifecycle state.
pub struct ControllerCell {
    info: ControllerInfo,
    state: AtomicU8,
    controller: Mutex<Box<dyn Controller>>,
}

/// Handle to a cell, cloned into every list generation that contains it.
pub type ControllerRecord = Arc<ControllerCell>;

impl ControllerCell {
    /// Wrap a freshly created controller. Starts `Unconfigured`.
    pub fn new(info: ControllerInfo, controller: Box<dyn Controller>) -> ControllerRecord {
        Arc::new(Self {
            info,
            state: AtomicU8::new(ControllerState::Unconfigured as u8),
            controller: Mutex::new(controller),
        })
    }

    /// Identity of this instance.
    pub fn info(&self) -> &ControllerInfo {
        &self.info
    }

    /// Instance name.
    pub fn name(&self) -> &str {
        &self.info.name
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ControllerState {
        ControllerState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Publish a lifecycle transition.
    pub fn set_state(&self, state: ControllerState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Is this controller currently updated by the RT loop?
    pub fn is_active(&self) -> bool {
        self.state() == ControllerState::Active
    }

    /// Lock the controller object for a hook or an update call.
    pub fn lock(&self) -> MutexGuard<'_, Box<dyn Controller>> {
        self.controller.lock()
    }
}

impl std::fmt::Debug for ControllerCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControllerCell")
            .field("info", &self.info)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
