//! Switch request staging between service threads and the RT loop.
//!
//! A validated switch request is staged here by the service side, then
//! executed by the RT thread at its next cycle boundary: stop hooks and
//! the backend mode transition first, start hooks in the same cycle
//! (`start_asap`) or the one after. The service side waits on the phase
//! flag with bounded sleeps and reclaims the request when it is done,
//! or when the deadline passes.

use crate::record::ControllerRecord;
use axon_common::interface::InterfaceHandle;
use parking_lot::{Mutex, MutexGuard};
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::{Duration, Instant};

/// Interval between polls while waiting for the RT thread to execute a
/// staged switch.
const SWITCH_POLL_INTERVAL: Duration = Duration::from_micros(200);

/// How a switch request treats individually invalid entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strictness {
    /// Any invalid entry rejects the whole request before any effect.
    Strict,
    /// Invalid entries are dropped; the rest of the request proceeds.
    BestEffort,
}

/// Where a staged switch currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SwitchPhase {
    /// No switch staged.
    Idle = 0,
    /// Staged; the RT thread executes stops at its next cycle.
    Requested = 1,
    /// Stops done; starts execute at the next cycle.
    Starting = 2,
}

impl SwitchPhase {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => SwitchPhase::Requested,
            2 => SwitchPhase::Starting,
            _ => SwitchPhase::Idle,
        }
    }
}

/// One start candidate with its pre-resolved handles.
pub struct StartAction {
    /// The controller to activate.
    pub record: ControllerRecord,
    /// Command handles, in claim declaration order.
    pub commands: Vec<InterfaceHandle>,
    /// State handles, in claim declaration order.
    pub states: Vec<InterfaceHandle>,
    /// Full command interface names, for claim bookkeeping afterwards.
    pub command_names: Vec<String>,
}

/// A fully validated switch request plus its execution record.
pub struct ActiveSwitch {
    /// Controllers to activate.
    pub start: Vec<StartAction>,
    /// Controllers to deactivate.
    pub stop: Vec<ControllerRecord>,
    /// Command interfaces the starting set will begin writing.
    pub start_interfaces: Vec<String>,
    /// Command interfaces the stopping set will release.
    pub stop_interfaces: Vec<String>,
    /// Execute starts in the same cycle as the stops.
    pub start_asap: bool,

    /// Names whose deactivation completed.
    pub stopped: Vec<String>,
    /// Names whose activation completed.
    pub started: Vec<String>,
    /// Names whose start hook refused activation.
    pub failed: Vec<String>,
}

/// Shared staging slot between the service side and the RT loop.
pub struct SwitchCoordinator {
    phase: AtomicU8,
    request: Mutex<Option<ActiveSwitch>>,
}

impl SwitchCoordinator {
    /// Idle coordinator.
    pub fn new() -> Self {
        Self {
            phase: AtomicU8::new(SwitchPhase::Idle as u8),
            request: Mutex::new(None),
        }
    }

    /// Current phase.
    pub fn phase(&self) -> SwitchPhase {
        SwitchPhase::from_u8(self.phase.load(Ordering::Acquire))
    }

    /// Publish a phase transition.
    pub fn set_phase(&self, phase: SwitchPhase) {
        self.phase.store(phase as u8, Ordering::Release);
    }

    /// Stage a request and mark it `Requested`. The caller must hold the
    /// structural lock and have verified the coordinator is idle.
    pub fn stage(&self, switch: ActiveSwitch) {
        *self.request.lock() = Some(switch);
        self.set_phase(SwitchPhase::Requested);
    }

    /// Lock the staged request for the RT execution steps.
    pub fn request(&self) -> MutexGuard<'_, Option<ActiveSwitch>> {
        self.request.lock()
    }

    /// Reclaim the executed (or abandoned) request and go idle.
    pub fn finish(&self) -> Option<ActiveSwitch> {
        let taken = self.request.lock().take();
        self.set_phase(SwitchPhase::Idle);
        taken
    }

    /// Cancel a request the RT thread has not picked up yet.
    ///
    /// Returns `false` when execution already began; the request then
    /// runs to completion on the RT side.
    pub fn cancel_if_unstarted(&self) -> bool {
        self.phase
            .compare_exchange(
                SwitchPhase::Requested as u8,
                SwitchPhase::Idle as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Move a request whose stop half just executed on to `Starting`.
    ///
    /// Returns `false` when a timed-out service thread cancelled the
    /// request in the meantime; the executed half is then reclaimed
    /// through [`Self::finish`] and the start half never runs.
    pub fn advance_to_starting(&self) -> bool {
        self.phase
            .compare_exchange(
                SwitchPhase::Requested as u8,
                SwitchPhase::Starting as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Wait until the staged switch has fully executed.
    ///
    /// Returns `false` on deadline; a zero timeout waits forever.
    pub fn wait_for_idle(&self, timeout: Duration) -> bool {
        let deadline = (!timeout.is_zero()).then(|| Instant::now() + timeout);
        loop {
            if self.phase() == SwitchPhase::Idle {
                return true;
            }
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    return false;
                }
            }
            std::thread::sleep(SWITCH_POLL_INTERVAL);
        }
    }
}

impl Default for SwitchCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
