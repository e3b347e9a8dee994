//! The controller manager.
//!
//! Owns the backend, the loaded controller list and the claim registry,
//! and exposes two faces: service methods (`load`, `unload`, `list`,
//! `switch`) for any non-real-time thread, and [`ControllerManager::step`]
//! for the single real-time thread. The manager is shared by `&self`;
//! all synchronization is internal.

use crate::claims::ClaimRegistry;
use crate::error::{LoadError, ManagerError, SwitchError, UnloadError};
use crate::record::{ControllerCell, ControllerRecord};
use crate::registry::ControllerRegistry;
use crate::rt_list::RtControllerList;
use crate::switch::{ActiveSwitch, StartAction, Strictness, SwitchCoordinator, SwitchPhase};
use axon_common::backend::{Backend, BackendError, InterfaceAccess};
use axon_common::config::FrameworkConfig;
use axon_common::controller::{Controller, ControllerInfo, ControllerState};
use axon_common::description::ResourceDescription;
use axon_common::interface::InterfaceHandle;
use axon_hal::BackendRegistry;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Snapshot of one loaded controller for `list()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerStatus {
    /// Instance name.
    pub name: String,
    /// Registered type the instance was created from.
    pub type_name: String,
    /// Lifecycle state at snapshot time.
    pub state: ControllerState,
}

/// Arbitrates hardware interface access between loaded controllers and
/// drives the control cycle.
pub struct ControllerManager {
    backend: Mutex<Box<dyn Backend>>,
    registry: ControllerRegistry,
    rt_list: RtControllerList,
    claims: Mutex<ClaimRegistry>,
    coordinator: SwitchCoordinator,
    resources: ResourceDescription,
    command_handles: HashMap<String, InterfaceHandle>,
    state_handles: HashMap<String, InterfaceHandle>,
    switch_timeout: Duration,
    list_write_timeout: Duration,
}

impl ControllerManager {
    /// Instantiate and configure the backend, export its interfaces and
    /// set up an empty controller list.
    ///
    /// # Errors
    /// `ManagerError::Backend` when the backend type is unknown or its
    /// configuration rejects the robot description.
    pub fn new(
        config: &FrameworkConfig,
        backends: &BackendRegistry,
        controllers: ControllerRegistry,
    ) -> Result<Self, ManagerError> {
        let mut backend = backends.create_backend(&config.backend.type_name)?;
        backend
            .configure(&config.robot)
            .map_err(BackendError::from)?;

        let state_handles: HashMap<String, InterfaceHandle> = backend
            .export_state_interfaces()
            .into_iter()
            .map(|handle| (handle.full_name(), handle))
            .collect();
        let command_handles: HashMap<String, InterfaceHandle> = backend
            .export_command_interfaces()
            .into_iter()
            .map(|handle| (handle.full_name(), handle))
            .collect();
        info!(
            backend = backend.name(),
            state_interfaces = state_handles.len(),
            command_interfaces = command_handles.len(),
            "backend configured and interfaces exported"
        );

        Ok(Self {
            backend: Mutex::new(backend),
            registry: controllers,
            rt_list: RtControllerList::new(),
            claims: Mutex::new(ClaimRegistry::new()),
            coordinator: SwitchCoordinator::new(),
            resources: config.robot.clone(),
            command_handles,
            state_handles,
            switch_timeout: Duration::from_millis(config.manager.switch_timeout_ms),
            list_write_timeout: Duration::from_millis(config.manager.list_write_timeout_ms),
        })
    }

    /// Create a named controller instance and configure it with the
    /// robot description. The new controller is `Inactive`.
    ///
    /// # Errors
    /// Unknown type, duplicate instance name, a rejecting `configure()`
    /// hook, or a list write timeout.
    pub fn load(&self, name: &str, type_name: &str) -> Result<(), LoadError> {
        let lock = self.rt_list.structural_lock();
        if self.rt_list.updated_view().iter().any(|r| r.name() == name) {
            return Err(LoadError::DuplicateName(name.to_string()));
        }

        let mut controller = self.registry.create(type_name)?;
        controller
            .configure(&self.resources)
            .map_err(|e| LoadError::Configure {
                name: name.to_string(),
                reason: e.to_string(),
            })?;

        let record = ControllerCell::new(
            ControllerInfo {
                name: name.to_string(),
                type_name: type_name.to_string(),
            },
            controller,
        );
        record.set_state(ControllerState::Inactive);

        let mut view = self
            .rt_list
            .write_view(&lock, self.list_write_timeout)
            .map_err(|_| LoadError::ListWriteTimeout)?;
        view.push(record);
        view.publish();
        info!(controller = name, type_name, "controller loaded");
        Ok(())
    }

    /// Remove an inactive controller from the list.
    ///
    /// # Errors
    /// Unknown name, a still-active controller, or a list write timeout.
    pub fn unload(&self, name: &str) -> Result<(), UnloadError> {
        let lock = self.rt_list.structural_lock();
        {
            let view = self.rt_list.updated_view();
            let record = view
                .iter()
                .find(|r| r.name() == name)
                .ok_or_else(|| UnloadError::NotFound(name.to_string()))?;
            if record.is_active() {
                return Err(UnloadError::Active(name.to_string()));
            }
        }

        let mut view = self
            .rt_list
            .write_view(&lock, self.list_write_timeout)
            .map_err(|_| UnloadError::ListWriteTimeout)?;
        view.retain(|r| r.name() != name);
        view.publish();
        info!(controller = name, "controller unloaded");
        Ok(())
    }

    /// Status of every loaded controller, in list order.
    pub fn list(&self) -> Vec<ControllerStatus> {
        let _lock = self.rt_list.structural_lock();
        self.rt_list
            .updated_view()
            .iter()
            .map(|record| ControllerStatus {
                name: record.info().name.clone(),
                type_name: record.info().type_name.clone(),
                state: record.state(),
            })
            .collect()
    }

    /// Current exclusive holder of a command interface.
    pub fn command_claim_holder(&self, interface: &str) -> Option<String> {
        self.claims.lock().holder(interface).map(str::to_string)
    }

    /// Read a state interface by full name (non-RT monitoring access).
    pub fn state_value(&self, interface: &str) -> Option<f64> {
        let handle = self.state_handles.get(interface)?;
        Some(self.backend.lock().state(handle.slot))
    }

    /// Read a command interface by full name (non-RT monitoring access).
    pub fn command_value(&self, interface: &str) -> Option<f64> {
        let handle = self.command_handles.get(interface)?;
        Some(self.backend.lock().command(handle.slot))
    }

    /// Activate and deactivate controllers in one coordinated request.
    ///
    /// Validation happens up front: unknown names, wrong lifecycle
    /// states, unknown or contested interfaces and a rejecting backend
    /// mode transition all fail before anything changes. Under
    /// [`Strictness::BestEffort`] invalid entries are dropped instead.
    /// The accepted request is executed by the RT thread at its next
    /// cycle boundary; this call blocks until it has finished.
    ///
    /// A zero `timeout` falls back to the configured default; a zero
    /// configured default waits without bound.
    ///
    /// # Errors
    /// Validation failures as above, `SwitchInProgress` when another
    /// request is staged, `Timeout` with the partial outcome when the RT
    /// thread misses the deadline (stopped controllers stay stopped,
    /// nothing is rolled back), and `StartFailed` when start hooks
    /// refuse.
    pub fn switch(
        &self,
        start: &[&str],
        stop: &[&str],
        strictness: Strictness,
        start_asap: bool,
        timeout: Duration,
    ) -> Result<(), SwitchError> {
        let _lock = self.rt_list.structural_lock();
        if self.coordinator.phase() != SwitchPhase::Idle {
            return Err(SwitchError::SwitchInProgress);
        }

        let switch = {
            let claims = self.claims.lock();
            self.validate_switch(start, stop, strictness, start_asap, &claims)?
        };
        let Some(switch) = switch else {
            debug!("switch request resolved to nothing to do");
            return Ok(());
        };

        self.backend
            .lock()
            .prepare_command_mode_switch(&switch.start_interfaces, &switch.stop_interfaces)?;

        info!(
            starting = switch.start.len(),
            stopping = switch.stop.len(),
            start_asap,
            "switch staged for the control cycle"
        );
        self.coordinator.stage(switch);

        let timeout = if timeout.is_zero() {
            self.switch_timeout
        } else {
            timeout
        };
        if !self.coordinator.wait_for_idle(timeout) {
            self.coordinator.cancel_if_unstarted();
            let outcome = self.coordinator.finish();
            let (stopped, started) = match outcome {
                Some(switch) => {
                    self.sync_claims(&switch);
                    (switch.stopped, switch.started)
                }
                None => (Vec::new(), Vec::new()),
            };
            warn!(
                stopped = stopped.len(),
                started = started.len(),
                "switch timed out with partial outcome"
            );
            return Err(SwitchError::Timeout { stopped, started });
        }

        let switch = self
            .coordinator
            .finish()
            .expect("completed switch request must still be staged");
        self.sync_claims(&switch);
        if !switch.failed.is_empty() {
            return Err(SwitchError::StartFailed(switch.failed));
        }
        Ok(())
    }

    /// One control cycle. Must be called periodically from exactly one
    /// real-time thread.
    ///
    /// Drives any staged switch forward, reads the backend, updates
    /// every active controller and writes the backend back.
    ///
    /// # Errors
    /// Backend communication failures from `read` or `write`.
    pub fn step(&self, dt: Duration) -> Result<(), BackendError> {
        self.manage_switch();

        let view = self.rt_list.rt_view();
        let mut backend = self.backend.lock();
        backend.read(dt)?;
        for record in view.iter().filter(|r| r.is_active()) {
            let io: &mut dyn InterfaceAccess = &mut **backend;
            record.lock().update(io, dt);
        }
        backend.write(dt)?;
        Ok(())
    }

    /// Execute the staged switch phases at the cycle boundary.
    fn manage_switch(&self) {
        match self.coordinator.phase() {
            SwitchPhase::Idle => {}
            SwitchPhase::Requested => {
                let mut request = self.coordinator.request();
                let Some(switch) = request.as_mut() else {
                    drop(request);
                    self.coordinator.set_phase(SwitchPhase::Idle);
                    return;
                };

                for record in &switch.stop {
                    if let Err(e) = record.lock().on_stop() {
                        error!(controller = record.name(), error = %e, "stop hook failed");
                    }
                    record.set_state(ControllerState::Inactive);
                    switch.stopped.push(record.name().to_string());
                    debug!(controller = record.name(), "controller deactivated");
                }
                if let Err(e) = self
                    .backend
                    .lock()
                    .perform_command_mode_switch(&switch.start_interfaces, &switch.stop_interfaces)
                {
                    error!(error = %e, "command mode transition failed mid-switch");
                }

                if switch.start_asap {
                    Self::execute_starts(switch);
                    drop(request);
                    self.coordinator.set_phase(SwitchPhase::Idle);
                } else {
                    drop(request);
                    // A timed-out service thread may have cancelled
                    // since the phase read above; it then reclaims the
                    // executed stop half and the starts never run.
                    self.coordinator.advance_to_starting();
                }
            }
            SwitchPhase::Starting => {
                let mut request = self.coordinator.request();
                if let Some(switch) = request.as_mut() {
                    Self::execute_starts(switch);
                }
                drop(request);
                self.coordinator.set_phase(SwitchPhase::Idle);
            }
        }
    }

    fn execute_starts(switch: &mut ActiveSwitch) {
        for action in &mut switch.start {
            let result = action
                .record
                .lock()
                .on_start(action.commands.clone(), action.states.clone());
            match result {
                Ok(()) => {
                    action.record.set_state(ControllerState::Active);
                    switch.started.push(action.record.name().to_string());
                    debug!(controller = action.record.name(), "controller activated");
                }
                Err(e) => {
                    error!(controller = action.record.name(), error = %e, "start hook failed");
                    switch.failed.push(action.record.name().to_string());
                }
            }
        }
    }

    /// Bring the claim registry in line with what actually happened.
    fn sync_claims(&self, switch: &ActiveSwitch) {
        let mut claims = self.claims.lock();
        for name in &switch.stopped {
            claims.release(name);
        }
        for action in &switch.start {
            if switch.started.iter().any(|n| n == action.record.name()) {
                claims.grant(action.record.name(), &action.command_names);
            }
        }
    }

    /// Resolve names and build the request, or `None` when everything
    /// was filtered away.
    fn validate_switch(
        &self,
        start: &[&str],
        stop: &[&str],
        strictness: Strictness,
        start_asap: bool,
        claims: &ClaimRegistry,
    ) -> Result<Option<ActiveSwitch>, SwitchError> {
        let view = self.rt_list.updated_view();
        let find = |name: &str| view.iter().find(|r| r.name() == name).cloned();
        let strict = strictness == Strictness::Strict;

        let mut stop_records: Vec<ControllerRecord> = Vec::new();
        for name in stop {
            let Some(record) = find(name) else {
                if strict {
                    return Err(SwitchError::UnknownController(name.to_string()));
                }
                warn!(controller = name, "dropping unknown controller from stop set");
                continue;
            };
            if !record.is_active() {
                if strict {
                    return Err(SwitchError::AlreadyInactive(name.to_string()));
                }
                warn!(controller = name, "dropping inactive controller from stop set");
                continue;
            }
            stop_records.push(record);
        }
        let stop_names: Vec<&str> = stop_records.iter().map(|r| r.name()).collect();

        let mut start_actions: Vec<StartAction> = Vec::new();
        let mut pending: HashMap<String, String> = HashMap::new();
        'candidates: for name in start {
            let Some(record) = find(name) else {
                if strict {
                    return Err(SwitchError::UnknownController(name.to_string()));
                }
                warn!(controller = name, "dropping unknown controller from start set");
                continue;
            };
            match record.state() {
                ControllerState::Inactive => {}
                ControllerState::Unconfigured => {
                    if strict {
                        return Err(SwitchError::NotConfigured(name.to_string()));
                    }
                    warn!(controller = name, "dropping unconfigured controller from start set");
                    continue;
                }
                ControllerState::Active => {
                    if strict {
                        return Err(SwitchError::AlreadyActive(name.to_string()));
                    }
                    warn!(controller = name, "dropping already active controller from start set");
                    continue;
                }
            }

            let (command_names, state_names) = {
                let controller = record.lock();
                (
                    controller.command_interface_claims(),
                    controller.state_interface_claims(),
                )
            };

            let mut commands = Vec::with_capacity(command_names.len());
            for interface in &command_names {
                let Some(handle) = self.command_handles.get(interface) else {
                    let err = SwitchError::UnknownInterface {
                        controller: name.to_string(),
                        interface: interface.clone(),
                    };
                    if strict {
                        return Err(err);
                    }
                    warn!(error = %err, "dropping controller from start set");
                    continue 'candidates;
                };
                commands.push(handle.clone());
            }
            let mut states = Vec::with_capacity(state_names.len());
            for interface in &state_names {
                let Some(handle) = self.state_handles.get(interface) else {
                    let err = SwitchError::UnknownInterface {
                        controller: name.to_string(),
                        interface: interface.clone(),
                    };
                    if strict {
                        return Err(err);
                    }
                    warn!(error = %err, "dropping controller from start set");
                    continue 'candidates;
                };
                states.push(handle.clone());
            }

            if let Err(err) = claims.check(name, &command_names, &stop_names) {
                if strict {
                    return Err(err);
                }
                warn!(error = %err, "dropping controller from start set");
                continue;
            }
            for interface in &command_names {
                if let Some(other) = pending.get(interface) {
                    let err = SwitchError::ClaimConflict {
                        interface: interface.clone(),
                        held_by: other.clone(),
                        requested_by: name.to_string(),
                    };
                    if strict {
                        return Err(err);
                    }
                    warn!(error = %err, "dropping controller from start set");
                    continue 'candidates;
                }
            }
            for interface in &command_names {
                pending.insert(interface.clone(), name.to_string());
            }

            start_actions.push(StartAction {
                record,
                commands,
                states,
                command_names,
            });
        }

        if start_actions.is_empty() && stop_records.is_empty() {
            return Ok(None);
        }

        let start_interfaces: Vec<String> = start_actions
            .iter()
            .flat_map(|a| a.command_names.iter().cloned())
            .collect();
        let stop_interfaces: Vec<String> = stop_names
            .iter()
            .flat_map(|name| claims.held_by(name))
            .collect();

        Ok(Some(ActiveSwitch {
            start: start_actions,
            stop: stop_records,
            start_interfaces,
            stop_interfaces,
            start_asap,
            stopped: Vec::new(),
            started: Vec::new(),
            failed: Vec::new(),
        }))
    }
}
