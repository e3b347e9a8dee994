//! # Axon Controller Manager
//!
//! Demo deployment: loads a TOML configuration, brings up the loopback
//! backend, loads and activates a sine position controller, and drives
//! the control cycle until interrupted.

use axon_common::backend::InterfaceAccess;
use axon_common::config::FrameworkConfig;
use axon_common::controller::{Controller, ControllerError};
use axon_common::description::ResourceDescription;
use axon_common::interface::{HW_IF_POSITION, InterfaceHandle, full_name};
use axon_hal::BackendRegistry;
use axon_hal::drivers::loopback::loopback_backend;
use axon_manager::manager::ControllerManager;
use axon_manager::registry::ControllerRegistry;
use axon_manager::switch::Strictness;
use clap::Parser;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{Level, error, info, warn};
use tracing_subscriber::EnvFilter;

/// Axon Controller Manager — resource arbitration and control cycle
#[derive(Parser, Debug)]
#[command(name = "axon_manager")]
#[command(version)]
#[command(about = "Controller manager with a loopback simulation backend")]
struct Args {
    /// Path to the deployment configuration TOML.
    #[arg(default_value = "config/axon.toml")]
    config: PathBuf,

    /// Enable verbose logging (DEBUG level).
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format.
    #[arg(long)]
    json: bool,
}

fn main() {
    let args = Args::parse();
    setup_tracing(&args);

    info!("Axon Controller Manager v{} starting...", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(&args) {
        error!("FATAL: {e}");
        process::exit(1);
    }

    info!("Axon Controller Manager shutdown complete");
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = FrameworkConfig::load(&args.config)?;
    info!(
        "Config OK: update_rate={}Hz, backend='{}', joints={}",
        config.manager.update_rate_hz,
        config.backend.type_name,
        config.robot.joints.len(),
    );

    let mut backends = BackendRegistry::new();
    backends.register("loopback", loopback_backend);
    let mut controllers = ControllerRegistry::new();
    controllers.register("sine_position", sine_position_controller);

    let cycle = Duration::from_secs_f64(1.0 / config.manager.update_rate_hz);
    let manager = Arc::new(ControllerManager::new(&config, &backends, controllers)?);

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        r.store(false, Ordering::SeqCst);
    })?;

    // Control cycle on its own thread; this thread stays non-RT and
    // performs the service calls. The cycle keeps running during
    // shutdown so the final deactivation switch can execute.
    let cycling = Arc::new(AtomicBool::new(true));
    let stepper = {
        let manager = Arc::clone(&manager);
        let cycling = cycling.clone();
        std::thread::spawn(move || {
            let mut last = Instant::now();
            while cycling.load(Ordering::SeqCst) {
                let now = Instant::now();
                let dt = now - last;
                last = now;
                if let Err(e) = manager.step(dt) {
                    error!("control cycle failed: {e}");
                    break;
                }
                if let Some(remaining) = cycle.checked_sub(now.elapsed()) {
                    std::thread::sleep(remaining);
                }
            }
        })
    };

    manager.load("demo_sine", "sine_position")?;
    manager.switch(
        &["demo_sine"],
        &[],
        Strictness::Strict,
        true,
        Duration::ZERO,
    )?;
    for status in manager.list() {
        info!(
            "controller '{}' ({}) is {:?}",
            status.name, status.type_name, status.state
        );
    }

    while running.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(50));
    }

    if let Err(e) = manager.switch(
        &[],
        &["demo_sine"],
        Strictness::BestEffort,
        true,
        Duration::ZERO,
    ) {
        warn!("shutdown deactivation failed: {e}");
    }
    cycling.store(false, Ordering::SeqCst);
    stepper
        .join()
        .map_err(|_| "control cycle thread panicked")?;
    Ok(())
}

/// Drives every joint's position command along one shared sine wave.
/// Claims the whole joint group so the backend accepts the mode switch.
struct SinePosition {
    joints: Vec<String>,
    commands: Vec<InterfaceHandle>,
    amplitude: f64,
    frequency_hz: f64,
    elapsed: f64,
}

fn sine_position_controller() -> Box<dyn Controller> {
    Box::new(SinePosition {
        joints: Vec::new(),
        commands: Vec::new(),
        amplitude: 0.5,
        frequency_hz: 0.2,
        elapsed: 0.0,
    })
}

impl Controller for SinePosition {
    fn configure(&mut self, resources: &ResourceDescription) -> Result<(), ControllerError> {
        if resources.joints.is_empty() {
            return Err(ControllerError::Configure("robot has no joints".to_string()));
        }
        self.joints = resources.joint_names();
        Ok(())
    }

    fn command_interface_claims(&self) -> Vec<String> {
        self.joints
            .iter()
            .map(|joint| full_name(joint, HW_IF_POSITION))
            .collect()
    }

    fn on_start(
        &mut self,
        commands: Vec<InterfaceHandle>,
        _states: Vec<InterfaceHandle>,
    ) -> Result<(), ControllerError> {
        self.commands = commands;
        self.elapsed = 0.0;
        Ok(())
    }

    fn on_stop(&mut self) -> Result<(), ControllerError> {
        self.commands.clear();
        Ok(())
    }

    fn update(&mut self, io: &mut dyn InterfaceAccess, dt: Duration) {
        if self.commands.is_empty() {
            return;
        }
        self.elapsed += dt.as_secs_f64();
        let angle = 2.0 * std::f64::consts::PI * self.frequency_hz * self.elapsed;
        let target = self.amplitude * angle.sin();
        for command in &self.commands {
            io.set_command(command.slot, target);
        }
    }
}

/// Setup tracing subscriber based on CLI arguments.
fn setup_tracing(args: &Args) {
    let level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .compact()
            .init();
    }
}
