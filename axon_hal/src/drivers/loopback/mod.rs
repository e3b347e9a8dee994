//! Loopback (simulation) backend.
//!
//! Emulates a physical actuator/sensor chain so controllers can be
//! exercised without hardware: commands written this cycle become the
//! states read next cycle, through a physically plausible integration
//! step with mimic coupling and following-offset emulation.

pub mod driver;
pub mod mimic;
pub mod mode;
pub mod stepper;

pub use driver::{LoopbackSystem, loopback_backend};
pub use mimic::MimicJoint;
pub use mode::CommandModeGate;
pub use stepper::SimulationStepper;
