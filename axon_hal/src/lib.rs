//! # Axon HAL Library
//!
//! Hardware backend implementations for the Axon control framework.
//! Backends implement the `Backend` trait defined in
//! `axon_common::backend`.
//!
//! # Module Structure
//!
//! - [`registry`] - Backend factory registration
//! - [`storage`] - Interface catalog and command/state value storage
//! - [`drivers`] - Backend implementations (loopback simulation)

pub mod drivers;
pub mod registry;
pub mod storage;

// Re-export key types for convenience
pub use crate::drivers::loopback::LoopbackSystem;
pub use crate::registry::BackendRegistry;
pub use crate::storage::{InterfaceStorage, ValueBank};
