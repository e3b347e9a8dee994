//! # Axon Controller Manager
//!
//! Arbitrates exclusive access to hardware command interfaces between
//! dynamically loaded controllers and drives them from a real-time
//! control cycle.
//!
//! ## Module Structure
//!
//! - [`record`] - Shared controller cells with atomic lifecycle state
//! - [`rt_list`] - Lock-free-for-the-reader double-buffered controller list
//! - [`claims`] - Exclusive command interface claim bookkeeping
//! - [`registry`] - Controller factory registry
//! - [`switch`] - Activation/deactivation phase coordination
//! - [`manager`] - The controller manager itself
//! - [`error`] - Manager error taxonomy
//!
//! ## Concurrency Model
//!
//! Exactly one real-time thread calls [`manager::ControllerManager::step`]
//! periodically; any number of non-real-time threads call the service
//! methods (load, unload, switch, list). The RT thread never blocks on a
//! structural lock: it reads the published list generation and drives
//! staged switches forward, while non-RT threads wait on it with bounded
//! sleeps.

pub mod claims;
pub mod error;
pub mod manager;
pub mod record;
pub mod registry;
pub mod rt_list;
pub mod switch;
