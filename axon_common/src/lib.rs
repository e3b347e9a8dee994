//! Axon Common Library
//!
//! Shared model and traits for the Axon robot control framework.
//!
//! # Module Structure
//!
//! - [`description`] - Resource description model (joints, sensors, parameters)
//! - [`interface`] - Standard interface vocabulary, slots and exported handles
//! - [`backend`] - `Backend` trait for hardware backends and its error types
//! - [`controller`] - `Controller` trait and lifecycle states
//! - [`config`] - TOML configuration loading
//!
//! # Usage
//!
//! ```toml
//! [dependencies]
//! axon_common = { path = "../axon_common" }
//! ```

pub mod backend;
pub mod config;
pub mod controller;
pub mod description;
pub mod interface;
