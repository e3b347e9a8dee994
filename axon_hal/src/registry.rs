//! Backend registry.
//!
//! Provides a `BackendRegistry` struct for registering and retrieving
//! backend factories keyed by type name. This uses constructor-injection
//! rather than global state.

use axon_common::backend::{Backend, BackendError, BackendFactory};
use std::collections::HashMap;

/// Registry of available hardware backends.
///
/// Constructed at startup, populated via `register()`, and handed to
/// the manager by value. No global state — testable in isolation.
pub struct BackendRegistry {
    factories: HashMap<&'static str, BackendFactory>,
}

impl BackendRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register a backend factory.
    ///
    /// # Panics
    /// Panics if a backend with the same type name is already registered.
    pub fn register(&mut self, type_name: &'static str, factory: BackendFactory) {
        if self.factories.contains_key(type_name) {
            panic!("Backend '{type_name}' is already registered");
        }
        self.factories.insert(type_name, factory);
    }

    /// Get a backend factory by type name.
    pub fn get_factory(&self, type_name: &str) -> Option<BackendFactory> {
        self.factories.get(type_name).copied()
    }

    /// Create a backend instance by type name.
    ///
    /// # Errors
    /// Returns `BackendError::TypeNotFound` if no backend with the given
    /// type name is registered.
    pub fn create_backend(&self, type_name: &str) -> Result<Box<dyn Backend>, BackendError> {
        let factory = self
            .get_factory(type_name)
            .ok_or_else(|| BackendError::TypeNotFound(type_name.to_string()))?;
        Ok(factory())
    }

    /// List all registered backend type names.
    pub fn list_backends(&self) -> Vec<&'static str> {
        self.factories.keys().copied().collect()
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}
