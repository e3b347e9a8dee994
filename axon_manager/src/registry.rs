//! Controller factory registry.
//!
//! Maps controller type names to factory functions. Populated once at
//! startup by the application; the manager only reads it afterwards.

use crate::error::LoadError;
use axon_common::controller::{Controller, ControllerFactory};
use std::collections::HashMap;
use tracing::debug;

/// Registry of controller factories, keyed by type name.
#[derive(Default)]
pub struct ControllerRegistry {
    factories: HashMap<String, ControllerFactory>,
}

impl ControllerRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under a type name.
    ///
    /// # Panics
    /// If the type name is already registered. Registration happens once
    /// at startup, a duplicate is a programming error.
    pub fn register(&mut self, type_name: &str, factory: ControllerFactory) {
        if self
            .factories
            .insert(type_name.to_string(), factory)
            .is_some()
        {
            panic!("Controller type '{type_name}' is already registered");
        }
        debug!(type_name, "registered controller factory");
    }

    /// Instantiate a controller of the given type.
    ///
    /// # Errors
    /// `LoadError::UnknownType` if no factory is registered.
    pub fn create(&self, type_name: &str) -> Result<Box<dyn Controller>, LoadError> {
        self.factories
            .get(type_name)
            .map(|factory| factory())
            .ok_or_else(|| LoadError::UnknownType(type_name.to_string()))
    }

    /// Registered type names, sorted.
    pub fn list_types(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axon_common::backend::InterfaceAccess;
    use axon_common::controller::ControllerError;
    use axon_common::interface::InterfaceHandle;
    use std::time::Duration;

    struct Noop;

    impl Controller for Noop {
        fn command_interface_claims(&self) -> Vec<String> {
            Vec::new()
        }

        fn on_start(
            &mut self,
            _commands: Vec<InterfaceHandle>,
            _states: Vec<InterfaceHandle>,
        ) -> Result<(), ControllerError> {
            Ok(())
        }

        fn update(&mut self, _io: &mut dyn InterfaceAccess, _dt: Duration) {}
    }

    fn noop_controller() -> Box<dyn Controller> {
        Box::new(Noop)
    }

    #[test]
    fn creates_registered_types() {
        let mut registry = ControllerRegistry::new();
        registry.register("noop", noop_controller);
        assert!(registry.create("noop").is_ok());
        assert_eq!(registry.list_types(), vec!["noop"]);
    }

    #[test]
    fn unknown_type_is_an_error() {
        let registry = ControllerRegistry::new();
        assert!(matches!(
            registry.create("ghost"),
            Err(LoadError::UnknownType(_))
        ));
    }

    #[test]
    #[should_panic(expected = "already registered")]
    fn duplicate_registration_panics() {
        let mut registry = ControllerRegistry::new();
        registry.register("noop", noop_controller);
        registry.register("noop", noop_controller);
    }
}
