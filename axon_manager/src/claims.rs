//! Command interface claim bookkeeping.
//!
//! Command interfaces are exclusive: at most one active controller
//! writes each one. State interfaces are shared reads and never appear
//! here. The registry is consulted and updated only on the service side,
//! under the structural lock, so the RT loop never sees a half-applied
//! claim set.

use crate::error::SwitchError;
use std::collections::HashMap;

/// Map from full command interface name to the holding controller.
#[derive(Debug, Default)]
pub struct ClaimRegistry {
    held: HashMap<String, String>,
}

impl ClaimRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current holder of a command interface, if any.
    pub fn holder(&self, interface: &str) -> Option<&str> {
        self.held.get(interface).map(String::as_str)
    }

    /// Check whether `controller` could claim all of `interfaces`,
    /// treating everything held by `releasing` controllers as free.
    /// Mutates nothing.
    ///
    /// # Errors
    /// `SwitchError::ClaimConflict` naming the first contested interface.
    pub fn check(
        &self,
        controller: &str,
        interfaces: &[String],
        releasing: &[&str],
    ) -> Result<(), SwitchError> {
        for interface in interfaces {
            if let Some(held_by) = self.held.get(interface) {
                if !releasing.contains(&held_by.as_str()) {
                    return Err(SwitchError::ClaimConflict {
                        interface: interface.clone(),
                        held_by: held_by.clone(),
                        requested_by: controller.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Record `controller` as the holder of all of `interfaces`.
    /// Callers must have validated with [`Self::check`] first.
    pub fn grant(&mut self, controller: &str, interfaces: &[String]) {
        for interface in interfaces {
            self.held.insert(interface.clone(), controller.to_string());
        }
    }

    /// All command interfaces currently held by `controller`, sorted.
    pub fn held_by(&self, controller: &str) -> Vec<String> {
        let mut interfaces: Vec<String> = self
            .held
            .iter()
            .filter(|(_, holder)| holder.as_str() == controller)
            .map(|(interface, _)| interface.clone())
            .collect();
        interfaces.sort_unstable();
        interfaces
    }

    /// Drop every claim held by `controller`.
    pub fn release(&mut self, controller: &str) {
        self.held.retain(|_, holder| holder != controller);
    }

    /// Number of held command interfaces.
    pub fn len(&self) -> usize {
        self.held.len()
    }

    /// Is the registry empty?
    pub fn is_empty(&self) -> bool {
        self.held.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn free_interfaces_pass_the_check() {
        let registry = ClaimRegistry::new();
        registry.check("a", &claims(&["j1/position"]), &[]).unwrap();
    }

    #[test]
    fn held_interfaces_conflict() {
        let mut registry = ClaimRegistry::new();
        registry.grant("a", &claims(&["j1/position"]));

        let err = registry.check("b", &claims(&["j1/position"]), &[]).unwrap_err();
        assert!(matches!(
            err,
            SwitchError::ClaimConflict { held_by, requested_by, .. }
                if held_by == "a" && requested_by == "b"
        ));
    }

    #[test]
    fn interfaces_of_a_releasing_controller_count_as_free() {
        let mut registry = ClaimRegistry::new();
        registry.grant("a", &claims(&["j1/position"]));
        registry.check("b", &claims(&["j1/position"]), &["a"]).unwrap();
    }

    #[test]
    fn release_drops_all_claims_of_a_controller() {
        let mut registry = ClaimRegistry::new();
        registry.grant("a", &claims(&["j1/position", "j2/position"]));
        registry.grant("b", &claims(&["j1/velocity"]));

        registry.release("a");
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.holder("j1/velocity"), Some("b"));
        assert_eq!(registry.holder("j1/position"), None);
    }
}
