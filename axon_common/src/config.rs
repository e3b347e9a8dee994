//! TOML configuration loading.
//!
//! One `axon.toml` file describes a whole deployment: manager timing,
//! backend selection and the robot resource description.
//!
//! # TOML Example
//!
//! ```toml
//! [manager]
//! update_rate_hz = 100.0
//! switch_timeout_ms = 3000
//!
//! [backend]
//! type_name = "loopback"
//!
//! [[robot.joints]]
//! name = "joint1"
//! command_interfaces = ["position", "velocity"]
//! state_interfaces = ["position", "velocity"]
//! ```

use crate::description::ResourceDescription;
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

/// Error type for configuration file loading.
#[derive(Debug, Clone, Error)]
pub enum ConfigFileError {
    /// Configuration file could not be read.
    #[error("failed to read configuration file: {0}")]
    Io(String),

    /// TOML parsing failed.
    #[error("failed to parse configuration: {0}")]
    Parse(String),

    /// Semantic validation failed.
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

/// Manager timing section.
#[derive(Debug, Clone, Deserialize)]
pub struct ManagerConfig {
    /// Control loop rate in Hz.
    #[serde(default = "default_update_rate")]
    pub update_rate_hz: f64,

    /// Default switch timeout in milliseconds; `0` means unbounded.
    #[serde(default = "default_switch_timeout")]
    pub switch_timeout_ms: u64,

    /// Cap on the writer's busy-wait for a free list generation.
    #[serde(default = "default_list_write_timeout")]
    pub list_write_timeout_ms: u64,
}

fn default_update_rate() -> f64 {
    100.0
}

fn default_switch_timeout() -> u64 {
    3000
}

fn default_list_write_timeout() -> u64 {
    500
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            update_rate_hz: default_update_rate(),
            switch_timeout_ms: default_switch_timeout(),
            list_write_timeout_ms: default_list_write_timeout(),
        }
    }
}

/// Backend selection section.
#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    /// Registered backend type to instantiate.
    pub type_name: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            type_name: "loopback".to_string(),
        }
    }
}

/// Top-level deployment configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FrameworkConfig {
    /// Manager timing.
    #[serde(default)]
    pub manager: ManagerConfig,
    /// Backend selection.
    #[serde(default)]
    pub backend: BackendConfig,
    /// Robot resource description.
    #[serde(default)]
    pub robot: ResourceDescription,
}

impl FrameworkConfig {
    /// Load and validate a configuration file.
    ///
    /// # Errors
    /// `ConfigFileError` on read, parse or validation failure.
    pub fn load(path: &Path) -> Result<Self, ConfigFileError> {
        let raw =
            std::fs::read_to_string(path).map_err(|e| ConfigFileError::Io(e.to_string()))?;
        let config: FrameworkConfig =
            toml::from_str(&raw).map_err(|e| ConfigFileError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate semantic constraints.
    ///
    /// # Errors
    /// `ConfigFileError::Validation` if the update rate is not positive,
    /// the backend type is empty, or component names collide.
    pub fn validate(&self) -> Result<(), ConfigFileError> {
        if self.manager.update_rate_hz <= 0.0 {
            return Err(ConfigFileError::Validation(
                "manager.update_rate_hz must be positive".to_string(),
            ));
        }
        if self.backend.type_name.is_empty() {
            return Err(ConfigFileError::Validation(
                "backend.type_name must not be empty".to_string(),
            ));
        }
        let mut seen = std::collections::BTreeSet::new();
        for component in self.robot.joints.iter().chain(self.robot.sensors.iter()) {
            if !seen.insert(component.name.as_str()) {
                return Err(ConfigFileError::Validation(format!(
                    "duplicate component name '{}'",
                    component.name
                )));
            }
        }
        Ok(())
    }
}
