//! Bridge configuration (tether.toml)
//!
//! ```toml
//! value_types = ["Acme.Widgets.Point"]
//!
//! [[namespaces]]
//! namespace = "Acme.Widgets"
//! prefix = "acme::widgets"
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur loading a configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the file
    #[error("Failed to read bridge config: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse bridge config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Validation error
    #[error("Invalid bridge config: {0}")]
    ValidationError(String),
}

/// One script namespace ↔ native prefix mapping
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NamespaceMapping {
    /// Dotted script namespace
    pub namespace: String,
    /// `::`-separated native prefix
    pub prefix: String,
}

/// Startup configuration applied by [`Bridge::with_config`](crate::Bridge::with_config)
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Namespace mappings
    #[serde(default)]
    pub namespaces: Vec<NamespaceMapping>,

    /// Script-qualified names of types marshalled by value
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub value_types: Vec<String>,
}

impl BridgeConfig {
    /// Create an empty configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a namespace mapping
    pub fn with_namespace(mut self, namespace: impl Into<String>, prefix: impl Into<String>) -> Self {
        self.namespaces.push(NamespaceMapping {
            namespace: namespace.into(),
            prefix: prefix.into(),
        });
        self
    }

    /// Add a value type by script name
    pub fn with_value_type(mut self, script_type: impl Into<String>) -> Self {
        self.value_types.push(script_type.into());
        self
    }

    /// Load a configuration file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse a configuration from TOML text
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: BridgeConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to TOML text
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string(self).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        for mapping in &self.namespaces {
            if mapping.namespace.is_empty() || mapping.prefix.is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "Namespace mapping '{}' -> '{}' has an empty side",
                    mapping.namespace, mapping.prefix
                )));
            }
        }
        if let Some(empty) = self.value_types.iter().position(String::is_empty) {
            return Err(ConfigError::ValidationError(format!(
                "Value type #{} has an empty name",
                empty
            )));
        }
        Ok(())
    }
}
