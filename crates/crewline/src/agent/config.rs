//! Role configuration loaded from YAML.
//!
//! The file maps a role key to its persona:
//!
//! ```yaml
//! architect:
//!   role: Software Architect
//!   goal: Turn feature specs into implementation plans
//!   backstory: Fifteen years designing web frontends.
//!   complexity: high
//! ```
//!
//! `complexity` is optional and defaults to `low`. `backstory` defaults to an
//! empty string. The table is validated once, before any agent is built.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::router::ComplexityTier;
use crate::error::ConfigError;

/// Role keys the four-stage pipeline needs, in stage order.
pub const PIPELINE_ROLES: [&str; 4] = ["product_manager", "architect", "developer", "qa_engineer"];

/// One role entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleConfig {
    pub role: String,
    pub goal: String,
    #[serde(default)]
    pub backstory: String,
    /// Complexity label as written; see [`RoleConfig::tier`].
    #[serde(default = "default_complexity")]
    pub complexity: String,
}

fn default_complexity() -> String {
    ComplexityTier::Low.as_str().to_string()
}

impl RoleConfig {
    /// Routing tier for the label. Anything but `high` is low.
    pub fn tier(&self) -> ComplexityTier {
        ComplexityTier::from_label(&self.complexity)
    }
}

/// Role key → [`RoleConfig`] table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentsConfig {
    roles: BTreeMap<String, RoleConfig>,
}

impl AgentsConfig {
    /// Read and parse a YAML role table.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::parse(&text).map_err(|message| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        })?;
        debug!("Loaded {} role(s) from {}", config.roles.len(), path.display());
        Ok(config)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        Self::parse(text).map_err(|message| ConfigError::Parse {
            path: "<inline>".into(),
            message,
        })
    }

    fn parse(text: &str) -> Result<Self, String> {
        // An empty document is an empty table, not an error.
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text).map_err(|e| e.to_string())
    }

    pub fn with_role(mut self, key: impl Into<String>, role: RoleConfig) -> Self {
        self.roles.insert(key.into(), role);
        self
    }

    pub fn get(&self, key: &str) -> Option<&RoleConfig> {
        self.roles.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.roles.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }

    /// Check that every key in `required` exists with a non-empty `role`
    /// and `goal`.
    pub fn validate(&self, required: &[&str]) -> Result<(), ConfigError> {
        for key in required {
            let entry = self
                .roles
                .get(*key)
                .ok_or_else(|| ConfigError::MissingRole((*key).to_string()))?;
            if entry.role.trim().is_empty() {
                return Err(ConfigError::MissingField {
                    role_key: (*key).to_string(),
                    field: "role",
                });
            }
            if entry.goal.trim().is_empty() {
                return Err(ConfigError::MissingField {
                    role_key: (*key).to_string(),
                    field: "goal",
                });
            }
        }
        Ok(())
    }
}
