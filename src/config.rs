//! Stitcher configuration.
//!
//! Every field has a default, so an empty document is a valid configuration. Keys are
//! camelCase in both YAML and JSON:
//!
//! ```yaml
//! sourceName: Vault.sol
//! containerPolicy: mostMembers
//! conflictStrategy: replace
//! ```

use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::stitch::{ConflictStrategy, ContainerPolicy};
use crate::{ErrorContext, Result, StitchError};

pub const DEFAULT_SOURCE_NAME: &str = "Contract.sol";
pub const DEFAULT_FRAGMENT_SOURCE_NAME: &str = "Fragment.sol";
pub const DEFAULT_FRAGMENT_CONTAINER: &str = "__StitchFragment";
pub const DEFAULT_PRAGMA: &str = "^0.8.0";

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*$").expect("identifier pattern is valid"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StitchConfig {
    /// Name given to target sources parsed without an explicit name.
    pub source_name: String,
    /// Name the wrapped fragment is parsed under; shows up in fragment parse errors.
    pub fragment_source_name: String,
    /// Name of the synthetic contract that wraps fragments.
    pub fragment_container: String,
    /// Version constraint written into the wrapped fragment's pragma.
    pub pragma: String,
    pub container_policy: ContainerPolicy,
    pub conflict_strategy: ConflictStrategy,
}

impl Default for StitchConfig {
    fn default() -> Self {
        Self {
            source_name: DEFAULT_SOURCE_NAME.to_string(),
            fragment_source_name: DEFAULT_FRAGMENT_SOURCE_NAME.to_string(),
            fragment_container: DEFAULT_FRAGMENT_CONTAINER.to_string(),
            pragma: DEFAULT_PRAGMA.to_string(),
            container_policy: ContainerPolicy::default(),
            conflict_strategy: ConflictStrategy::default(),
        }
    }
}

impl StitchConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let config: StitchConfig = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: StitchConfig = serde_json::from_str(text).map_err(|err| {
            crate::err_msg!(Config, err.to_string()).caused_by(err)
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a configuration file; `.json` files are JSON, anything else YAML.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|err| StitchError::Config {
            message: format!("cannot read {}: {err}", path.display()),
            ctx: ErrorContext::with_subject(path.display().to_string()),
            source: Some(Box::new(err)),
        })?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json_str(&text),
            _ => Self::from_yaml_str(&text),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !IDENTIFIER.is_match(&self.fragment_container) {
            return Err(crate::err_msg!(
                Config,
                "fragmentContainer '{}' is not a valid contract name",
                self.fragment_container
            ));
        }
        if self.pragma.trim().is_empty() || self.pragma.contains(';') {
            return Err(crate::err_msg!(
                Config,
                "pragma '{}' is not a version constraint",
                self.pragma
            ));
        }
        if self.source_name.is_empty() || self.fragment_source_name.is_empty() {
            return Err(crate::err_msg!(Config, "source names must not be empty"));
        }
        Ok(())
    }

    pub fn with_source_name(mut self, name: impl Into<String>) -> Self {
        self.source_name = name.into();
        self
    }

    pub fn with_fragment_source_name(mut self, name: impl Into<String>) -> Self {
        self.fragment_source_name = name.into();
        self
    }

    pub fn with_fragment_container(mut self, name: impl Into<String>) -> Self {
        self.fragment_container = name.into();
        self
    }

    pub fn with_pragma(mut self, pragma: impl Into<String>) -> Self {
        self.pragma = pragma.into();
        self
    }

    pub fn with_container_policy(mut self, policy: ContainerPolicy) -> Self {
        self.container_policy = policy;
        self
    }

    pub fn with_conflict_strategy(mut self, strategy: ConflictStrategy) -> Self {
        self.conflict_strategy = strategy;
        self
    }
}
