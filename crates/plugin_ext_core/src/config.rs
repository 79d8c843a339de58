//! Registry options.
//!
//! # Responsibility
//! - Hold the tunables shared by validation, registration and resolution.
//! - Load options from JSON documents with every field defaulted.
//!
//! # Invariants
//! - `app_path_prefix` always starts and ends with `/` after loading.
//! - A zero `limit_per_plugin` is rejected; use `None` for "unlimited".

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;

/// Default namespace prefix for app plugin routes (`/a/<pluginId>/...`).
pub const DEFAULT_APP_PATH_PREFIX: &str = "/a/";

/// Extension point id prefixes accepted in strict mode.
pub const EXTENSION_POINT_ID_PREFIXES: &[&str] = &["grafana/", "plugins/"];

/// Tunables for the extension registry and getter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct RegistryOptions {
    /// Prefix under which every plugin owns `<prefix><pluginId>/`.
    pub app_path_prefix: String,
    /// Default cap on resolved extensions per plugin and extension point.
    pub limit_per_plugin: Option<usize>,
    /// Requires extension point ids to use a known prefix.
    pub strict_extension_point_ids: bool,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            app_path_prefix: DEFAULT_APP_PATH_PREFIX.to_string(),
            limit_per_plugin: None,
            strict_extension_point_ids: false,
        }
    }
}

impl RegistryOptions {
    /// Parses options from a JSON document and checks them.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let options: Self =
            serde_json::from_str(raw).map_err(|err| ConfigError::Parse(err.to_string()))?;
        options.validate()?;
        Ok(options)
    }

    /// Reads options from a JSON file.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|err| ConfigError::Io {
            path: path.display().to_string(),
            message: err.to_string(),
        })?;
        Self::from_json_str(&raw)
    }

    /// Checks option invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let prefix = self.app_path_prefix.as_str();
        if prefix.len() < 2 || !prefix.starts_with('/') || !prefix.ends_with('/') {
            return Err(ConfigError::InvalidAppPathPrefix(prefix.to_string()));
        }
        if self.limit_per_plugin == Some(0) {
            return Err(ConfigError::ZeroLimitPerPlugin);
        }
        Ok(())
    }

    /// Returns the namespace a plugin's link paths must live under.
    pub fn plugin_namespace(&self, plugin_id: &str) -> String {
        format!("{}{}/", self.app_path_prefix, plugin_id)
    }
}

/// Option loading errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Io { path: String, message: String },
    Parse(String),
    InvalidAppPathPrefix(String),
    ZeroLimitPerPlugin,
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, message } => {
                write!(f, "failed to read options file `{path}`: {message}")
            }
            Self::Parse(message) => write!(f, "options are not valid JSON: {message}"),
            Self::InvalidAppPathPrefix(value) => write!(
                f,
                "app path prefix is invalid: `{value}` (expected `/segment/`)"
            ),
            Self::ZeroLimitPerPlugin => {
                write!(f, "limitPerPlugin must be at least 1 when set")
            }
        }
    }
}

impl Error for ConfigError {}
