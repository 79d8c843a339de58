//! Declarative plugin manifests.
//!
//! A manifest lists the extensions a plugin contributes. Manifest-level
//! problems fail the whole plugin; extension-level problems are left to the
//! registry, which drops only the offending declaration.

use crate::extension::config::ExtensionConfig;
use crate::extension::registry::{PluginLoadError, RegistrationBatch};
use log::warn;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;

/// Extensions declared by one plugin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginManifest {
    /// Plugin id, e.g. `grafana-basic-app`.
    pub id: String,
    /// Plugin version (`major.minor.patch`).
    pub version: String,
    #[serde(default)]
    pub extensions: Vec<ExtensionConfig>,
}

impl PluginManifest {
    pub fn from_json_str(raw: &str) -> Result<Self, ManifestError> {
        let manifest: Self =
            serde_json::from_str(raw).map_err(|err| ManifestError::Parse(err.to_string()))?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Validates manifest-level invariants.
    pub fn validate(&self) -> Result<(), ManifestError> {
        let id = self.id.trim();
        if id.is_empty() {
            return Err(ManifestError::EmptyId);
        }
        if id != self.id || !is_valid_plugin_id(id) {
            return Err(ManifestError::InvalidId(self.id.clone()));
        }

        if self.version.trim().is_empty() {
            return Err(ManifestError::EmptyVersion);
        }
        if !is_semver_triplet(self.version.trim()) {
            return Err(ManifestError::InvalidVersion(self.version.clone()));
        }
        Ok(())
    }
}

impl From<PluginManifest> for RegistrationBatch {
    fn from(manifest: PluginManifest) -> Self {
        RegistrationBatch::new(manifest.id, manifest.extensions)
    }
}

/// Reads and validates one manifest file.
pub fn load_manifest_file(path: &Path) -> Result<PluginManifest, ManifestError> {
    let raw = std::fs::read_to_string(path).map_err(|err| ManifestError::Io {
        path: path.display().to_string(),
        message: err.to_string(),
    })?;
    PluginManifest::from_json_str(&raw)
}

/// Turns a load outcome into a batch; failures become error-marked batches.
///
/// `fallback_plugin_id` names the plugin when the manifest itself could not
/// be read.
pub fn batch_from_manifest(
    fallback_plugin_id: &str,
    result: Result<PluginManifest, ManifestError>,
) -> RegistrationBatch {
    match result {
        Ok(manifest) => manifest.into(),
        Err(err) => {
            warn!(
                "event=manifest_load module=manifest status=error plugin_id={} error={}",
                fallback_plugin_id, err
            );
            RegistrationBatch::failed(fallback_plugin_id, PluginLoadError::new(err.to_string()))
        }
    }
}

// Lowercase alphanumeric segments joined by single `-`, `_` or `.`.
fn is_valid_plugin_id(value: &str) -> bool {
    value.split(['-', '_', '.']).all(|segment| {
        !segment.is_empty()
            && segment
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
    })
}

fn is_semver_triplet(value: &str) -> bool {
    let parts: Vec<&str> = value.split('.').collect();
    if parts.len() != 3 {
        return false;
    }
    parts
        .iter()
        .all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_digit()))
}

/// Manifest loading and validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestError {
    Io { path: String, message: String },
    Parse(String),
    EmptyId,
    InvalidId(String),
    EmptyVersion,
    InvalidVersion(String),
}

impl Display for ManifestError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, message } => {
                write!(f, "failed to read manifest `{path}`: {message}")
            }
            Self::Parse(message) => write!(f, "manifest is not valid JSON: {message}"),
            Self::EmptyId => write!(f, "manifest id must not be empty"),
            Self::InvalidId(value) => write!(f, "manifest id is invalid: {value}"),
            Self::EmptyVersion => write!(f, "manifest version must not be empty"),
            Self::InvalidVersion(value) => write!(
                f,
                "manifest version is invalid: {value} (expected major.minor.patch)"
            ),
        }
    }
}

impl Error for ManifestError {}
