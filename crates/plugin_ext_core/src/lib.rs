//! Plugin extension registry.
//! Collects extension declarations from plugins and republishes them as
//! immutable snapshots keyed by extension point.

pub mod config;
pub mod extension;
pub mod logging;

pub use config::{ConfigError, RegistryOptions};
pub use extension::config::{
    Configure, ConfigureFn, ExtensionConfig, ExtensionOverrides, ExtensionType,
};
pub use extension::getter::{extension_id, get_plugin_extensions, ExtensionQuery, PluginExtension};
pub use extension::manifest::{batch_from_manifest, load_manifest_file, ManifestError, PluginManifest};
pub use extension::registry::{
    PluginLoadError, ReactiveExtensionRegistry, RegistrationBatch, RegistryEntry,
    RegistrySnapshot, SnapshotObservable, Subscription,
};
pub use extension::validate::{
    is_extension_config_valid, is_link_path_valid, validate_extension_config,
    ExtensionValidationError,
};
pub use logging::{default_log_level, init_logging, logging_status, LoggingConfig};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
