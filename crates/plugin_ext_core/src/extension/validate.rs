//! Per-extension validation.
//!
//! Each check is independent and pure. The registry composes them and drops
//! any declaration that fails; nothing here has side effects.

use crate::config::{RegistryOptions, EXTENSION_POINT_ID_PREFIXES};
use crate::extension::config::{Configure, ExtensionConfig, ExtensionType};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Reason a declaration was excluded from the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtensionValidationError {
    EmptyTitle,
    EmptyDescription,
    ConfigureNotCallable,
    MissingLinkPath,
    LinkPathOutsideNamespace { path: String, namespace: String },
    EmptyExtensionPointId,
    UnknownExtensionPointPrefix(String),
}

impl Display for ExtensionValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyTitle => write!(f, "extension title must not be empty"),
            Self::EmptyDescription => write!(f, "extension description must not be empty"),
            Self::ConfigureNotCallable => {
                write!(f, "extension configure value is not a function")
            }
            Self::MissingLinkPath => write!(f, "link extension has no path"),
            Self::LinkPathOutsideNamespace { path, namespace } => write!(
                f,
                "link path `{path}` is outside the plugin namespace `{namespace}`"
            ),
            Self::EmptyExtensionPointId => write!(f, "extension point id must not be empty"),
            Self::UnknownExtensionPointPrefix(value) => write!(
                f,
                "extension point id `{value}` must start with one of: {}",
                EXTENSION_POINT_ID_PREFIXES.join(", ")
            ),
        }
    }
}

impl Error for ExtensionValidationError {}

/// Runs every check against one declaration, stopping at the first failure.
pub fn validate_extension_config(
    plugin_id: &str,
    config: &ExtensionConfig,
    options: &RegistryOptions,
) -> Result<(), ExtensionValidationError> {
    check_title(&config.title)?;
    check_description(&config.description)?;
    check_configure(config.configure.as_ref())?;
    check_extension_point_id(&config.extension_point_id, options)?;
    if config.kind == ExtensionType::Link {
        check_link_path(plugin_id, config.path.as_deref(), options)?;
    }
    Ok(())
}

/// Boolean form used when only the verdict matters.
pub fn is_extension_config_valid(
    plugin_id: &str,
    config: &ExtensionConfig,
    options: &RegistryOptions,
) -> bool {
    validate_extension_config(plugin_id, config, options).is_ok()
}

/// True when `path` lives under `<prefix><plugin_id>/`.
pub fn is_link_path_valid(plugin_id: &str, path: &str, options: &RegistryOptions) -> bool {
    !plugin_id.is_empty() && path.starts_with(options.plugin_namespace(plugin_id).as_str())
}

pub(crate) fn check_title(title: &str) -> Result<(), ExtensionValidationError> {
    if title.is_empty() {
        return Err(ExtensionValidationError::EmptyTitle);
    }
    Ok(())
}

pub(crate) fn check_description(description: &str) -> Result<(), ExtensionValidationError> {
    if description.is_empty() {
        return Err(ExtensionValidationError::EmptyDescription);
    }
    Ok(())
}

fn check_configure(configure: Option<&Configure>) -> Result<(), ExtensionValidationError> {
    match configure {
        None | Some(Configure::Callable(_)) => Ok(()),
        Some(Configure::Value(_)) => Err(ExtensionValidationError::ConfigureNotCallable),
    }
}

fn check_extension_point_id(
    extension_point_id: &str,
    options: &RegistryOptions,
) -> Result<(), ExtensionValidationError> {
    if !options.strict_extension_point_ids {
        return Ok(());
    }
    if extension_point_id.trim().is_empty() {
        return Err(ExtensionValidationError::EmptyExtensionPointId);
    }
    if !EXTENSION_POINT_ID_PREFIXES
        .iter()
        .any(|prefix| extension_point_id.starts_with(prefix))
    {
        return Err(ExtensionValidationError::UnknownExtensionPointPrefix(
            extension_point_id.to_string(),
        ));
    }
    Ok(())
}

pub(crate) fn check_link_path(
    plugin_id: &str,
    path: Option<&str>,
    options: &RegistryOptions,
) -> Result<(), ExtensionValidationError> {
    let Some(path) = path else {
        return Err(ExtensionValidationError::MissingLinkPath);
    };
    if !is_link_path_valid(plugin_id, path, options) {
        return Err(ExtensionValidationError::LinkPathOutsideNamespace {
            path: path.to_string(),
            namespace: options.plugin_namespace(plugin_id),
        });
    }
    Ok(())
}
