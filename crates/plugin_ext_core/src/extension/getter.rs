//! Resolution of registered extensions for one extension point.
//!
//! # Responsibility
//! - Apply each entry's configure callback to the runtime context.
//! - Enforce override rules and the per-plugin limit.
//!
//! # Invariants
//! - The context is only ever lent immutably to callbacks.
//! - A failing or hiding callback removes only its own extension.
//! - Result order follows snapshot order.

use crate::config::RegistryOptions;
use crate::extension::config::{Configure, ExtensionConfig, ExtensionOverrides, ExtensionType};
use crate::extension::registry::{RegistryEntry, RegistrySnapshot};
use crate::extension::validate::{check_description, check_link_path, check_title};
use log::{error, warn};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Lookup parameters for `get_plugin_extensions`.
#[derive(Debug, Clone, Copy)]
pub struct ExtensionQuery<'a> {
    pub extension_point_id: &'a str,
    pub context: Option<&'a Value>,
    /// Overrides `RegistryOptions::limit_per_plugin` when set.
    pub limit_per_plugin: Option<usize>,
}

impl<'a> ExtensionQuery<'a> {
    pub fn new(extension_point_id: &'a str) -> Self {
        Self {
            extension_point_id,
            context: None,
            limit_per_plugin: None,
        }
    }

    pub fn with_context(mut self, context: &'a Value) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_limit_per_plugin(mut self, limit: usize) -> Self {
        self.limit_per_plugin = Some(limit);
        self
    }
}

/// Extension ready to render in one context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginExtension {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ExtensionType,
    pub plugin_id: String,
    pub extension_point_id: String,
    pub title: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

/// Resolves the entries registered at `query.extension_point_id`.
pub fn get_plugin_extensions(
    snapshot: &RegistrySnapshot,
    query: &ExtensionQuery<'_>,
    options: &RegistryOptions,
) -> Vec<PluginExtension> {
    let limit = query.limit_per_plugin.or(options.limit_per_plugin);
    let mut per_plugin = BTreeMap::<&str, usize>::new();
    let mut resolved = Vec::new();

    for entry in snapshot.get(query.extension_point_id) {
        let count = per_plugin.entry(entry.plugin_id.as_str()).or_default();
        if limit.is_some_and(|max| *count >= max) {
            continue;
        }

        let Some(extension) = resolve_entry(entry, query.context, options) else {
            continue;
        };
        *count += 1;
        resolved.push(extension);
    }

    resolved
}

fn resolve_entry(
    entry: &RegistryEntry,
    context: Option<&Value>,
    options: &RegistryOptions,
) -> Option<PluginExtension> {
    let config = &entry.config;
    let overrides = match &config.configure {
        None => ExtensionOverrides::default(),
        Some(Configure::Callable(configure)) => {
            match catch_unwind(AssertUnwindSafe(|| configure(context))) {
                Ok(Some(overrides)) => overrides,
                Ok(None) => return None,
                Err(_) => {
                    error!(
                        "event=configure module=getter status=error plugin_id={} title={} reason=configure_panicked",
                        entry.plugin_id, config.title
                    );
                    return None;
                }
            }
        }
        // Registry validation keeps these out; a hand-built snapshot may not.
        Some(Configure::Value(_)) => return None,
    };

    apply_overrides(&entry.plugin_id, config, overrides, options)
}

fn apply_overrides(
    plugin_id: &str,
    config: &ExtensionConfig,
    overrides: ExtensionOverrides,
    options: &RegistryOptions,
) -> Option<PluginExtension> {
    let title = overrides.title.unwrap_or_else(|| config.title.clone());
    let description = overrides
        .description
        .unwrap_or_else(|| config.description.clone());
    let path = overrides.path.or_else(|| config.path.clone());
    let category = overrides.category.or_else(|| config.category.clone());

    let checked = check_title(&title)
        .and_then(|()| check_description(&description))
        .and_then(|()| match config.kind {
            ExtensionType::Link => check_link_path(plugin_id, path.as_deref(), options),
            ExtensionType::Component => Ok(()),
        });
    if let Err(reason) = checked {
        warn!(
            "event=configure module=getter status=hidden plugin_id={} title={} reason={}",
            plugin_id, config.title, reason
        );
        return None;
    }

    Some(PluginExtension {
        id: extension_id(plugin_id, &config.extension_point_id, &config.title),
        kind: config.kind,
        plugin_id: plugin_id.to_string(),
        extension_point_id: config.extension_point_id.clone(),
        title,
        description,
        path: match config.kind {
            ExtensionType::Link => path,
            ExtensionType::Component => None,
        },
        category,
    })
}

/// Stable id from the declaration, independent of context overrides.
///
/// 32-bit FNV-1a over `plugin_id`, `extension_point_id` and `title`, each
/// followed by a 0 byte.
pub fn extension_id(plugin_id: &str, extension_point_id: &str, title: &str) -> String {
    const FNV_OFFSET: u32 = 0x811c_9dc5;
    const FNV_PRIME: u32 = 0x0100_0193;

    // Each part ends with a 0 byte so ("ab", "c") and ("a", "bc") differ.
    let hash = [plugin_id, extension_point_id, title]
        .iter()
        .flat_map(|part| part.bytes().chain(std::iter::once(0)))
        .fold(FNV_OFFSET, |hash, byte| {
            (hash ^ u32::from(byte)).wrapping_mul(FNV_PRIME)
        });
    hash.to_string()
}
