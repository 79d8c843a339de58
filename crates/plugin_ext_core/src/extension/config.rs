//! Extension declaration types.
//!
//! # Responsibility
//! - Describe one plugin contribution to one extension point.
//! - Carry the optional context-adaptation callback next to the declaration.
//!
//! # Invariants
//! - Declarations are plain data; validation lives in `extension::validate`.
//! - `configure` is never serialized. Only its presence matters for equality.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// Contribution kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtensionType {
    /// Navigable link rendered in an extension point.
    Link,
    /// Embedded component rendered in an extension point.
    Component,
}

impl ExtensionType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Link => "link",
            Self::Component => "component",
        }
    }
}

/// Context-adaptation callback.
///
/// Receives the read-only runtime context of the extension point (if any).
/// Returning `None` hides the extension for that context.
pub type ConfigureFn =
    Arc<dyn Fn(Option<&Value>) -> Option<ExtensionOverrides> + Send + Sync + 'static>;

/// Declared configuration value.
#[derive(Clone)]
pub enum Configure {
    /// Callable adapter; the only valid form.
    Callable(ConfigureFn),
    /// Any non-callable value a plugin declared, e.g. a string from JSON.
    Value(Value),
}

impl Configure {
    /// Wraps a closure as a callable configure value.
    pub fn callable<F>(f: F) -> Self
    where
        F: Fn(Option<&Value>) -> Option<ExtensionOverrides> + Send + Sync + 'static,
    {
        Self::Callable(Arc::new(f))
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Self::Callable(_))
    }
}

impl Debug for Configure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Callable(_) => f.write_str("Configure::Callable(<fn>)"),
            Self::Value(value) => write!(f, "Configure::Value({value})"),
        }
    }
}

/// Callables compare equal to any other callable.
impl PartialEq for Configure {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Callable(_), Self::Callable(_)) => true,
            (Self::Value(left), Self::Value(right)) => left == right,
            _ => false,
        }
    }
}

/// Properties a configure callback may change for one context.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionOverrides {
    pub title: Option<String>,
    pub description: Option<String>,
    pub path: Option<String>,
    pub category: Option<String>,
}

/// One contribution declared by a plugin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionConfig {
    /// Serialized as `type` to match the manifest schema.
    #[serde(rename = "type")]
    pub kind: ExtensionType,
    pub title: String,
    pub description: String,
    /// Target extension point, e.g. `grafana/dashboard/panel/menu`.
    pub extension_point_id: String,
    /// Route for link extensions; must stay inside the plugin namespace.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(
        default,
        skip_serializing,
        deserialize_with = "deserialize_declared_configure"
    )]
    pub configure: Option<Configure>,
}

impl ExtensionConfig {
    /// Creates a link declaration without a configure callback.
    pub fn link(
        title: impl Into<String>,
        description: impl Into<String>,
        extension_point_id: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            kind: ExtensionType::Link,
            title: title.into(),
            description: description.into(),
            extension_point_id: extension_point_id.into(),
            path: Some(path.into()),
            category: None,
            configure: None,
        }
    }

    /// Creates a component declaration without a configure callback.
    pub fn component(
        title: impl Into<String>,
        description: impl Into<String>,
        extension_point_id: impl Into<String>,
    ) -> Self {
        Self {
            kind: ExtensionType::Component,
            title: title.into(),
            description: description.into(),
            extension_point_id: extension_point_id.into(),
            path: None,
            category: None,
            configure: None,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_configure(mut self, configure: Configure) -> Self {
        self.configure = Some(configure);
        self
    }

    /// Shorthand for attaching a callable configure.
    pub fn with_configure_fn<F>(self, f: F) -> Self
    where
        F: Fn(Option<&Value>) -> Option<ExtensionOverrides> + Send + Sync + 'static,
    {
        self.with_configure(Configure::callable(f))
    }
}

// JSON can never carry a function, so any declared value is kept as-is and
// rejected later by validation.
fn deserialize_declared_configure<'de, D>(deserializer: D) -> Result<Option<Configure>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.map(Configure::Value))
}

#[cfg(test)]
mod tests {
    use super::{Configure, ExtensionConfig, ExtensionOverrides, ExtensionType};
    use serde_json::json;

    #[test]
    fn callables_compare_equal_regardless_of_body() {
        let left = Configure::callable(|_| None);
        let right = Configure::callable(|_| Some(ExtensionOverrides::default()));
        assert_eq!(left, right);
        assert_ne!(left, Configure::Value(json!("...")));
    }

    #[test]
    fn deserializes_manifest_shape() {
        let config: ExtensionConfig = serde_json::from_value(json!({
            "type": "link",
            "title": "Declare incident",
            "description": "Open the incident form",
            "extensionPointId": "grafana/dashboard/panel/menu",
            "path": "/a/incident-app/declare",
            "configure": "..."
        }))
        .expect("manifest extension");

        assert_eq!(config.kind, ExtensionType::Link);
        assert_eq!(config.path.as_deref(), Some("/a/incident-app/declare"));
        assert_eq!(config.configure, Some(Configure::Value(json!("..."))));
    }

    #[test]
    fn serialization_omits_configure() {
        let config = ExtensionConfig::link("Link", "Desc", "grafana/x", "/a/app/x")
            .with_configure_fn(|_| None);
        let value = serde_json::to_value(&config).expect("serialize");
        assert!(value.get("configure").is_none());
        assert_eq!(value["type"], "link");
        assert_eq!(value["extensionPointId"], "grafana/x");
    }
}
