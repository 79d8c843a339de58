use plugin_ext_core::{
    extension_id, get_plugin_extensions, ExtensionConfig, ExtensionOverrides, ExtensionQuery,
    ExtensionType, ReactiveExtensionRegistry, RegistrationBatch, RegistryOptions,
};
use serde_json::json;

const PANEL_MENU: &str = "grafana/dashboard/panel/menu";

fn registry_with(batches: Vec<RegistrationBatch>) -> ReactiveExtensionRegistry {
    let registry = ReactiveExtensionRegistry::new();
    for batch in batches {
        registry.register(batch);
    }
    registry
}

#[test]
fn resolves_declared_values_without_configure() {
    let registry = registry_with(vec![RegistrationBatch::new(
        "incident-app",
        vec![
            ExtensionConfig::link("Declare", "Declare incident", PANEL_MENU, "/a/incident-app/new")
                .with_category("Incident"),
        ],
    )]);

    let resolved = get_plugin_extensions(
        &registry.get_registry(),
        &ExtensionQuery::new(PANEL_MENU),
        registry.options(),
    );

    assert_eq!(resolved.len(), 1);
    let extension = &resolved[0];
    assert_eq!(extension.kind, ExtensionType::Link);
    assert_eq!(extension.plugin_id, "incident-app");
    assert_eq!(extension.title, "Declare");
    assert_eq!(extension.path.as_deref(), Some("/a/incident-app/new"));
    assert_eq!(extension.category.as_deref(), Some("Incident"));
    assert_eq!(
        extension.id,
        extension_id("incident-app", PANEL_MENU, "Declare")
    );
}

#[test]
fn configure_overrides_apply_per_context() {
    let config = ExtensionConfig::link("Declare", "Declare incident", PANEL_MENU, "/a/incident-app/new")
        .with_configure_fn(|context| {
            let panel = context?.get("panelTitle")?.as_str()?.to_string();
            Some(ExtensionOverrides {
                title: Some(format!("Declare for {panel}")),
                path: Some(format!("/a/incident-app/new?panel={panel}")),
                ..ExtensionOverrides::default()
            })
        });
    let registry = registry_with(vec![RegistrationBatch::new("incident-app", vec![config])]);
    let snapshot = registry.get_registry();

    let context = json!({ "panelTitle": "CPU" });
    let resolved = get_plugin_extensions(
        &snapshot,
        &ExtensionQuery::new(PANEL_MENU).with_context(&context),
        registry.options(),
    );
    assert_eq!(resolved.len(), 1);
    assert_eq!(resolved[0].title, "Declare for CPU");
    assert_eq!(resolved[0].path.as_deref(), Some("/a/incident-app/new?panel=CPU"));
    assert_eq!(
        resolved[0].id,
        extension_id("incident-app", PANEL_MENU, "Declare")
    );

    let hidden = get_plugin_extensions(&snapshot, &ExtensionQuery::new(PANEL_MENU), registry.options());
    assert!(hidden.is_empty());
}

#[test]
fn override_path_outside_namespace_hides_extension() {
    let config = ExtensionConfig::link("Declare", "Declare incident", PANEL_MENU, "/a/incident-app/new")
        .with_configure_fn(|_| {
            Some(ExtensionOverrides {
                path: Some("/a/other-app/steal".to_string()),
                ..ExtensionOverrides::default()
            })
        });
    let registry = registry_with(vec![RegistrationBatch::new("incident-app", vec![config])]);

    let resolved = get_plugin_extensions(
        &registry.get_registry(),
        &ExtensionQuery::new(PANEL_MENU),
        registry.options(),
    );
    assert!(resolved.is_empty());
}

#[test]
fn empty_override_title_hides_extension() {
    let config = ExtensionConfig::link("Declare", "Declare incident", PANEL_MENU, "/a/incident-app/new")
        .with_configure_fn(|_| {
            Some(ExtensionOverrides {
                title: Some(String::new()),
                ..ExtensionOverrides::default()
            })
        });
    let registry = registry_with(vec![RegistrationBatch::new("incident-app", vec![config])]);

    assert!(get_plugin_extensions(
        &registry.get_registry(),
        &ExtensionQuery::new(PANEL_MENU),
        registry.options(),
    )
    .is_empty());
}

#[test]
fn panicking_configure_hides_only_its_extension() {
    let broken = ExtensionConfig::link("Broken", "Panics", PANEL_MENU, "/a/incident-app/broken")
        .with_configure_fn(|_| panic!("configure failure"));
    let healthy = ExtensionConfig::link("Healthy", "Works", PANEL_MENU, "/a/incident-app/ok");
    let registry = registry_with(vec![RegistrationBatch::new(
        "incident-app",
        vec![broken, healthy],
    )]);

    let resolved = get_plugin_extensions(
        &registry.get_registry(),
        &ExtensionQuery::new(PANEL_MENU),
        registry.options(),
    );
    assert_eq!(resolved.len(), 1);
    assert_eq!(resolved[0].title, "Healthy");
}

#[test]
fn limit_per_plugin_caps_each_plugin_independently() {
    let links = |plugin_id: &str| {
        (1..=3)
            .map(|index| {
                ExtensionConfig::link(
                    format!("Link {index}"),
                    "Description",
                    PANEL_MENU,
                    format!("/a/{plugin_id}/{index}"),
                )
            })
            .collect::<Vec<_>>()
    };
    let registry = registry_with(vec![
        RegistrationBatch::new("first-app", links("first-app")),
        RegistrationBatch::new("second-app", links("second-app")),
    ]);
    let snapshot = registry.get_registry();

    let resolved = get_plugin_extensions(
        &snapshot,
        &ExtensionQuery::new(PANEL_MENU).with_limit_per_plugin(1),
        registry.options(),
    );
    let summary = resolved
        .iter()
        .map(|extension| (extension.plugin_id.as_str(), extension.title.as_str()))
        .collect::<Vec<_>>();
    assert_eq!(
        summary,
        vec![("first-app", "Link 1"), ("second-app", "Link 1")]
    );

    let options = RegistryOptions {
        limit_per_plugin: Some(2),
        ..RegistryOptions::default()
    };
    let resolved = get_plugin_extensions(&snapshot, &ExtensionQuery::new(PANEL_MENU), &options);
    assert_eq!(resolved.len(), 4);
}

#[test]
fn hidden_extensions_do_not_count_toward_limit() {
    let hidden = ExtensionConfig::link("Hidden", "Never shown", PANEL_MENU, "/a/app/hidden")
        .with_configure_fn(|_| None);
    let shown = ExtensionConfig::link("Shown", "Always shown", PANEL_MENU, "/a/app/shown");
    let registry = registry_with(vec![RegistrationBatch::new("app", vec![hidden, shown])]);

    let resolved = get_plugin_extensions(
        &registry.get_registry(),
        &ExtensionQuery::new(PANEL_MENU).with_limit_per_plugin(1),
        registry.options(),
    );
    assert_eq!(resolved.len(), 1);
    assert_eq!(resolved[0].title, "Shown");
}

#[test]
fn components_resolve_without_path() {
    let registry = registry_with(vec![RegistrationBatch::new(
        "widget-app",
        vec![ExtensionConfig::component(
            "Widget",
            "Renders a widget",
            "plugins/widget-app/slot",
        )],
    )]);

    let resolved = get_plugin_extensions(
        &registry.get_registry(),
        &ExtensionQuery::new("plugins/widget-app/slot"),
        registry.options(),
    );
    assert_eq!(resolved.len(), 1);
    assert_eq!(resolved[0].kind, ExtensionType::Component);
    assert!(resolved[0].path.is_none());
}

#[test]
fn unknown_extension_point_resolves_to_nothing() {
    let registry = ReactiveExtensionRegistry::new();
    assert!(get_plugin_extensions(
        &registry.get_registry(),
        &ExtensionQuery::new("grafana/unknown"),
        registry.options(),
    )
    .is_empty());
}
