//! CLI probe for the extension registry.
//!
//! # Responsibility
//! - Register plugin manifests from disk the way a host would at startup.
//! - Print the resulting snapshot, or the extensions resolved for one
//!   extension point, as JSON.

use clap::Parser;
use log::info;
use plugin_ext_core::{
    batch_from_manifest, core_version, default_log_level, get_plugin_extensions, init_logging,
    load_manifest_file, ExtensionQuery, LoggingConfig, ReactiveExtensionRegistry,
    RegistryOptions,
};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(name = "plugin_ext_cli", version, about = "Load plugin manifests and print registered extensions")]
struct Cli {
    /// Plugin manifest files, registered in the given order.
    #[arg(required = true)]
    manifests: Vec<PathBuf>,

    /// Registry options JSON file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write logs to this absolute directory.
    #[arg(long)]
    log_dir: Option<PathBuf>,

    #[arg(long, default_value_t = default_log_level().to_string())]
    log_level: String,

    /// Resolve extensions for this extension point instead of printing the snapshot.
    #[arg(long)]
    extension_point: Option<String>,

    /// JSON context passed to configure callbacks.
    #[arg(long, requires = "extension_point")]
    context: Option<String>,
}

fn main() -> ExitCode {
    match run(Cli::parse()) {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(message) => {
            eprintln!("plugin_ext_cli: {message}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<String, String> {
    if let Some(log_dir) = &cli.log_dir {
        init_logging(&LoggingConfig::new(cli.log_level.as_str(), log_dir.as_path()))?;
    }

    let options = match &cli.config {
        Some(path) => RegistryOptions::from_path(path).map_err(|err| err.to_string())?,
        None => RegistryOptions::default(),
    };
    info!(
        "event=cli_start module=cli status=ok version={} manifests={}",
        core_version(),
        cli.manifests.len()
    );

    let registry = ReactiveExtensionRegistry::with_options(options);
    for path in &cli.manifests {
        registry.register(batch_from_manifest(
            &fallback_plugin_id(path),
            load_manifest_file(path),
        ));
    }
    let snapshot = registry.get_registry();

    let output = match &cli.extension_point {
        Some(extension_point_id) => {
            let context = cli
                .context
                .as_deref()
                .map(serde_json::from_str::<Value>)
                .transpose()
                .map_err(|err| format!("--context is not valid JSON: {err}"))?;
            let mut query = ExtensionQuery::new(extension_point_id);
            if let Some(context) = &context {
                query = query.with_context(context);
            }
            let resolved = get_plugin_extensions(&snapshot, &query, registry.options());
            serde_json::to_string_pretty(&resolved)
        }
        None => serde_json::to_string_pretty(&*snapshot),
    };
    output.map_err(|err| format!("failed to serialize output: {err}"))
}

fn fallback_plugin_id(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
