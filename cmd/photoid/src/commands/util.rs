//! Utility functions for CLI commands.

use std::path::Path;
use std::sync::Arc;

use photoid_faces::{Config, Registry};
use photoid_kv::RedbStore;

use crate::Cli;

/// Loads the registry config, falling back to defaults without `--config`.
pub fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    match cli.config.as_deref() {
        Some(path) => load_request(path),
        None => Ok(Config::default()),
    }
}

/// Opens the registry over the `--db` file, creating it if needed.
pub fn open_registry(cli: &Cli) -> anyhow::Result<Registry> {
    let cfg = load_config(cli)?;
    let store = RedbStore::open(&cli.db)
        .map_err(|e| anyhow::anyhow!("open database {}: {e}", cli.db))?;
    Ok(Registry::new(cfg, Arc::new(store))?)
}

/// Loads a request from a YAML or JSON file.
pub fn load_request<T: serde::de::DeserializeOwned>(path: &str) -> anyhow::Result<T> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("read {path}: {e}"))?;
    let ext = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("yaml");

    let result = match ext.to_lowercase().as_str() {
        "json" => serde_json::from_str(&content)?,
        _ => serde_yaml::from_str(&content)?,
    };

    Ok(result)
}

/// Outputs result as JSON or YAML.
pub fn output_result<T: serde::Serialize>(result: &T, as_json: bool) -> anyhow::Result<()> {
    let output = if as_json {
        serde_json::to_string_pretty(result)? + "\n"
    } else {
        serde_yaml::to_string(result)?
    };
    print!("{}", output);
    Ok(())
}

/// Prints success message.
pub fn print_success(msg: &str) {
    eprintln!("\x1b[32m✓\x1b[0m {}", msg);
}

/// Prints warning message.
pub fn print_warning(msg: &str) {
    eprintln!("\x1b[33m⚠\x1b[0m {}", msg);
}

/// Short textual preview of a vector.
pub fn preview(v: &[f32]) -> String {
    const SHOWN: usize = 4;
    let head = photoid_vecmath::format_vector(&v[..v.len().min(SHOWN)], 3);
    if v.len() > SHOWN {
        format!("{}..{}]", head.trim_end_matches(']'), v.len())
    } else {
        head
    }
}
