//! Invocation parameter loading.
//!
//! Values are layered: built-in defaults, then the args file, then
//! environment credentials for keys still unset, then command-line flags.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// Read an args file as a JSON object; the format follows the extension.
///
/// # Errors
///
/// Fails when the file cannot be read, does not parse, or is not a mapping.
pub fn load_args_file(path: &Path) -> Result<Map<String, Value>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read args file {}", path.display()))?;

    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    let value: Value = match extension.as_str() {
        "yaml" | "yml" => serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse YAML args file {}", path.display()))?,
        "toml" => toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML args file {}", path.display()))?,
        _ => serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse JSON args file {}", path.display()))?,
    };

    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        _ => bail!("Args file {} must contain a mapping", path.display()),
    }
}

/// Fill `user` and `passwd` from `JUNOS_USER` / `JUNOS_PASSWD` when unset.
pub fn apply_env_credentials(
    params: &mut Map<String, Value>,
    lookup: impl Fn(&str) -> Option<String>,
) {
    for (key, var) in [("user", "JUNOS_USER"), ("passwd", "JUNOS_PASSWD")] {
        let unset = params.get(key).is_none_or(Value::is_null);
        if unset {
            if let Some(value) = lookup(var).filter(|v| !v.is_empty()) {
                params.insert(key.to_string(), Value::String(value));
            }
        }
    }
}

/// Resolve typed parameters from an optional args file and flag overrides.
///
/// # Errors
///
/// Fails when the args file is unusable or the merged parameters are
/// missing a required field or have the wrong type.
pub fn resolve<T: DeserializeOwned>(
    args_file: Option<&Path>,
    overrides: Map<String, Value>,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<T> {
    let mut params = match args_file {
        Some(path) => load_args_file(path)?,
        None => Map::new(),
    };
    params.extend(overrides);
    apply_env_credentials(&mut params, lookup);

    serde_json::from_value(Value::Object(params)).context("Invalid parameters")
}

/// Environment lookup used outside tests.
#[must_use]
pub fn env_lookup(name: &str) -> Option<String> {
    std::env::var(name).ok()
}
