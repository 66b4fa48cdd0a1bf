// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration loading from files.
//!
//! Handles loading the agent configuration from JSON and YAML files.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::ConfigError;

use super::types::AgentConfiguration;

/// Config file names to search for (in order).
pub const CONFIG_FILES: &[&str] = &["agent-runtime.json", "agent-runtime.yaml", ".agent-runtime/config.json"];

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "AGENT_RUNTIME_CONFIG";

/// Load a configuration file (JSON or YAML).
pub fn load_config_file(path: &Path) -> Result<AgentConfiguration, ConfigError> {
    let content = std::fs::read_to_string(path)?;

    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    let config: AgentConfiguration = match extension.to_lowercase().as_str() {
        "yaml" | "yml" => serde_yaml::from_str(&content)?,
        _ => serde_json::from_str(&content)?,
    };
    config.validate()?;

    debug!(path = %path.display(), "Loaded agent configuration");
    Ok(config)
}

/// Save a configuration file, choosing the format from the extension.
pub fn save_config_file(path: &Path, config: &AgentConfiguration) -> Result<(), ConfigError> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let content = match extension.to_lowercase().as_str() {
        "yaml" | "yml" => serde_yaml::to_string(config)?,
        _ => serde_json::to_string_pretty(config)?,
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    Ok(())
}

/// First well-known config file present in `dir`.
pub fn find_config_file(dir: &Path) -> Option<PathBuf> {
    CONFIG_FILES.iter().map(|name| dir.join(name)).find(|path| path.exists())
}

/// Load configuration for an agent started in `dir`.
///
/// An explicit file named by `AGENT_RUNTIME_CONFIG` wins and must exist.
/// Otherwise the well-known file names are searched; with none present the
/// defaults apply.
pub fn load_config(dir: &Path) -> Result<AgentConfiguration, ConfigError> {
    let explicit = std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from);
    load_config_from(dir, explicit.as_deref())
}

fn load_config_from(dir: &Path, explicit: Option<&Path>) -> Result<AgentConfiguration, ConfigError> {
    if let Some(path) = explicit {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        return load_config_file(path);
    }

    match find_config_file(dir) {
        Some(path) => load_config_file(&path),
        None => {
            debug!(dir = %dir.display(), "No agent configuration file, using defaults");
            Ok(AgentConfiguration::default())
        }
    }
}
