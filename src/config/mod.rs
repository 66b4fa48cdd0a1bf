// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration module for the agent runtime.
//!
//! Configuration is loaded from the first source found:
//! - The file named by `AGENT_RUNTIME_CONFIG`
//! - `agent-runtime.json`, `agent-runtime.yaml` or `.agent-runtime/config.json`
//!   in the start directory
//! - Built-in defaults
//!
//! Rules in a file are validated on load, so a bad pattern is reported before
//! the registry is ever configured.

mod loader;
mod types;

pub use loader::{find_config_file, load_config, load_config_file, save_config_file, CONFIG_ENV_VAR, CONFIG_FILES};

pub use types::{
    AgentConfiguration, BuiltInConfiguration, ExceptionFilterConfig, MethodConfig, TargetConfig,
    DEFAULT_CACHE_THRESHOLD_MS, DEFAULT_MAX_STACK_SIZE, DEFAULT_SQL_MAX_QUERY_THRESHOLD_MS,
};
