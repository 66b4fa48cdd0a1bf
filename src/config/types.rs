// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration type definitions.
//!
//! Defines the structure of the agent configuration, supporting JSON and
//! YAML formats. Every field is optional in the file; missing fields take the
//! defaults below.

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;
use crate::registry::{BuiltInSelection, HookAction, InstrumentationTarget, MethodHookSpec, UnitKind};

/// Default slow-query threshold in milliseconds.
pub const DEFAULT_SQL_MAX_QUERY_THRESHOLD_MS: i64 = 10_000;

/// Default cache call threshold in milliseconds.
pub const DEFAULT_CACHE_THRESHOLD_MS: i64 = 10_000;

/// Default number of stack frames captured for uncaught exceptions.
pub const DEFAULT_MAX_STACK_SIZE: usize = 300;

/// Top-level agent configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AgentConfiguration {
    /// Verbose logging and rewritten-unit dumps.
    pub debug_mode: bool,

    pub built_in: BuiltInConfiguration,

    /// User rules, applied after the built-in families.
    pub requested_targets: Vec<TargetConfig>,

    /// Added to the default exclusions.
    pub excluded_prefixes: Vec<String>,
}

impl AgentConfiguration {
    /// Every configured (non built-in) rule in application order: simple
    /// built-in targets, then requested targets.
    pub fn targets(&self) -> Result<Vec<InstrumentationTarget>, ConfigurationError> {
        self.built_in
            .simple_targets
            .iter()
            .chain(&self.requested_targets)
            .map(InstrumentationTarget::try_from)
            .collect()
    }

    /// Check that every rule converts.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        self.targets().map(|_| ())
    }
}

/// Built-in instrumentation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BuiltInConfiguration {
    pub enabled: bool,
    pub jdbc_enabled: bool,
    pub http_enabled: bool,
    pub cache_enabled: bool,

    /// Probe unmatched units for executor implementations.
    pub executor_discovery: bool,

    pub sql_max_query_threshold_ms: i64,
    pub cache_threshold_ms: i64,
    pub exception_filter: ExceptionFilterConfig,

    /// Extra exact rules shipped with the agent. Unlike the built-in families
    /// these are subject to exclusion.
    pub simple_targets: Vec<TargetConfig>,
}

impl BuiltInConfiguration {
    pub fn selection(&self) -> BuiltInSelection {
        BuiltInSelection {
            enabled: self.enabled,
            jdbc: self.jdbc_enabled,
            http: self.http_enabled,
            cache: self.cache_enabled,
        }
    }
}

impl Default for BuiltInConfiguration {
    fn default() -> Self {
        Self {
            enabled: true,
            jdbc_enabled: true,
            http_enabled: true,
            cache_enabled: true,
            executor_discovery: false,
            sql_max_query_threshold_ms: DEFAULT_SQL_MAX_QUERY_THRESHOLD_MS,
            cache_threshold_ms: DEFAULT_CACHE_THRESHOLD_MS,
            exception_filter: ExceptionFilterConfig::default(),
            simple_targets: Vec::new(),
        }
    }
}

/// Uncaught exception filtering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExceptionFilterConfig {
    pub enabled: bool,

    /// Type name prefixes that are never reported.
    pub suppressed_types: Vec<String>,

    /// Type name prefixes that are reported even when suppressed.
    pub valid_types: Vec<String>,

    pub max_stack_size: usize,
}

impl Default for ExceptionFilterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            suppressed_types: Vec::new(),
            valid_types: Vec::new(),
            max_stack_size: DEFAULT_MAX_STACK_SIZE,
        }
    }
}

/// One rule as written in a config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TargetConfig {
    /// Full unit name, or `package/prefix/<regex>` when `pattern` is set.
    pub name: String,
    pub pattern: bool,
    pub kind: UnitKind,
    pub report_caught_exceptions: bool,
    pub report_execution_time: bool,
    pub methods: Vec<MethodConfig>,
}

impl TargetConfig {
    pub fn exact(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn pattern(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pattern: true,
            ..Default::default()
        }
    }

    pub fn with_method(mut self, method: MethodConfig) -> Self {
        self.methods.push(method);
        self
    }
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            pattern: false,
            kind: UnitKind::Other,
            report_caught_exceptions: false,
            report_execution_time: true,
            methods: Vec::new(),
        }
    }
}

/// One hooked method as written in a config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MethodConfig {
    pub name: String,

    /// Empty matches every overload.
    pub signature: String,

    pub action: HookAction,
    pub report_caught_exceptions: bool,
    pub report_on_entry: bool,
    pub min_duration_threshold_nanos: u64,
}

impl MethodConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

impl Default for MethodConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            signature: String::new(),
            action: HookAction::ReportTiming,
            report_caught_exceptions: false,
            report_on_entry: true,
            min_duration_threshold_nanos: 0,
        }
    }
}

impl TryFrom<&TargetConfig> for InstrumentationTarget {
    type Error = ConfigurationError;

    fn try_from(config: &TargetConfig) -> Result<Self, Self::Error> {
        if config.name.is_empty() {
            return Err(ConfigurationError::InvalidTarget("target name must be non-empty".to_string()));
        }

        let mut target = if config.pattern {
            InstrumentationTarget::pattern(&config.name, config.kind)?
        } else {
            InstrumentationTarget::exact(&config.name, config.kind)
        }
        .with_report_caught_exceptions(config.report_caught_exceptions)
        .with_report_execution_time(config.report_execution_time);

        for method in &config.methods {
            if method.name.is_empty() {
                return Err(ConfigurationError::InvalidTarget(format!(
                    "method name must be non-empty in target '{}'",
                    config.name
                )));
            }
            target.add_hook(
                MethodHookSpec::new(&method.name, &method.signature, method.action)
                    .with_report_caught_exceptions(method.report_caught_exceptions)
                    .with_report_on_entry(method.report_on_entry)
                    .with_min_duration_nanos(method.min_duration_threshold_nanos),
            );
        }
        Ok(target)
    }
}
