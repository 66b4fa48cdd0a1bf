// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The assembled instrumentation runtime.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Context;
use tracing::{debug, info};

use crate::config::{load_config, load_config_file, AgentConfiguration};
use crate::dispatch::DispatchCoordinator;
use crate::error::{ConfigurationError, Result};
use crate::registry::{RewritePlan, TargetRegistry, UnitIntrospector, UnitTypeIndex};
use crate::telemetry::{init_logging, LoggingConfig, MetricsSnapshot};

/// A target registry and a dispatch coordinator sharing one unit type index.
///
/// The loader integration holds the runtime and calls [`probe`] for every
/// newly observed unit; rewritten code holds [`coordinator`] and calls into
/// it directly.
///
/// [`probe`]: AgentRuntime::probe
/// [`coordinator`]: AgentRuntime::coordinator
#[derive(Debug)]
pub struct AgentRuntime {
    registry: Arc<TargetRegistry>,
    coordinator: Arc<DispatchCoordinator>,
    executor_discovery: AtomicBool,
}

impl AgentRuntime {
    /// An unconfigured runtime: default exclusions, no rules.
    pub fn new() -> Self {
        let unit_types = Arc::new(UnitTypeIndex::new());
        Self {
            registry: Arc::new(TargetRegistry::with_unit_types(Arc::clone(&unit_types))),
            coordinator: Arc::new(DispatchCoordinator::with_unit_types(unit_types)),
            executor_discovery: AtomicBool::new(false),
        }
    }

    pub fn from_config(config: &AgentConfiguration) -> std::result::Result<Self, ConfigurationError> {
        let runtime = Self::new();
        runtime.reconfigure(config)?;
        Ok(runtime)
    }

    /// Build a runtime from one configuration file.
    pub fn from_config_file(path: &Path) -> Result<Self> {
        let config = load_config_file(path)
            .with_context(|| format!("Failed to load agent configuration from {}", path.display()))?;
        Self::from_config(&config).context("Agent configuration rejected")
    }

    /// Start the agent for a host running in `dir`.
    ///
    /// Loads the configuration (see [`load_config`]), installs logging at the
    /// verbosity its debug flag asks for, then builds the runtime. A host
    /// that already installed a tracing subscriber keeps it.
    pub fn bootstrap(dir: &Path) -> Result<Self> {
        let config = load_config(dir)
            .with_context(|| format!("Failed to load agent configuration for {}", dir.display()))?;

        if let Err(e) = init_logging(&LoggingConfig::for_agent(&config)) {
            debug!(error = %e, "Keeping the host's tracing subscriber");
        }

        let runtime = Self::from_config(&config).context("Agent configuration rejected")?;
        info!(dir = %dir.display(), "Agent runtime started");
        Ok(runtime)
    }

    /// Apply a configuration. Rules are validated before anything changes.
    pub fn reconfigure(&self, config: &AgentConfiguration) -> std::result::Result<(), ConfigurationError> {
        let targets = config.targets()?;
        let built_in = &config.built_in;

        self.registry.set_debug_mode(config.debug_mode);
        self.registry
            .configure(targets, config.excluded_prefixes.iter().cloned(), built_in.selection());

        self.coordinator.set_query_threshold_ms(built_in.sql_max_query_threshold_ms);
        self.coordinator.set_cache_threshold_ms(built_in.cache_threshold_ms);
        self.coordinator.set_exception_filter(&built_in.exception_filter);

        self.executor_discovery.store(built_in.executor_discovery, Ordering::Release);

        info!(
            debug_mode = config.debug_mode,
            built_in = built_in.enabled,
            executor_discovery = built_in.executor_discovery,
            "Agent runtime configured"
        );
        Ok(())
    }

    /// Decide whether a newly observed unit gets rewritten.
    ///
    /// Configured and built-in rules first; when nothing matches and executor
    /// discovery is on, the loader is asked whether the unit is an executor.
    pub fn probe(&self, introspector: &dyn UnitIntrospector, unit_name: &str) -> Option<RewritePlan> {
        if let Some(plan) = self.registry.match_unit(unit_name) {
            return Some(plan);
        }
        if self.executor_discovery.load(Ordering::Acquire) {
            return self.registry.discover_executor(introspector, unit_name);
        }
        None
    }

    pub fn registry(&self) -> &Arc<TargetRegistry> {
        &self.registry
    }

    pub fn coordinator(&self) -> &Arc<DispatchCoordinator> {
        &self.coordinator
    }

    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        let dispatch = self.coordinator.metrics();
        MetricsSnapshot {
            registry: self.registry.metrics().snapshot(),
            dispatch: dispatch.snapshot(),
            uptime: dispatch.uptime(),
        }
    }
}

impl Default for AgentRuntime {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TargetConfig;
    use crate::error::ProbeFailure;
    use crate::config::save_config_file;
    use crate::registry::{UnitDescriptor, UnitKind};
    use tempfile::TempDir;

    fn executors_only(name: &str) -> std::result::Result<UnitDescriptor, ProbeFailure> {
        if name.ends_with("Executor") {
            Ok(UnitDescriptor::new(name).executor())
        } else {
            Err(ProbeFailure::NotFound(name.to_string()))
        }
    }

    #[test]
    fn test_from_config_applies_everything() {
        let mut config = AgentConfiguration::default();
        config.debug_mode = true;
        config.built_in.sql_max_query_threshold_ms = -3;
        config.built_in.cache_threshold_ms = 2;
        config.requested_targets.push(TargetConfig::exact("com/acme/Job"));
        config.excluded_prefixes.push("com/acme/hidden/".to_string());

        let runtime = AgentRuntime::from_config(&config).unwrap();
        assert_eq!(runtime.coordinator().query_threshold_ms(), 0);
        assert_eq!(runtime.coordinator().cache_threshold_ns(), 2_000_000);
        assert!(runtime.registry().is_excluded("com/acme/hidden/Thing"));

        let plan = runtime.probe(&executors_only, "com/acme/Job").unwrap();
        assert!(plan.debug_mode());
    }

    #[test]
    fn test_invalid_config_rejected_before_changes() {
        let mut config = AgentConfiguration::default();
        config.requested_targets.push(TargetConfig::exact("com/acme/Job"));
        config.requested_targets.push(TargetConfig::pattern("com/acme/("));

        let runtime = AgentRuntime::new();
        assert!(runtime.reconfigure(&config).is_err());
        assert!(!runtime.registry().has_pending("com/acme/Job"));
    }

    #[test]
    fn test_executor_discovery_toggle() {
        let runtime = AgentRuntime::new();
        assert!(runtime.probe(&executors_only, "com/acme/WorkExecutor").is_none());

        let mut config = AgentConfiguration::default();
        config.built_in.executor_discovery = true;
        runtime.reconfigure(&config).unwrap();

        let plan = runtime.probe(&executors_only, "com/acme/WorkExecutor").unwrap();
        assert_eq!(plan.unit_kind(), UnitKind::ThreadPool);
        assert!(runtime.probe(&executors_only, "com/acme/Other").is_none());
    }

    #[test]
    fn test_probe_feeds_coordinator_unit_types() {
        let runtime = AgentRuntime::from_config(&AgentConfiguration::default()).unwrap();
        runtime.probe(&executors_only, "okhttp3/RealCall").unwrap();
        assert_eq!(
            runtime.coordinator().unit_types().kind_of_method("okhttp3/RealCall.execute"),
            Some(UnitKind::Http)
        );
    }

    #[test]
    fn test_bootstrap_reads_config_from_dir() {
        let temp = TempDir::new().unwrap();
        let mut config = AgentConfiguration::default();
        config.debug_mode = true;
        config.requested_targets.push(TargetConfig::exact("com/acme/Job"));
        save_config_file(&temp.path().join("agent-runtime.json"), &config).unwrap();

        let runtime = AgentRuntime::bootstrap(temp.path()).unwrap();
        assert!(runtime.registry().debug_mode());
        assert!(runtime.registry().has_pending("com/acme/Job"));
    }

    #[test]
    fn test_bootstrap_without_config_uses_defaults() {
        let temp = TempDir::new().unwrap();
        let runtime = AgentRuntime::bootstrap(temp.path()).unwrap();
        assert!(!runtime.registry().debug_mode());
        assert!(runtime.registry().built_in_enabled());
    }

    #[test]
    fn test_from_config_file_errors_carry_path() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("agent-runtime.yaml");
        std::fs::write(&path, "requestedTargets: [ { name: \"com/acme/(\", pattern: true } ]\n").unwrap();

        let err = AgentRuntime::from_config_file(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("agent-runtime.yaml"));

        let missing = AgentRuntime::from_config_file(&temp.path().join("absent.json")).unwrap_err();
        assert!(missing.to_string().contains("absent.json"));
    }
}
