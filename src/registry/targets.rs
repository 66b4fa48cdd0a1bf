// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The instrumentation target registry.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};
use tracing::{debug, info, trace, warn};

use super::builtin::{built_in_targets, thread_pool_target, BuiltInSelection, THREAD_POOL_MARKER};
use super::plan::RewritePlan;
use super::probe::UnitIntrospector;
use super::target::{split_unit_name, InstrumentationTarget, TargetOrigin};
use super::unit_index::UnitTypeIndex;
use crate::telemetry::metrics::RegistryMetrics;

/// Prefixes that are never instrumented by configured rules.
pub const DEFAULT_EXCLUDED_PREFIXES: &[&str] = &[
    "java/",
    "javax/",
    "org/apache",
    "com/microsoft/applicationinsights",
    "com/mysql/",
    "org/sqlite/",
    "org/hsqldb/",
    "org/postgresql/",
    "sun/nio/",
    "sun/rmi/",
    "com/sun/jmx/",
    "sun/net/www/http/KeepAlive",
    "com.google",
];

/// Matches loaded units against configured rules and hands out rewrite plans.
///
/// Exact targets are claimed at most once: a successful [`match_unit`]
/// removes the entry, so concurrent loader threads asking for the same name
/// get exactly one plan between them. Pattern targets stay registered and
/// produce a fresh target per matching unit.
///
/// All state lives in sharded concurrent maps; lookups never wait on a
/// registry-wide lock.
///
/// [`match_unit`]: TargetRegistry::match_unit
#[derive(Debug)]
pub struct TargetRegistry {
    exact: DashMap<String, InstrumentationTarget>,
    patterns: DashMap<String, InstrumentationTarget>,
    excluded: DashSet<String>,
    claimed: DashSet<String>,
    built_in_enabled: AtomicBool,
    debug_mode: AtomicBool,
    unit_types: Arc<UnitTypeIndex>,
    metrics: RegistryMetrics,
}

impl TargetRegistry {
    /// An empty registry seeded with the default exclusions.
    pub fn new() -> Self {
        Self::with_unit_types(Arc::new(UnitTypeIndex::new()))
    }

    /// Share a unit type index with a dispatch coordinator.
    pub fn with_unit_types(unit_types: Arc<UnitTypeIndex>) -> Self {
        let excluded = DashSet::new();
        for prefix in DEFAULT_EXCLUDED_PREFIXES {
            excluded.insert((*prefix).to_string());
        }
        Self {
            exact: DashMap::new(),
            patterns: DashMap::new(),
            excluded,
            claimed: DashSet::new(),
            built_in_enabled: AtomicBool::new(false),
            debug_mode: AtomicBool::new(false),
            unit_types,
            metrics: RegistryMetrics::new(),
        }
    }

    // ========================================================================
    // Configuration
    // ========================================================================

    /// Apply a rule set.
    ///
    /// Exclusions only ever grow. Built-in families are installed first, then
    /// `rules` in order, so a rule overrides a built-in with the same exact
    /// name; that override survives later calls that only re-install the
    /// built-ins. Disabling built-ins stops installing them but does not
    /// withdraw ones already pending. Configured rules under an excluded
    /// prefix are dropped, except thread-pool rules. Exact names that were
    /// already claimed are not re-added.
    pub fn configure<R, P>(&self, rules: R, excluded_prefixes: P, built_in: impl Into<BuiltInSelection>)
    where
        R: IntoIterator<Item = InstrumentationTarget>,
        P: IntoIterator,
        P::Item: Into<String>,
    {
        for prefix in excluded_prefixes {
            self.excluded.insert(prefix.into());
        }
        self.prune_excluded();

        let selection = built_in.into();
        self.built_in_enabled.store(selection.enabled, Ordering::Release);
        if selection.enabled {
            let built_ins = built_in_targets(&selection);
            info!(count = built_ins.len(), "Installing built-in instrumentation targets");
            for target in built_ins {
                self.insert(target);
            }
        }

        for target in rules {
            if target.origin() == TargetOrigin::Configured && self.is_excluded(target.name()) {
                debug!(target = target.name(), "Dropping excluded instrumentation target");
                #[cfg(feature = "telemetry")]
                self.metrics.record_dropped_excluded();
                continue;
            }
            self.insert(target);
        }

        debug!(
            exact = self.exact.len(),
            patterns = self.patterns.len(),
            excluded = self.excluded.len(),
            "Registry configured"
        );
    }

    fn insert(&self, target: InstrumentationTarget) {
        if target.is_pattern() {
            let key = target.registry_key().to_string();
            if let Some(previous) = self.patterns.insert(key, target) {
                debug!(previous = previous.name(), "Replaced pattern target for prefix");
            }
            return;
        }

        // The claimed check runs under the entry's shard lock, the same lock
        // `match_unit` holds while it removes and claims.
        match self.exact.entry(target.name().to_string()) {
            Entry::Occupied(mut entry) => {
                if target.origin() == TargetOrigin::BuiltIn && entry.get().origin() == TargetOrigin::Configured {
                    trace!(target = target.name(), "Keeping configured override of built-in target");
                    return;
                }
                let previous = entry.insert(target);
                trace!(target = previous.name(), "Overriding existing exact target");
            }
            Entry::Vacant(entry) => {
                if self.claimed.contains(entry.key()) {
                    debug!(target = target.name(), "Target already claimed, not re-adding");
                    return;
                }
                entry.insert(target);
            }
        }
    }

    /// Drop configured targets that the current exclusions now cover.
    fn prune_excluded(&self) {
        self.exact
            .retain(|name, target| target.origin() == TargetOrigin::BuiltIn || !self.is_excluded(name));
        self.patterns
            .retain(|_, target| target.origin() == TargetOrigin::BuiltIn || !self.is_excluded(target.name()));
    }

    /// True if an excluded prefix covers `unit_name`. Thread-pool units are
    /// never excluded.
    pub fn is_excluded(&self, unit_name: &str) -> bool {
        if unit_name.contains(THREAD_POOL_MARKER) {
            return false;
        }
        self.excluded.iter().any(|prefix| unit_name.starts_with(prefix.as_str()))
    }

    pub fn set_debug_mode(&self, debug_mode: bool) {
        self.debug_mode.store(debug_mode, Ordering::Release);
    }

    pub fn debug_mode(&self) -> bool {
        self.debug_mode.load(Ordering::Acquire)
    }

    pub fn built_in_enabled(&self) -> bool {
        self.built_in_enabled.load(Ordering::Acquire)
    }

    // ========================================================================
    // Matching
    // ========================================================================

    /// Find the rewrite plan for a newly loaded unit.
    pub fn match_unit(&self, unit_name: &str) -> Option<RewritePlan> {
        let claimed = self.exact.remove_if(unit_name, |name, _| {
            self.claimed.insert(name.clone());
            true
        });
        if let Some((_, target)) = claimed {
            trace!(unit = unit_name, "Claimed exact target");
            #[cfg(feature = "telemetry")]
            self.metrics.record_claimed_exact();
            return Some(self.plan_for(target));
        }

        match self.match_pattern(unit_name) {
            Some(target) if target.origin() == TargetOrigin::Configured && self.is_excluded(unit_name) => {
                trace!(unit = unit_name, pattern = target.name(), "Pattern match under excluded prefix");
                #[cfg(feature = "telemetry")]
                self.metrics.record_dropped_excluded();
                None
            }
            Some(target) => {
                trace!(unit = unit_name, pattern = target.name(), "Matched pattern target");
                #[cfg(feature = "telemetry")]
                self.metrics.record_matched_pattern();
                Some(self.plan_for(target.instantiate_for(unit_name)))
            }
            None => {
                #[cfg(feature = "telemetry")]
                self.metrics.record_missed();
                None
            }
        }
    }

    fn match_pattern(&self, unit_name: &str) -> Option<InstrumentationTarget> {
        let (prefix, simple_name) = split_unit_name(unit_name)?;
        let pattern = self.patterns.get(prefix)?;
        if pattern.accepts_simple_name(simple_name) {
            Some(pattern.value().clone())
        } else {
            None
        }
    }

    fn plan_for(&self, target: InstrumentationTarget) -> RewritePlan {
        self.unit_types.record(target.name(), target.kind());
        RewritePlan::from_target(target, self.debug_mode())
    }

    /// Speculatively check whether an unmatched unit is a task executor and,
    /// if so, produce a thread-pool plan for it.
    ///
    /// Any introspection failure, including a panic inside the loader, means
    /// "no match". Each unit is discovered at most once.
    pub fn discover_executor(&self, introspector: &dyn UnitIntrospector, unit_name: &str) -> Option<RewritePlan> {
        if self.claimed.contains(unit_name) || self.is_excluded(unit_name) {
            return None;
        }

        let descriptor = match catch_unwind(AssertUnwindSafe(|| introspector.describe(unit_name))) {
            Ok(Ok(descriptor)) => descriptor,
            Ok(Err(failure)) => {
                trace!(unit = unit_name, error = %failure, "Executor probe abandoned");
                return None;
            }
            Err(_) => {
                warn!(unit = unit_name, "Executor probe panicked");
                return None;
            }
        };

        if !descriptor.is_concrete_executor() || !self.claimed.insert(unit_name.to_string()) {
            return None;
        }

        debug!(unit = unit_name, "Discovered executor implementation");
        #[cfg(feature = "telemetry")]
        self.metrics.record_discovered_executor();
        Some(self.plan_for(thread_pool_target(unit_name)))
    }

    // ========================================================================
    // Inspection
    // ========================================================================

    /// True while an exact target for `unit_name` is waiting to be claimed.
    pub fn has_pending(&self, unit_name: &str) -> bool {
        self.exact.contains_key(unit_name)
    }

    pub fn pending_count(&self) -> usize {
        self.exact.len()
    }

    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }

    /// Current exclusions, sorted.
    pub fn excluded_prefixes(&self) -> Vec<String> {
        let mut prefixes: Vec<String> = self.excluded.iter().map(|p| p.key().clone()).collect();
        prefixes.sort();
        prefixes
    }

    pub fn unit_types(&self) -> &Arc<UnitTypeIndex> {
        &self.unit_types
    }

    pub fn metrics(&self) -> &RegistryMetrics {
        &self.metrics
    }
}

impl Default for TargetRegistry {
    fn default() -> Self {
        Self::new()
    }
}
