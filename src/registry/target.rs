// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Instrumentation targets: one configured rule each.

use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

use super::hook::MethodHookSpec;

/// Separator between package segments in unit names.
pub const PATH_SEPARATOR: char = '/';

/// Kind of code unit a target instruments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnitKind {
    JdbcStatement,
    JdbcPreparedStatement,
    Http,
    CacheClient,
    ThreadPool,
    #[default]
    Other,
}

impl UnitKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::JdbcStatement => "JDBC_STATEMENT",
            Self::JdbcPreparedStatement => "JDBC_PREPARED_STATEMENT",
            Self::Http => "HTTP",
            Self::CacheClient => "CACHE_CLIENT",
            Self::ThreadPool => "THREAD_POOL",
            Self::Other => "OTHER",
        }
    }
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a target came from.
///
/// Built-in targets name library units that the default exclusions cover, so
/// only configured targets are filtered by excluded prefixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetOrigin {
    BuiltIn,
    Configured,
}

/// Split `a/b/C` into `("a/b/", "C")`. Top-level names have no package and
/// yield `None`.
pub fn split_unit_name(unit_name: &str) -> Option<(&str, &str)> {
    unit_name
        .rfind(PATH_SEPARATOR)
        .map(|index| unit_name.split_at(index + 1))
}

#[derive(Debug, Clone)]
enum NameMatcher {
    Exact,
    Pattern { package_prefix: String, simple_name: Regex },
}

/// One configured instrumentation rule.
///
/// A target is either exact (its name is a full unit name) or a pattern (its
/// name is `package/prefix/` followed by a regex over the simple unit name).
#[derive(Debug, Clone)]
pub struct InstrumentationTarget {
    name: String,
    matcher: NameMatcher,
    kind: UnitKind,
    report_caught_exceptions: bool,
    report_execution_time: bool,
    hooks: Vec<MethodHookSpec>,
    origin: TargetOrigin,
}

impl InstrumentationTarget {
    /// A target matching exactly one unit name.
    pub fn exact(name: impl Into<String>, kind: UnitKind) -> Self {
        Self {
            name: name.into(),
            matcher: NameMatcher::Exact,
            kind,
            report_caught_exceptions: false,
            report_execution_time: true,
            hooks: Vec::new(),
            origin: TargetOrigin::Configured,
        }
    }

    /// A target matching every unit in a package whose simple name matches a
    /// regex, e.g. `com/acme/service/.*Service`.
    pub fn pattern(name: impl Into<String>, kind: UnitKind) -> Result<Self, ConfigurationError> {
        let name = name.into();
        let (package_prefix, simple) = split_unit_name(&name).unwrap_or(("", name.as_str()));
        if simple.is_empty() {
            return Err(ConfigurationError::invalid_pattern(&name, "missing unit name pattern"));
        }
        let simple_name = Regex::new(&format!("^(?:{})$", simple))
            .map_err(|e| ConfigurationError::invalid_pattern(&name, e.to_string()))?;
        let package_prefix = package_prefix.to_string();

        Ok(Self {
            name,
            matcher: NameMatcher::Pattern {
                package_prefix,
                simple_name,
            },
            kind,
            report_caught_exceptions: false,
            report_execution_time: true,
            hooks: Vec::new(),
            origin: TargetOrigin::Configured,
        })
    }

    pub fn with_report_caught_exceptions(mut self, report: bool) -> Self {
        self.report_caught_exceptions = report;
        self
    }

    pub fn with_report_execution_time(mut self, report: bool) -> Self {
        self.report_execution_time = report;
        self
    }

    pub fn with_hook(mut self, hook: MethodHookSpec) -> Self {
        self.add_hook(hook);
        self
    }

    pub(crate) fn with_origin(mut self, origin: TargetOrigin) -> Self {
        self.origin = origin;
        self
    }

    /// Add a hook, replacing any hook with the same name and signature in place.
    pub fn add_hook(&mut self, hook: MethodHookSpec) {
        match self.hooks.iter_mut().find(|h| h.same_key(&hook)) {
            Some(existing) => *existing = hook,
            None => self.hooks.push(hook),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> UnitKind {
        self.kind
    }

    pub fn is_pattern(&self) -> bool {
        matches!(self.matcher, NameMatcher::Pattern { .. })
    }

    pub fn origin(&self) -> TargetOrigin {
        self.origin
    }

    pub fn report_caught_exceptions(&self) -> bool {
        self.report_caught_exceptions
    }

    pub fn report_execution_time(&self) -> bool {
        self.report_execution_time
    }

    pub fn hooks(&self) -> &[MethodHookSpec] {
        &self.hooks
    }

    /// The key this target is stored under: the full name for exact targets,
    /// the package prefix for patterns.
    pub fn registry_key(&self) -> &str {
        match &self.matcher {
            NameMatcher::Exact => &self.name,
            NameMatcher::Pattern { package_prefix, .. } => package_prefix,
        }
    }

    /// Whether a pattern target accepts this simple unit name. Exact targets
    /// accept nothing here; they are looked up by full name.
    pub fn accepts_simple_name(&self, simple_name: &str) -> bool {
        match &self.matcher {
            NameMatcher::Exact => false,
            NameMatcher::Pattern { simple_name: re, .. } => re.is_match(simple_name),
        }
    }

    /// A fresh exact target for `unit_name` carrying a copy of this rule's
    /// settings and hook table.
    pub fn instantiate_for(&self, unit_name: &str) -> Self {
        Self {
            name: unit_name.to_string(),
            matcher: NameMatcher::Exact,
            kind: self.kind,
            report_caught_exceptions: self.report_caught_exceptions,
            report_execution_time: self.report_execution_time,
            hooks: self.hooks.clone(),
            origin: self.origin,
        }
    }
}
