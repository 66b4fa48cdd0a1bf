// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Method hook specifications and the instrumentation they produce.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// What the rewritten method body should call into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum HookAction {
    /// Report entry (optionally) and exit with duration.
    ReportTiming,
    /// Report a plain SQL statement execution.
    SqlStatement,
    /// Report a prepared statement execution with its bound arguments.
    PreparedStatement,
    /// Report a prepared statement batch execution.
    PreparedStatementBatch,
    /// Report an outbound HTTP call.
    HttpRequest,
    /// Report a cache client call.
    CacheCall,
    /// Report the construction of an exception.
    ExceptionThrown,
    /// Replace the submitted task argument with a context-propagating wrapper.
    WrapSubmittedTask { argument_index: usize },
}

/// One concrete method the loader found while rewriting a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodOccurrence<'a> {
    pub owner: &'a str,
    pub method_name: &'a str,
    pub signature: &'a str,
    pub access: u32,
}

impl<'a> MethodOccurrence<'a> {
    pub fn new(owner: &'a str, method_name: &'a str, signature: &'a str) -> Self {
        Self {
            owner,
            method_name,
            signature,
            access: 0,
        }
    }

    /// `owner.method`, the identifier used in every dispatched event.
    pub fn qualified_name(&self) -> String {
        qualified_method_name(self.owner, self.method_name)
    }
}

/// Join a unit name and a method name the way dispatched events name them.
pub fn qualified_method_name(owner: &str, method_name: &str) -> String {
    let mut name = String::with_capacity(owner.len() + method_name.len() + 1);
    name.push_str(owner);
    name.push('.');
    name.push_str(method_name);
    name
}

/// The instrumentation to inject into one method occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodInstrumentation {
    pub qualified_name: String,
    pub signature: String,
    pub action: HookAction,
    pub report_on_entry: bool,
    pub report_caught_exceptions: bool,
    pub min_duration_threshold_nanos: u64,
}

type FactoryFn = dyn Fn(&MethodHookSpec, &MethodOccurrence<'_>) -> MethodInstrumentation + Send + Sync;

/// Produces the instrumentation for one method occurrence.
///
/// Factories are immutable and shared between every target cloned from the
/// same rule.
#[derive(Clone)]
pub struct VisitorFactory(Arc<FactoryFn>);

impl VisitorFactory {
    /// Wrap a custom factory closure.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&MethodHookSpec, &MethodOccurrence<'_>) -> MethodInstrumentation + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// The standard factory: emit `action` with the hook's reporting flags.
    pub fn for_action(action: HookAction) -> Self {
        Self::new(move |hook, occurrence| MethodInstrumentation {
            qualified_name: occurrence.qualified_name(),
            signature: occurrence.signature.to_string(),
            action,
            report_on_entry: hook.report_on_entry,
            report_caught_exceptions: hook.report_caught_exceptions,
            min_duration_threshold_nanos: hook.min_duration_threshold_nanos,
        })
    }

    /// Run the factory.
    pub fn create(&self, hook: &MethodHookSpec, occurrence: &MethodOccurrence<'_>) -> MethodInstrumentation {
        (self.0)(hook, occurrence)
    }
}

impl fmt::Debug for VisitorFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("VisitorFactory(..)")
    }
}

/// How one method of a target is hooked.
///
/// An empty signature matches every overload of the method. A threshold of
/// zero reports every invocation.
#[derive(Debug, Clone)]
pub struct MethodHookSpec {
    method_name: String,
    signature: String,
    report_caught_exceptions: bool,
    report_on_entry: bool,
    min_duration_threshold_nanos: u64,
    factory: VisitorFactory,
}

impl MethodHookSpec {
    /// Hook `method_name` with the standard factory for `action`.
    pub fn new(method_name: impl Into<String>, signature: impl Into<String>, action: HookAction) -> Self {
        Self {
            method_name: method_name.into(),
            signature: signature.into(),
            report_caught_exceptions: false,
            report_on_entry: true,
            min_duration_threshold_nanos: 0,
            factory: VisitorFactory::for_action(action),
        }
    }

    /// Report exceptions caught inside the method.
    pub fn with_report_caught_exceptions(mut self, report: bool) -> Self {
        self.report_caught_exceptions = report;
        self
    }

    /// Report method entry in addition to exit.
    pub fn with_report_on_entry(mut self, report: bool) -> Self {
        self.report_on_entry = report;
        self
    }

    /// Only report invocations lasting at least this long.
    pub fn with_min_duration_nanos(mut self, threshold: u64) -> Self {
        self.min_duration_threshold_nanos = threshold;
        self
    }

    /// Replace the visitor factory.
    pub fn with_factory(mut self, factory: VisitorFactory) -> Self {
        self.factory = factory;
        self
    }

    pub fn method_name(&self) -> &str {
        &self.method_name
    }

    pub fn signature(&self) -> &str {
        &self.signature
    }

    pub fn report_caught_exceptions(&self) -> bool {
        self.report_caught_exceptions
    }

    pub fn report_on_entry(&self) -> bool {
        self.report_on_entry
    }

    pub fn min_duration_threshold_nanos(&self) -> u64 {
        self.min_duration_threshold_nanos
    }

    /// Whether this hook applies to a method with the given name and signature.
    pub fn matches(&self, method_name: &str, signature: &str) -> bool {
        self.method_name == method_name && (self.signature.is_empty() || self.signature == signature)
    }

    /// Two hooks with the same key occupy the same slot in a hook table.
    pub(crate) fn same_key(&self, other: &Self) -> bool {
        self.method_name == other.method_name && self.signature == other.signature
    }

    /// Produce the instrumentation for one occurrence of this method.
    pub fn instrument(&self, occurrence: &MethodOccurrence<'_>) -> MethodInstrumentation {
        self.factory.create(self, occurrence)
    }
}
