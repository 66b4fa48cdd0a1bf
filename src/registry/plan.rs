// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Rewrite plans handed to the external loader.

use super::hook::{MethodHookSpec, MethodInstrumentation, MethodOccurrence};
use super::target::{InstrumentationTarget, UnitKind};

/// Which methods of one unit to hook, and how.
///
/// The loader walks the unit's methods and asks [`RewritePlan::instrument`]
/// for each; `None` means leave the method alone.
#[derive(Debug, Clone)]
pub struct RewritePlan {
    unit_name: String,
    unit_kind: UnitKind,
    report_caught_exceptions: bool,
    report_execution_time: bool,
    hooks: Vec<MethodHookSpec>,
    debug_mode: bool,
}

impl RewritePlan {
    /// Build a plan from a claimed (exact) target.
    pub fn from_target(target: InstrumentationTarget, debug_mode: bool) -> Self {
        Self {
            unit_name: target.name().to_string(),
            unit_kind: target.kind(),
            report_caught_exceptions: target.report_caught_exceptions(),
            report_execution_time: target.report_execution_time(),
            hooks: target.hooks().to_vec(),
            debug_mode,
        }
    }

    pub fn unit_name(&self) -> &str {
        &self.unit_name
    }

    pub fn unit_kind(&self) -> UnitKind {
        self.unit_kind
    }

    pub fn report_caught_exceptions(&self) -> bool {
        self.report_caught_exceptions
    }

    pub fn report_execution_time(&self) -> bool {
        self.report_execution_time
    }

    /// Whether the loader should emit its rewritten units for inspection.
    pub fn debug_mode(&self) -> bool {
        self.debug_mode
    }

    pub fn hooks(&self) -> &[MethodHookSpec] {
        &self.hooks
    }

    /// The first hook that applies to this method, in table order.
    pub fn hook_for(&self, method_name: &str, signature: &str) -> Option<&MethodHookSpec> {
        self.hooks.iter().find(|h| h.matches(method_name, signature))
    }

    /// Instrumentation for one method of this unit, if it is hooked.
    pub fn instrument(&self, method_name: &str, signature: &str, access: u32) -> Option<MethodInstrumentation> {
        let hook = self.hook_for(method_name, signature)?;
        let occurrence = MethodOccurrence {
            owner: &self.unit_name,
            method_name,
            signature,
            access,
        };
        let mut instrumentation = hook.instrument(&occurrence);
        instrumentation.report_caught_exceptions |= self.report_caught_exceptions;
        Some(instrumentation)
    }
}
