// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Instrumentation target registry.
//!
//! The external loader reports every newly observed code unit to
//! [`TargetRegistry::match_unit`]; a returned [`RewritePlan`] tells it which
//! methods to hook and with which [`HookAction`].
//!
//! - [`InstrumentationTarget`] is one rule, exact name or package pattern
//! - [`MethodHookSpec`] describes one hooked method
//! - [`builtin`] holds the rule families installed before configured rules
//! - [`UnitTypeIndex`] remembers the kind of every claimed unit

pub mod builtin;
mod hook;
mod plan;
mod probe;
mod target;
mod targets;
mod unit_index;

pub use builtin::BuiltInSelection;
pub use hook::{
    qualified_method_name, HookAction, MethodHookSpec, MethodInstrumentation, MethodOccurrence, VisitorFactory,
};
pub use plan::RewritePlan;
pub use probe::{UnitDescriptor, UnitIntrospector};
pub use target::{split_unit_name, InstrumentationTarget, TargetOrigin, UnitKind, PATH_SEPARATOR};
pub use targets::{TargetRegistry, DEFAULT_EXCLUDED_PREFIXES};
pub use unit_index::UnitTypeIndex;
