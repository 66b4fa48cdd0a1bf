// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Loader-side introspection used by speculative probes.

use crate::error::ProbeFailure;

/// What the loader could find out about a unit without rewriting it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitDescriptor {
    pub name: String,
    pub is_abstract: bool,
    /// The unit implements the task-executor contract.
    pub is_executor: bool,
}

impl UnitDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_abstract: false,
            is_executor: false,
        }
    }

    pub fn executor(mut self) -> Self {
        self.is_executor = true;
        self
    }

    pub fn abstract_unit(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    /// A concrete executor implementation, worth hooking.
    pub fn is_concrete_executor(&self) -> bool {
        self.is_executor && !self.is_abstract
    }
}

/// Implemented by the external loader.
///
/// `describe` may have to resolve other units (supertypes, interfaces); any
/// failure to do so is reported as a [`ProbeFailure`] and the registry treats
/// it as "no match".
pub trait UnitIntrospector: Send + Sync {
    fn describe(&self, unit_name: &str) -> Result<UnitDescriptor, ProbeFailure>;
}

impl<F> UnitIntrospector for F
where
    F: Fn(&str) -> Result<UnitDescriptor, ProbeFailure> + Send + Sync,
{
    fn describe(&self, unit_name: &str) -> Result<UnitDescriptor, ProbeFailure> {
        self(unit_name)
    }
}
