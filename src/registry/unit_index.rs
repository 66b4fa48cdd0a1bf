// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Claimed unit name to unit kind index.

use dashmap::DashMap;

use super::target::UnitKind;

/// Records the kind of every unit that received a rewrite plan.
///
/// Written by the registry on claim, read by the coordinator on every
/// method-entry and method-exit dispatch.
#[derive(Debug, Default)]
pub struct UnitTypeIndex {
    kinds: DashMap<String, UnitKind>,
}

impl UnitTypeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, unit_name: impl Into<String>, kind: UnitKind) {
        self.kinds.insert(unit_name.into(), kind);
    }

    pub fn kind_of(&self, unit_name: &str) -> Option<UnitKind> {
        self.kinds.get(unit_name).map(|entry| *entry.value())
    }

    /// Kind of the unit owning `owner.method`, if the unit was claimed.
    pub fn kind_of_method(&self, qualified_method_name: &str) -> Option<UnitKind> {
        let (unit, _) = qualified_method_name.rsplit_once('.')?;
        self.kind_of(unit)
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}
