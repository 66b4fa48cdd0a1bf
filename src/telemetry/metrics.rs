// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Counters for the registry and dispatch hot paths.
//!
//! Lock-free atomics only: recording sits on every instrumented call, so it
//! must never contend with other threads or allocate.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::dispatch::EventKind;

#[derive(Debug, Default)]
struct KindCounters {
    delivered: AtomicU64,
    unrouted: AtomicU64,
    filtered: AtomicU64,
    failed: AtomicU64,
}

impl KindCounters {
    fn load(&self) -> EventCounts {
        EventCounts {
            delivered: self.delivered.load(Ordering::Relaxed),
            unrouted: self.unrouted.load(Ordering::Relaxed),
            filtered: self.filtered.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }

    fn reset(&self) {
        self.delivered.store(0, Ordering::Relaxed);
        self.unrouted.store(0, Ordering::Relaxed);
        self.filtered.store(0, Ordering::Relaxed);
        self.failed.store(0, Ordering::Relaxed);
    }
}

/// Per event kind outcome counters.
#[derive(Debug)]
pub struct DispatchMetrics {
    per_kind: [KindCounters; EventKind::COUNT],
    start_time: Instant,
}

impl DispatchMetrics {
    pub fn new() -> Self {
        Self {
            per_kind: Default::default(),
            start_time: Instant::now(),
        }
    }

    /// A handler accepted the event.
    pub fn record_delivered(&self, kind: EventKind) {
        self.counters(kind).delivered.fetch_add(1, Ordering::Relaxed);
    }

    /// No handler was resolved for the calling thread.
    pub fn record_unrouted(&self, kind: EventKind) {
        self.counters(kind).unrouted.fetch_add(1, Ordering::Relaxed);
    }

    /// The exception decider dropped the event.
    pub fn record_filtered(&self, kind: EventKind) {
        self.counters(kind).filtered.fetch_add(1, Ordering::Relaxed);
    }

    /// The handler returned an error or panicked.
    pub fn record_failed(&self, kind: EventKind) {
        self.counters(kind).failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts for one event kind.
    pub fn counts(&self, kind: EventKind) -> EventCounts {
        self.counters(kind).load()
    }

    /// Get uptime since metrics were initialized.
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Take a snapshot of every kind that saw at least one event.
    pub fn snapshot(&self) -> DispatchSnapshot {
        let mut by_kind = BTreeMap::new();
        let mut totals = EventCounts::default();
        for kind in EventKind::ALL {
            let counts = self.counts(kind);
            if counts.total() > 0 {
                totals.add(&counts);
                by_kind.insert(kind.as_str(), counts);
            }
        }
        DispatchSnapshot { by_kind, totals }
    }

    /// Reset all counters.
    pub fn reset(&self) {
        for counters in &self.per_kind {
            counters.reset();
        }
    }

    fn counters(&self, kind: EventKind) -> &KindCounters {
        &self.per_kind[kind.index()]
    }
}

impl Default for DispatchMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome counts for one event kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EventCounts {
    pub delivered: u64,
    pub unrouted: u64,
    pub filtered: u64,
    pub failed: u64,
}

impl EventCounts {
    pub fn total(&self) -> u64 {
        self.delivered + self.unrouted + self.filtered + self.failed
    }

    fn add(&mut self, other: &Self) {
        self.delivered += other.delivered;
        self.unrouted += other.unrouted;
        self.filtered += other.filtered;
        self.failed += other.failed;
    }
}

/// Point-in-time copy of [`DispatchMetrics`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct DispatchSnapshot {
    pub by_kind: BTreeMap<&'static str, EventCounts>,
    pub totals: EventCounts,
}

/// Registry match outcomes.
#[derive(Debug, Default)]
pub struct RegistryMetrics {
    claimed_exact: AtomicU64,
    matched_pattern: AtomicU64,
    discovered_executors: AtomicU64,
    missed: AtomicU64,
    dropped_excluded: AtomicU64,
}

impl RegistryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_claimed_exact(&self) {
        self.claimed_exact.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_matched_pattern(&self) {
        self.matched_pattern.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_discovered_executor(&self) {
        self.discovered_executors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_missed(&self) {
        self.missed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped_excluded(&self) {
        self.dropped_excluded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            claimed_exact: self.claimed_exact.load(Ordering::Relaxed),
            matched_pattern: self.matched_pattern.load(Ordering::Relaxed),
            discovered_executors: self.discovered_executors.load(Ordering::Relaxed),
            missed: self.missed.load(Ordering::Relaxed),
            dropped_excluded: self.dropped_excluded.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`RegistryMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RegistrySnapshot {
    pub claimed_exact: u64,
    pub matched_pattern: u64,
    pub discovered_executors: u64,
    pub missed: u64,
    pub dropped_excluded: u64,
}

/// Combined runtime snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub registry: RegistrySnapshot,
    pub dispatch: DispatchSnapshot,
    pub uptime: Duration,
}
