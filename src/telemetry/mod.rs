// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Logging and metrics infrastructure.
//!
//! - **Logging**: `tracing` events throughout the crate, rendered by the
//!   subscriber installed with [`init_logging`]
//! - **Metrics**: lock-free counters for registry matches and dispatch
//!   outcomes, recorded only with the `telemetry` feature
//!
//! # Usage
//!
//! ```rust,no_run
//! use agent_runtime::telemetry::{init_logging, LoggingConfig};
//!
//! let _ = init_logging(&LoggingConfig::quiet());
//! ```
//!
//! Log levels: trace for per-match and per-dispatch detail, debug for
//! configuration steps and discarded failures, info for registrations, warn
//! for overridden registrations and loader panics.

mod init;
pub mod metrics;

pub use init::{init_logging, LoggingConfig};
pub use metrics::{
    DispatchMetrics, DispatchSnapshot, EventCounts, MetricsSnapshot, RegistryMetrics, RegistrySnapshot,
};
