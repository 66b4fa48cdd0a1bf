// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Event dispatch from instrumented code to notification handlers.
//!
//! This module defines:
//! - [`AgentEvent`], one variant per notification rewritten code can emit
//! - [`NotificationHandler`], implemented by telemetry collectors
//! - [`DispatchCoordinator`], the shared entry point that picks a handler for
//!   the calling thread and contains every failure
//! - [`ExceptionDecider`], the filter in front of uncaught exception reports

mod coordinator;
mod event;
mod exception;
mod handler;

pub use coordinator::{DispatchCoordinator, DEFAULT_CACHE_THRESHOLD_NS, DEFAULT_QUERY_THRESHOLD_MS};
pub use event::{AgentEvent, EventKind, HttpCall, ThrowableInfo};
pub use exception::{ExceptionDecider, ExceptionDecision};
pub use handler::{HandlerRegistration, NotificationHandler, OwnerIdentity};
