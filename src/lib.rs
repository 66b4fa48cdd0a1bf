// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! agent-runtime - the runtime core of an instrumentation agent.
//!
//! An external loader reports every code unit it loads; this crate decides
//! which units get rewritten, routes the events the rewritten code emits to
//! pluggable handlers, and carries an ambient operation context across
//! thread-pool hand-offs. Nothing here may break, block or unwind into the
//! host application.
//!
//! Hosts normally start with [`AgentRuntime::bootstrap`], which loads the
//! configuration file, sets up logging and builds the runtime.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - [`registry`] - Instrumentation targets, matching and rewrite plans
//! - [`dispatch`] - Events, notification handlers and the dispatch coordinator
//! - [`context`] - Per-thread ambient context and its propagation
//! - [`config`] - Configuration types and file loading
//! - [`telemetry`] - Logging setup and runtime metrics
//! - [`error`] - Error types and result aliases
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use agent_runtime::config::{AgentConfiguration, TargetConfig};
//! use agent_runtime::dispatch::{AgentEvent, NotificationHandler};
//! use agent_runtime::error::{HandlerError, ProbeFailure};
//! use agent_runtime::registry::UnitDescriptor;
//! use agent_runtime::AgentRuntime;
//!
//! struct Printer;
//!
//! impl NotificationHandler for Printer {
//!     fn name(&self) -> String {
//!         "printer".to_string()
//!     }
//!
//!     fn handle(&self, event: &AgentEvent) -> Result<(), HandlerError> {
//!         println!("{:?}", event);
//!         Ok(())
//!     }
//! }
//!
//! let mut config = AgentConfiguration::default();
//! config.requested_targets.push(TargetConfig::exact("com/acme/Job"));
//! let runtime = AgentRuntime::from_config(&config)?;
//! runtime.coordinator().register_default(Arc::new(Printer))?;
//!
//! let loader = |name: &str| -> Result<UnitDescriptor, ProbeFailure> { Ok(UnitDescriptor::new(name)) };
//! let plan = runtime.probe(&loader, "com/acme/Job").expect("configured");
//! assert_eq!(plan.unit_name(), "com/acme/Job");
//!
//! runtime.coordinator().method_started("com/acme/Job.run");
//! # Ok::<(), agent_runtime::error::ConfigurationError>(())
//! ```

pub mod config;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod registry;
mod runtime;
pub mod telemetry;

// Re-export commonly used types at crate root
pub use context::{ContextPropagator, ContextScope, OperationId, PropagatingExecutor};
pub use dispatch::{AgentEvent, DispatchCoordinator, NotificationHandler};
pub use error::{ConfigError, ConfigurationError, ProbeFailure, Result};
pub use registry::{InstrumentationTarget, RewritePlan, TargetRegistry};
pub use runtime::AgentRuntime;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
