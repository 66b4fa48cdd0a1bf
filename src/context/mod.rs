// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Ambient context and its propagation across threads.
//!
//! - [`ambient`] functions read and write the two per-thread slots (ambient
//!   context and dispatch key)
//! - [`ContextScope`] / [`DispatchKeyScope`] install a value and restore the
//!   previous one on drop
//! - [`ContextPropagator`] captures the submitter's context when work is
//!   wrapped and installs it on whichever thread runs the work
//! - [`OperationId`] is a ready-made context value for request correlation
//!
//! # Usage
//!
//! ```rust
//! use agent_runtime::context::{OperationId, PropagatingExecutor, ThreadPerTaskExecutor};
//!
//! let executor = PropagatingExecutor::new(ThreadPerTaskExecutor);
//! let id = OperationId::new();
//! let _scope = id.enter();
//!
//! let (tx, rx) = std::sync::mpsc::channel();
//! executor.submit(move || tx.send(OperationId::current()).unwrap());
//! assert_eq!(rx.recv().unwrap(), Some(id));
//! ```

pub mod ambient;
mod operation;
mod propagator;

pub use ambient::{
    clear_ambient_context, clear_dispatch_key_for_current_thread, dispatch_key_for_current_thread,
    get_ambient_context, get_ambient_value, set_ambient_context, set_ambient_value,
    set_dispatch_key_for_current_thread, with_dispatch_key, AmbientContext, ContextScope,
    DispatchKeyScope,
};
pub use operation::OperationId;
pub use propagator::{
    spawn_blocking_propagated, spawn_propagated, ContextPropagator, Propagated, PropagatedFuture,
    PropagatingExecutor, Task, TaskExecutor, ThreadPerTaskExecutor,
};
