// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Capture/restore of ambient context across task hand-offs.
//!
//! Work submitted to a pool runs on whatever worker picks it up, and that
//! worker's ambient slot has nothing to do with the submitter. Wrapping the
//! work at submission time captures the submitter's context; running the
//! wrapper installs it on the worker for exactly the duration of the work.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context as TaskContext, Poll};

use super::ambient::{get_ambient_context, AmbientContext, ContextScope};

/// A unit of deferred work accepted by a [`TaskExecutor`].
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Entry point for wrapping deferred work.
///
/// # Example
///
/// ```rust
/// use agent_runtime::context::{get_ambient_value, set_ambient_value, ContextPropagator};
///
/// set_ambient_value("request-42".to_string());
/// let work = ContextPropagator::wrap(|| get_ambient_value::<String>());
///
/// let seen = std::thread::spawn(move || work.run()).join().unwrap();
/// assert_eq!(seen.as_deref(), Some("request-42"));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextPropagator;

impl ContextPropagator {
    /// Capture the calling thread's ambient context and close over `work`.
    pub fn wrap<F, R>(work: F) -> Propagated<F>
    where
        F: FnOnce() -> R,
    {
        Propagated {
            captured: get_ambient_context(),
            work,
        }
    }

    /// Wrap `work` with an explicit context instead of the caller's.
    pub fn wrap_with<F, R>(context: Option<AmbientContext>, work: F) -> Propagated<F>
    where
        F: FnOnce() -> R,
    {
        Propagated {
            captured: context,
            work,
        }
    }

    /// Capture the calling thread's ambient context for every poll of `future`.
    pub fn wrap_future<F: Future>(future: F) -> PropagatedFuture<F> {
        PropagatedFuture {
            captured: get_ambient_context(),
            inner: Box::pin(future),
        }
    }
}

/// Deferred work carrying the ambient context captured when it was wrapped.
#[must_use = "wrapped work does nothing until it is run"]
pub struct Propagated<F> {
    captured: Option<AmbientContext>,
    work: F,
}

impl<F> Propagated<F> {
    /// The context that will be installed when the work runs.
    pub fn captured(&self) -> Option<&AmbientContext> {
        self.captured.as_ref()
    }
}

impl<F, R> Propagated<F>
where
    F: FnOnce() -> R,
{
    /// Run the work with the captured context installed.
    ///
    /// The executing thread's previous context is restored afterwards, even
    /// if the work panics.
    pub fn run(self) -> R {
        let _scope = ContextScope::enter(self.captured);
        (self.work)()
    }
}

impl<F> Propagated<F>
where
    F: FnOnce() + Send + 'static,
{
    /// Box the wrapper as a plain [`Task`].
    pub fn into_task(self) -> Task {
        Box::new(move || self.run())
    }
}

/// A future that sees the captured ambient context on every poll.
///
/// Executors poll on arbitrary workers, so the context is installed around
/// each individual poll rather than once.
#[must_use = "futures do nothing unless polled"]
pub struct PropagatedFuture<F> {
    captured: Option<AmbientContext>,
    inner: Pin<Box<F>>,
}

impl<F: Future> Future for PropagatedFuture<F> {
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let _scope = ContextScope::enter(this.captured.clone());
        this.inner.as_mut().poll(cx)
    }
}

/// Spawn `future` on the current tokio runtime with the caller's context.
pub fn spawn_propagated<F>(future: F) -> tokio::task::JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    tokio::spawn(ContextPropagator::wrap_future(future))
}

/// Run `work` on tokio's blocking pool with the caller's context.
pub fn spawn_blocking_propagated<F, R>(work: F) -> tokio::task::JoinHandle<R>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    let wrapped = ContextPropagator::wrap(work);
    tokio::task::spawn_blocking(move || wrapped.run())
}

// ============================================================================
// Executors
// ============================================================================

/// Anything that accepts tasks for later execution.
pub trait TaskExecutor: Send + Sync {
    /// Submit a task. Where and when it runs is up to the executor.
    fn execute(&self, task: Task);
}

impl<E: TaskExecutor + ?Sized> TaskExecutor for Arc<E> {
    fn execute(&self, task: Task) {
        (**self).execute(task)
    }
}

/// Executor that hands each task to a fresh OS thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadPerTaskExecutor;

impl TaskExecutor for ThreadPerTaskExecutor {
    fn execute(&self, task: Task) {
        std::thread::spawn(task);
    }
}

/// Intercepts submission on an inner executor.
///
/// Every submitted task is replaced by its propagator-wrapped equivalent and
/// the submission then proceeds unchanged. This is the in-process form of the
/// thread-pool hook installed on instrumented pool units.
#[derive(Debug, Clone, Default)]
pub struct PropagatingExecutor<E> {
    inner: E,
}

impl<E: TaskExecutor> PropagatingExecutor<E> {
    /// Wrap an executor.
    pub fn new(inner: E) -> Self {
        Self { inner }
    }

    /// Submit a closure, capturing the caller's context.
    pub fn submit<F>(&self, work: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.execute(Box::new(work));
    }

    /// The wrapped executor.
    pub fn inner(&self) -> &E {
        &self.inner
    }

    /// Unwrap the inner executor.
    pub fn into_inner(self) -> E {
        self.inner
    }
}

impl<E: TaskExecutor> TaskExecutor for PropagatingExecutor<E> {
    fn execute(&self, task: Task) {
        self.inner.execute(ContextPropagator::wrap(task).into_task());
    }
}
