// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Per-thread ambient context and dispatch key storage.
//!
//! Each thread owns exactly two slots:
//!
//! - the **ambient context**: an opaque value describing the current logical
//!   operation (a request, a job, ...)
//! - the **dispatch key**: selects which registered handler receives the
//!   events raised on this thread
//!
//! Both slots start out unset, are overwritten by `set_*`, and return to unset
//! on `clear_*`. Clearing an unset slot is a no-op. Nothing here is visible to
//! other threads; see [`ContextPropagator`](super::ContextPropagator) for the
//! explicit hand-off.
//!
//! Slot access uses `LocalKey::try_with`, so calls made while the thread is
//! tearing down its locals behave as if the slot were unset instead of
//! panicking.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

thread_local! {
    static AMBIENT: RefCell<Option<AmbientContext>> = const { RefCell::new(None) };
    static DISPATCH_KEY: RefCell<Option<Arc<str>>> = const { RefCell::new(None) };
}

/// An opaque, cheaply clonable ambient context value.
///
/// Equality is identity: two contexts are equal only if they were cloned from
/// the same [`AmbientContext::new`] call.
#[derive(Clone)]
pub struct AmbientContext(Arc<dyn Any + Send + Sync>);

impl AmbientContext {
    /// Wrap a value as an ambient context.
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Arc::new(value))
    }

    /// Borrow the wrapped value if it is a `T`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }

    /// Check whether the wrapped value is a `T`.
    pub fn is<T: Any>(&self) -> bool {
        self.0.is::<T>()
    }

    /// Check whether two handles point at the same context.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for AmbientContext {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for AmbientContext {}

impl fmt::Debug for AmbientContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AmbientContext({:p})", Arc::as_ptr(&self.0))
    }
}

// ============================================================================
// Ambient context slot
// ============================================================================

/// Set the current thread's ambient context, returning the previous one.
pub fn set_ambient_context(context: AmbientContext) -> Option<AmbientContext> {
    replace_ambient_context(Some(context))
}

/// Set the current thread's ambient context from a plain value.
pub fn set_ambient_value<T: Any + Send + Sync>(value: T) -> Option<AmbientContext> {
    set_ambient_context(AmbientContext::new(value))
}

/// The current thread's ambient context, if set.
pub fn get_ambient_context() -> Option<AmbientContext> {
    AMBIENT
        .try_with(|slot| slot.borrow().clone())
        .ok()
        .flatten()
}

/// The current thread's ambient value, if set and of type `T`.
pub fn get_ambient_value<T: Any + Clone>() -> Option<T> {
    AMBIENT
        .try_with(|slot| {
            slot.borrow()
                .as_ref()
                .and_then(|ctx| ctx.downcast_ref::<T>().cloned())
        })
        .ok()
        .flatten()
}

/// Remove the current thread's ambient context, returning it. Idempotent.
pub fn clear_ambient_context() -> Option<AmbientContext> {
    replace_ambient_context(None)
}

/// Replace the slot wholesale; `None` clears it.
pub(crate) fn replace_ambient_context(context: Option<AmbientContext>) -> Option<AmbientContext> {
    AMBIENT
        .try_with(|slot| std::mem::replace(&mut *slot.borrow_mut(), context))
        .ok()
        .flatten()
}

// ============================================================================
// Dispatch key slot
// ============================================================================

/// Route events raised on this thread to the handler registered under `key`.
pub fn set_dispatch_key_for_current_thread(key: impl Into<Arc<str>>) {
    let key = key.into();
    let _ = DISPATCH_KEY.try_with(|slot| *slot.borrow_mut() = Some(key));
}

/// Fall back to the default handler for events raised on this thread.
pub fn clear_dispatch_key_for_current_thread() {
    let _ = DISPATCH_KEY.try_with(|slot| slot.borrow_mut().take());
}

/// The current thread's dispatch key, if set.
pub fn dispatch_key_for_current_thread() -> Option<Arc<str>> {
    DISPATCH_KEY
        .try_with(|slot| slot.borrow().clone())
        .ok()
        .flatten()
}

/// Run `f` with the current dispatch key. An empty key is reported as unset.
///
/// The key is cloned out of the slot first so `f` may itself touch the slot.
pub fn with_dispatch_key<R>(f: impl FnOnce(Option<&str>) -> R) -> R {
    let key = dispatch_key_for_current_thread();
    f(key.as_deref().filter(|k| !k.is_empty()))
}

// ============================================================================
// Scope guards
// ============================================================================

/// Installs an ambient context for the lifetime of the guard.
///
/// On drop the previous value (possibly unset) is put back, so nested scopes
/// unwind in order and a pooled thread never keeps a context it was only
/// lent.
#[must_use = "the context is restored as soon as the scope is dropped"]
pub struct ContextScope {
    previous: Option<AmbientContext>,
    _thread_bound: PhantomData<*const ()>,
}

impl ContextScope {
    /// Install `context` (or clear the slot for `None`).
    pub fn enter(context: Option<AmbientContext>) -> Self {
        let previous = replace_ambient_context(context);
        Self {
            previous,
            _thread_bound: PhantomData,
        }
    }

    /// The context that will be restored on drop.
    pub fn previous(&self) -> Option<&AmbientContext> {
        self.previous.as_ref()
    }
}

impl Drop for ContextScope {
    fn drop(&mut self) {
        replace_ambient_context(self.previous.take());
    }
}

/// Installs a dispatch key for the lifetime of the guard.
#[must_use = "the dispatch key is restored as soon as the scope is dropped"]
pub struct DispatchKeyScope {
    previous: Option<Arc<str>>,
    _thread_bound: PhantomData<*const ()>,
}

impl DispatchKeyScope {
    /// Route this thread's events to `key` until the guard drops.
    pub fn enter(key: impl Into<Arc<str>>) -> Self {
        let previous = dispatch_key_for_current_thread();
        set_dispatch_key_for_current_thread(key);
        Self {
            previous,
            _thread_bound: PhantomData,
        }
    }
}

impl Drop for DispatchKeyScope {
    fn drop(&mut self) {
        match self.previous.take() {
            Some(key) => set_dispatch_key_for_current_thread(key),
            None => clear_dispatch_key_for_current_thread(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ambient_starts_unset() {
        std::thread::spawn(|| {
            assert!(get_ambient_context().is_none());
            assert!(get_ambient_value::<String>().is_none());
        })
        .join()
        .unwrap();
    }

    #[test]
    fn test_set_get_clear() {
        clear_ambient_context();
        assert!(set_ambient_value("request-1".to_string()).is_none());
        assert_eq!(get_ambient_value::<String>(), Some("request-1".to_string()));

        let previous = set_ambient_value("request-2".to_string()).unwrap();
        assert_eq!(previous.downcast_ref::<String>().unwrap(), "request-1");

        assert!(clear_ambient_context().is_some());
        assert!(get_ambient_context().is_none());
        // Clearing twice is harmless
        assert!(clear_ambient_context().is_none());
    }

    #[test]
    fn test_get_value_wrong_type() {
        set_ambient_value(7_u64);
        assert!(get_ambient_value::<String>().is_none());
        assert_eq!(get_ambient_value::<u64>(), Some(7));
        clear_ambient_context();
    }

    #[test]
    fn test_context_identity_equality() {
        let a = AmbientContext::new(1_u32);
        let b = AmbientContext::new(1_u32);
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
        assert!(a.is::<u32>());
        assert!(format!("{:?}", a).starts_with("AmbientContext("));
    }

    #[test]
    fn test_ambient_is_thread_confined() {
        set_ambient_value("main".to_string());
        std::thread::spawn(|| assert!(get_ambient_context().is_none()))
            .join()
            .unwrap();
        clear_ambient_context();
    }

    #[test]
    fn test_context_scope_restores_previous() {
        clear_ambient_context();
        let outer = AmbientContext::new("outer");
        set_ambient_context(outer.clone());
        {
            let inner = AmbientContext::new("inner");
            let scope = ContextScope::enter(Some(inner.clone()));
            assert_eq!(scope.previous(), Some(&outer));
            assert_eq!(get_ambient_context(), Some(inner));
        }
        assert_eq!(get_ambient_context(), Some(outer));

        clear_ambient_context();
        {
            let _scope = ContextScope::enter(Some(AmbientContext::new("lent")));
            assert!(get_ambient_context().is_some());
        }
        assert!(get_ambient_context().is_none());
    }

    #[test]
    fn test_dispatch_key_slot() {
        clear_dispatch_key_for_current_thread();
        assert!(dispatch_key_for_current_thread().is_none());
        assert_eq!(with_dispatch_key(|k| k.map(str::to_string)), None);

        set_dispatch_key_for_current_thread("tenant-a");
        assert_eq!(dispatch_key_for_current_thread().as_deref(), Some("tenant-a"));
        assert_eq!(with_dispatch_key(|k| k.map(str::to_string)), Some("tenant-a".to_string()));

        clear_dispatch_key_for_current_thread();
        clear_dispatch_key_for_current_thread();
        assert!(dispatch_key_for_current_thread().is_none());
    }

    #[test]
    fn test_empty_dispatch_key_reads_as_unset() {
        set_dispatch_key_for_current_thread("");
        assert!(with_dispatch_key(|k| k.is_none()));
        clear_dispatch_key_for_current_thread();
    }

    #[test]
    fn test_dispatch_key_scope() {
        set_dispatch_key_for_current_thread("outer");
        {
            let _scope = DispatchKeyScope::enter("inner");
            assert_eq!(dispatch_key_for_current_thread().as_deref(), Some("inner"));
        }
        assert_eq!(dispatch_key_for_current_thread().as_deref(), Some("outer"));

        clear_dispatch_key_for_current_thread();
        {
            let _scope = DispatchKeyScope::enter("temp");
        }
        assert!(dispatch_key_for_current_thread().is_none());
    }
}
