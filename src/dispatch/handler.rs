// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The notification handler capability.

use std::fmt;
use std::sync::Arc;

use crate::error::HandlerError;

use super::event::AgentEvent;

/// Consumes events routed by the dispatch coordinator.
///
/// `handle` runs inline on the instrumented application thread, so it should
/// return quickly. Errors and panics are contained by the coordinator.
#[cfg_attr(test, mockall::automock)]
pub trait NotificationHandler: Send + Sync {
    /// Logical name; doubles as the dispatch key. Must not be empty.
    fn name(&self) -> String;

    fn handle(&self, event: &AgentEvent) -> Result<(), HandlerError>;
}

/// Identifies the loading scope that registered a handler.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct OwnerIdentity(Option<Arc<str>>);

impl OwnerIdentity {
    pub fn new(scope: impl Into<Arc<str>>) -> Self {
        Self(Some(scope.into()))
    }

    /// No particular owner.
    pub fn anonymous() -> Self {
        Self(None)
    }

    pub fn as_str(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

impl fmt::Debug for OwnerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(scope) => write!(f, "OwnerIdentity({})", scope),
            None => f.write_str("OwnerIdentity(anonymous)"),
        }
    }
}

impl From<&str> for OwnerIdentity {
    fn from(scope: &str) -> Self {
        Self::new(scope)
    }
}

impl From<String> for OwnerIdentity {
    fn from(scope: String) -> Self {
        Self::new(scope)
    }
}

/// One keyed handler.
#[derive(Clone)]
pub struct HandlerRegistration {
    dispatch_key: Arc<str>,
    handler: Arc<dyn NotificationHandler>,
    owner: OwnerIdentity,
}

impl HandlerRegistration {
    pub(crate) fn new(dispatch_key: Arc<str>, handler: Arc<dyn NotificationHandler>, owner: OwnerIdentity) -> Self {
        Self {
            dispatch_key,
            handler,
            owner,
        }
    }

    pub fn dispatch_key(&self) -> &str {
        &self.dispatch_key
    }

    pub fn handler(&self) -> &Arc<dyn NotificationHandler> {
        &self.handler
    }

    pub fn owner(&self) -> &OwnerIdentity {
        &self.owner
    }
}

impl fmt::Debug for HandlerRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistration")
            .field("dispatch_key", &self.dispatch_key)
            .field("owner", &self.owner)
            .finish_non_exhaustive()
    }
}
