// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Filtering for uncaught exception reports.

use crate::config::ExceptionFilterConfig;

use super::event::ThrowableInfo;

/// Outcome of [`ExceptionDecider::decide`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionDecision {
    pub valid: bool,
    /// Number of stack frames the handler should capture.
    pub stack_depth: usize,
}

impl ExceptionDecision {
    fn rejected() -> Self {
        Self {
            valid: false,
            stack_depth: 0,
        }
    }
}

/// Decides whether an uncaught exception is worth reporting.
///
/// Type rules are prefix matches on the exception type name. An explicitly
/// valid type wins over a suppressed one, so `java.lang.` can be suppressed
/// while `java.lang.IllegalStateException` still gets through.
#[derive(Debug, Clone)]
pub struct ExceptionDecider {
    enabled: bool,
    suppressed: Vec<String>,
    valid: Vec<String>,
    max_stack_size: usize,
}

impl ExceptionDecider {
    pub fn new(config: &ExceptionFilterConfig) -> Self {
        Self {
            enabled: config.enabled,
            suppressed: config.suppressed_types.clone(),
            valid: config.valid_types.clone(),
            max_stack_size: config.max_stack_size,
        }
    }

    pub fn max_stack_size(&self) -> usize {
        self.max_stack_size
    }

    pub fn decide(&self, error: &ThrowableInfo) -> ExceptionDecision {
        if !self.enabled {
            return ExceptionDecision::rejected();
        }

        let type_name = error.type_name.as_str();
        let explicitly_valid = self.valid.iter().any(|p| type_name.starts_with(p.as_str()));
        if !explicitly_valid && self.suppressed.iter().any(|p| type_name.starts_with(p.as_str())) {
            return ExceptionDecision::rejected();
        }

        ExceptionDecision {
            valid: true,
            stack_depth: error.stack_depth().min(self.max_stack_size),
        }
    }
}

impl Default for ExceptionDecider {
    fn default() -> Self {
        Self::new(&ExceptionFilterConfig::default())
    }
}
