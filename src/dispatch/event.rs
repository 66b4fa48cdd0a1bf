// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Events emitted by instrumented code.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Summary of an exception raised in instrumented code.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThrowableInfo {
    /// Fully qualified exception type, e.g. `java.lang.IllegalStateException`.
    pub type_name: String,
    pub message: Option<String>,
    /// Outermost frame first.
    pub stack_trace: Vec<String>,
}

impl ThrowableInfo {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            message: None,
            stack_trace: Vec::new(),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_stack_trace(mut self, frames: Vec<String>) -> Self {
        self.stack_trace = frames;
        self
    }

    pub fn stack_depth(&self) -> usize {
        self.stack_trace.len()
    }
}

impl fmt::Display for ThrowableInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(message) => write!(f, "{}: {}", self.type_name, message),
            None => f.write_str(&self.type_name),
        }
    }
}

/// Completed outbound HTTP call.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpCall {
    pub identifier: String,
    pub method: String,
    pub correlation_id: Option<String>,
    pub uri: String,
    pub target: Option<String>,
    pub result_code: i32,
    pub duration_nanos: u64,
}

/// One notification from instrumented code.
///
/// `name` fields carry the `owner.method` identifier produced by the rewrite
/// plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum AgentEvent {
    MethodStarted {
        name: String,
    },
    MethodFinished {
        name: String,
        duration_nanos: u64,
        args: Vec<serde_json::Value>,
        error: Option<ThrowableInfo>,
    },
    MethodFinishedWithThreshold {
        name: String,
        threshold_ms: u64,
    },
    ExceptionCaught {
        name: String,
        error: ThrowableInfo,
    },
    SqlStatementStarted {
        name: String,
        sql: String,
    },
    SqlQueryPlanCandidate {
        name: String,
        sql: String,
    },
    PreparedStatementStarted {
        name: String,
        sql: String,
        args: Vec<serde_json::Value>,
    },
    PreparedStatementBatchStarted {
        name: String,
        sql: String,
        batch_count: u32,
    },
    HttpStarted {
        name: String,
        url: String,
    },
    HttpFinished(HttpCall),
    CacheCallStarted {
        name: String,
    },
    /// An exception left instrumented code. `stack_depth` is filled in by the
    /// coordinator from the exception filter before the handler sees it.
    ExceptionThrown {
        error: ThrowableInfo,
        stack_depth: usize,
    },
    CorePoolSizeChanged {
        size: u32,
    },
}

impl AgentEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::MethodStarted { .. } => EventKind::MethodStarted,
            Self::MethodFinished { .. } => EventKind::MethodFinished,
            Self::MethodFinishedWithThreshold { .. } => EventKind::MethodFinishedWithThreshold,
            Self::ExceptionCaught { .. } => EventKind::ExceptionCaught,
            Self::SqlStatementStarted { .. } => EventKind::SqlStatementStarted,
            Self::SqlQueryPlanCandidate { .. } => EventKind::SqlQueryPlanCandidate,
            Self::PreparedStatementStarted { .. } => EventKind::PreparedStatementStarted,
            Self::PreparedStatementBatchStarted { .. } => EventKind::PreparedStatementBatchStarted,
            Self::HttpStarted { .. } => EventKind::HttpStarted,
            Self::HttpFinished(_) => EventKind::HttpFinished,
            Self::CacheCallStarted { .. } => EventKind::CacheCallStarted,
            Self::ExceptionThrown { .. } => EventKind::ExceptionThrown,
            Self::CorePoolSizeChanged { .. } => EventKind::CorePoolSizeChanged,
        }
    }

    /// The `owner.method` identifier, for events that carry one.
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::MethodStarted { name }
            | Self::MethodFinished { name, .. }
            | Self::MethodFinishedWithThreshold { name, .. }
            | Self::ExceptionCaught { name, .. }
            | Self::SqlStatementStarted { name, .. }
            | Self::SqlQueryPlanCandidate { name, .. }
            | Self::PreparedStatementStarted { name, .. }
            | Self::PreparedStatementBatchStarted { name, .. }
            | Self::HttpStarted { name, .. }
            | Self::CacheCallStarted { name } => Some(name),
            Self::HttpFinished(_) | Self::ExceptionThrown { .. } | Self::CorePoolSizeChanged { .. } => None,
        }
    }

    /// Mutable access to the name of method entry and exit events, the ones
    /// that get the unit kind appended.
    pub(crate) fn method_name_mut(&mut self) -> Option<&mut String> {
        match self {
            Self::MethodStarted { name } | Self::MethodFinished { name, .. } => Some(name),
            _ => None,
        }
    }
}

/// Discriminant of [`AgentEvent`], used for metrics and filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    MethodStarted,
    MethodFinished,
    MethodFinishedWithThreshold,
    ExceptionCaught,
    SqlStatementStarted,
    SqlQueryPlanCandidate,
    PreparedStatementStarted,
    PreparedStatementBatchStarted,
    HttpStarted,
    HttpFinished,
    CacheCallStarted,
    ExceptionThrown,
    CorePoolSizeChanged,
}

impl EventKind {
    pub const COUNT: usize = 13;

    pub const ALL: [EventKind; Self::COUNT] = [
        Self::MethodStarted,
        Self::MethodFinished,
        Self::MethodFinishedWithThreshold,
        Self::ExceptionCaught,
        Self::SqlStatementStarted,
        Self::SqlQueryPlanCandidate,
        Self::PreparedStatementStarted,
        Self::PreparedStatementBatchStarted,
        Self::HttpStarted,
        Self::HttpFinished,
        Self::CacheCallStarted,
        Self::ExceptionThrown,
        Self::CorePoolSizeChanged,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MethodStarted => "method_started",
            Self::MethodFinished => "method_finished",
            Self::MethodFinishedWithThreshold => "method_finished_with_threshold",
            Self::ExceptionCaught => "exception_caught",
            Self::SqlStatementStarted => "sql_statement_started",
            Self::SqlQueryPlanCandidate => "sql_query_plan_candidate",
            Self::PreparedStatementStarted => "prepared_statement_started",
            Self::PreparedStatementBatchStarted => "prepared_statement_batch_started",
            Self::HttpStarted => "http_started",
            Self::HttpFinished => "http_finished",
            Self::CacheCallStarted => "cache_call_started",
            Self::ExceptionThrown => "exception_thrown",
            Self::CorePoolSizeChanged => "core_pool_size_changed",
        }
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_kinds_indexed_in_order() {
        for (i, kind) in EventKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i);
        }
    }

    #[test]
    fn test_event_kind_and_name() {
        let event = AgentEvent::SqlStatementStarted {
            name: "com/acme/Repo.find".to_string(),
            sql: "select 1".to_string(),
        };
        assert_eq!(event.kind(), EventKind::SqlStatementStarted);
        assert_eq!(event.name(), Some("com/acme/Repo.find"));

        let event = AgentEvent::CorePoolSizeChanged { size: 4 };
        assert_eq!(event.name(), None);
    }

    #[test]
    fn test_only_entry_and_exit_names_are_mutable() {
        let mut started = AgentEvent::MethodStarted { name: "a.b".to_string() };
        assert!(started.method_name_mut().is_some());

        let mut cache = AgentEvent::CacheCallStarted { name: "a.b".to_string() };
        assert!(cache.method_name_mut().is_none());
    }

    #[test]
    fn test_event_serde_tag() {
        let event = AgentEvent::HttpStarted {
            name: "okhttp3/RealCall.execute".to_string(),
            url: "https://example.com".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "httpStarted");
        assert_eq!(json["url"], "https://example.com");
    }

    #[test]
    fn test_throwable_display() {
        let error = ThrowableInfo::new("java.lang.IllegalStateException").with_message("bad");
        assert_eq!(error.to_string(), "java.lang.IllegalStateException: bad");
        assert_eq!(ThrowableInfo::new("E").to_string(), "E");
    }
}
