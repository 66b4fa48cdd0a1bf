// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The dispatch coordinator.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use dashmap::DashMap;
use tracing::{debug, info, warn};

use super::event::{AgentEvent, EventKind, HttpCall, ThrowableInfo};
use super::exception::{ExceptionDecider, ExceptionDecision};
use super::handler::{HandlerRegistration, NotificationHandler, OwnerIdentity};
use crate::config::ExceptionFilterConfig;
use crate::context::with_dispatch_key;
use crate::error::{ConfigurationError, DispatchFailure};
use crate::registry::UnitTypeIndex;
use crate::telemetry::metrics::DispatchMetrics;

/// Default slow-query threshold.
pub const DEFAULT_QUERY_THRESHOLD_MS: u64 = 10_000;

/// Default cache call threshold, in nanoseconds.
pub const DEFAULT_CACHE_THRESHOLD_NS: u64 = 10_000 * NANOS_PER_MILLI;

const NANOS_PER_MILLI: u64 = 1_000_000;

/// Routes instrumentation events to the handler selected for the calling
/// thread.
///
/// One instance is shared by every instrumented call site. Handler lookup
/// order:
///
/// 1. the thread's dispatch key is set: the handler registered under that
///    key, or nothing if there is none
/// 2. otherwise the default handler, if one was registered
///
/// No method on this type returns an error or unwinds into the caller once
/// registration is done. Handler errors and panics are logged at debug level,
/// counted, and dropped.
pub struct DispatchCoordinator {
    handlers: DashMap<String, HandlerRegistration>,
    default_handler: OnceLock<Arc<dyn NotificationHandler>>,
    unit_types: Arc<UnitTypeIndex>,
    query_threshold_ms: AtomicU64,
    cache_threshold_ns: AtomicU64,
    exception_decider: RwLock<ExceptionDecider>,
    metrics: DispatchMetrics,
}

impl DispatchCoordinator {
    pub fn new() -> Self {
        Self::with_unit_types(Arc::new(UnitTypeIndex::new()))
    }

    /// Share the unit type index populated by a target registry.
    pub fn with_unit_types(unit_types: Arc<UnitTypeIndex>) -> Self {
        Self {
            handlers: DashMap::new(),
            default_handler: OnceLock::new(),
            unit_types,
            query_threshold_ms: AtomicU64::new(DEFAULT_QUERY_THRESHOLD_MS),
            cache_threshold_ns: AtomicU64::new(DEFAULT_CACHE_THRESHOLD_NS),
            exception_decider: RwLock::new(ExceptionDecider::default()),
            metrics: DispatchMetrics::new(),
        }
    }

    // ========================================================================
    // Registration
    // ========================================================================

    /// Register a handler under its own name and return that name as the
    /// dispatch key. Re-registering a name replaces the earlier handler.
    pub fn register(
        &self,
        owner: impl Into<OwnerIdentity>,
        handler: Arc<dyn NotificationHandler>,
    ) -> Result<String, ConfigurationError> {
        let key = handler.name();
        if key.is_empty() {
            return Err(ConfigurationError::InvalidArgument(
                "notification handler name must be non-empty".to_string(),
            ));
        }

        let owner = owner.into();
        let registration = HandlerRegistration::new(Arc::from(key.as_str()), handler, owner.clone());
        if let Some(previous) = self.handlers.insert(key.clone(), registration) {
            warn!(
                key = %key,
                previous_owner = ?previous.owner(),
                owner = ?owner,
                "Replacing notification handler registration"
            );
        } else {
            info!(key = %key, owner = ?owner, "Registered notification handler");
        }
        Ok(key)
    }

    /// Set the handler used when the calling thread has no dispatch key.
    /// Only the first call succeeds.
    pub fn register_default(&self, handler: Arc<dyn NotificationHandler>) -> Result<(), ConfigurationError> {
        self.default_handler
            .set(handler)
            .map_err(|_| ConfigurationError::AlreadyRegistered("default notification handler".to_string()))?;
        info!("Registered default notification handler");
        Ok(())
    }

    pub fn has_default(&self) -> bool {
        self.default_handler.get().is_some()
    }

    pub fn registration(&self, dispatch_key: &str) -> Option<HandlerRegistration> {
        self.handlers.get(dispatch_key).map(|r| r.value().clone())
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    fn resolve(&self) -> Option<Arc<dyn NotificationHandler>> {
        with_dispatch_key(|key| match key {
            Some(key) => self.handlers.get(key).map(|r| Arc::clone(r.handler())),
            None => self.default_handler.get().cloned(),
        })
    }

    // ========================================================================
    // Thresholds and filters
    // ========================================================================

    /// Negative values clamp to zero.
    pub fn set_query_threshold_ms(&self, threshold_ms: i64) {
        self.query_threshold_ms.store(clamp_non_negative(threshold_ms), Ordering::Relaxed);
    }

    pub fn query_threshold_ms(&self) -> u64 {
        self.query_threshold_ms.load(Ordering::Relaxed)
    }

    /// Negative values clamp to zero.
    pub fn set_cache_threshold_ms(&self, threshold_ms: i64) {
        let nanos = clamp_non_negative(threshold_ms).saturating_mul(NANOS_PER_MILLI);
        self.cache_threshold_ns.store(nanos, Ordering::Relaxed);
    }

    /// Negative values clamp to zero.
    pub fn set_cache_threshold_ns(&self, threshold_ns: i64) {
        self.cache_threshold_ns.store(clamp_non_negative(threshold_ns), Ordering::Relaxed);
    }

    pub fn cache_threshold_ns(&self) -> u64 {
        self.cache_threshold_ns.load(Ordering::Relaxed)
    }

    pub fn set_exception_filter(&self, config: &ExceptionFilterConfig) {
        *self.exception_decider.write().unwrap_or_else(PoisonError::into_inner) = ExceptionDecider::new(config);
    }

    fn decide_exception(&self, error: &ThrowableInfo) -> ExceptionDecision {
        self.exception_decider
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .decide(error)
    }

    pub fn unit_types(&self) -> &Arc<UnitTypeIndex> {
        &self.unit_types
    }

    pub fn metrics(&self) -> &DispatchMetrics {
        &self.metrics
    }

    // ========================================================================
    // Dispatch
    // ========================================================================

    /// Forward one event. Never fails.
    pub fn dispatch(&self, event: AgentEvent) {
        self.emit(event.kind(), || event);
    }

    /// Resolve first, build the event only if someone will receive it.
    fn emit(&self, kind: EventKind, build: impl FnOnce() -> AgentEvent) {
        let outcome = catch_unwind(AssertUnwindSafe(|| self.forward(kind, build)));
        if let Err(payload) = outcome {
            self.discard(kind, DispatchFailure::from_panic("dispatch coordinator", &*payload));
        }
    }

    fn forward(&self, kind: EventKind, build: impl FnOnce() -> AgentEvent) {
        let Some(handler) = self.resolve() else {
            #[cfg(feature = "telemetry")]
            self.metrics.record_unrouted(kind);
            return;
        };

        let mut event = build();
        if let AgentEvent::ExceptionThrown { error, stack_depth } = &mut event {
            let decision = self.decide_exception(error);
            if !decision.valid {
                #[cfg(feature = "telemetry")]
                self.metrics.record_filtered(kind);
                return;
            }
            *stack_depth = decision.stack_depth;
        }
        self.annotate(&mut event);

        match catch_unwind(AssertUnwindSafe(|| handler.handle(&event))) {
            Ok(Ok(())) => {
                #[cfg(feature = "telemetry")]
                self.metrics.record_delivered(kind);
            }
            Ok(Err(source)) => self.discard(
                kind,
                DispatchFailure::Handler {
                    handler: handler.name(),
                    source,
                },
            ),
            Err(payload) => self.discard(kind, DispatchFailure::from_panic(handler.name(), &*payload)),
        }
    }

    /// Append `#<unit kind>` to method entry and exit names of claimed units.
    fn annotate(&self, event: &mut AgentEvent) {
        if let Some(name) = event.method_name_mut() {
            if let Some(unit_kind) = self.unit_types.kind_of_method(name) {
                name.push('#');
                name.push_str(unit_kind.as_str());
            }
        }
    }

    fn discard(&self, kind: EventKind, failure: DispatchFailure) {
        debug!(event = %kind, error = %failure, "Discarding failed dispatch");
        #[cfg(feature = "telemetry")]
        self.metrics.record_failed(kind);
    }

    // ========================================================================
    // Entry points called from rewritten code
    // ========================================================================

    pub fn method_started(&self, name: &str) {
        self.emit(EventKind::MethodStarted, || AgentEvent::MethodStarted { name: name.to_string() });
    }

    pub fn method_finished(
        &self,
        name: &str,
        duration_nanos: u64,
        args: Vec<serde_json::Value>,
        error: Option<ThrowableInfo>,
    ) {
        self.emit(EventKind::MethodFinished, || AgentEvent::MethodFinished {
            name: name.to_string(),
            duration_nanos,
            args,
            error,
        });
    }

    pub fn method_finished_with_threshold(&self, name: &str, threshold_ms: u64) {
        self.emit(EventKind::MethodFinishedWithThreshold, || {
            AgentEvent::MethodFinishedWithThreshold {
                name: name.to_string(),
                threshold_ms,
            }
        });
    }

    pub fn exception_caught(&self, name: &str, error: ThrowableInfo) {
        self.emit(EventKind::ExceptionCaught, || AgentEvent::ExceptionCaught {
            name: name.to_string(),
            error,
        });
    }

    pub fn sql_statement_started(&self, name: &str, sql: &str) {
        self.emit(EventKind::SqlStatementStarted, || AgentEvent::SqlStatementStarted {
            name: name.to_string(),
            sql: sql.to_string(),
        });
    }

    pub fn sql_query_plan_candidate(&self, name: &str, sql: &str) {
        self.emit(EventKind::SqlQueryPlanCandidate, || AgentEvent::SqlQueryPlanCandidate {
            name: name.to_string(),
            sql: sql.to_string(),
        });
    }

    pub fn prepared_statement_started(&self, name: &str, sql: &str, args: Vec<serde_json::Value>) {
        self.emit(EventKind::PreparedStatementStarted, || AgentEvent::PreparedStatementStarted {
            name: name.to_string(),
            sql: sql.to_string(),
            args,
        });
    }

    pub fn prepared_statement_batch_started(&self, name: &str, sql: &str, batch_count: u32) {
        self.emit(EventKind::PreparedStatementBatchStarted, || {
            AgentEvent::PreparedStatementBatchStarted {
                name: name.to_string(),
                sql: sql.to_string(),
                batch_count,
            }
        });
    }

    pub fn http_started(&self, name: &str, url: &str) {
        self.emit(EventKind::HttpStarted, || AgentEvent::HttpStarted {
            name: name.to_string(),
            url: url.to_string(),
        });
    }

    pub fn http_finished(&self, call: HttpCall) {
        self.emit(EventKind::HttpFinished, || AgentEvent::HttpFinished(call));
    }

    pub fn cache_call_started(&self, name: &str) {
        self.emit(EventKind::CacheCallStarted, || AgentEvent::CacheCallStarted { name: name.to_string() });
    }

    /// Filtered through the exception decider before any handler sees it.
    pub fn exception_thrown(&self, error: ThrowableInfo) {
        self.emit(EventKind::ExceptionThrown, || AgentEvent::ExceptionThrown { error, stack_depth: 0 });
    }

    pub fn core_pool_size_changed(&self, size: u32) {
        self.emit(EventKind::CorePoolSizeChanged, || AgentEvent::CorePoolSizeChanged { size });
    }
}

impl fmt::Debug for DispatchCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchCoordinator")
            .field("handlers", &self.handlers.len())
            .field("has_default", &self.has_default())
            .field("query_threshold_ms", &self.query_threshold_ms())
            .field("cache_threshold_ns", &self.cache_threshold_ns())
            .finish_non_exhaustive()
    }
}

impl Default for DispatchCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

fn clamp_non_negative(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::context::DispatchKeyScope;
    use crate::dispatch::handler::MockNotificationHandler;
    use crate::error::HandlerError;
    use crate::registry::UnitKind;

    struct Recorder {
        name: String,
        events: Mutex<Vec<AgentEvent>>,
    }

    impl Recorder {
        fn named(name: &str) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                events: Mutex::new(Vec::new()),
            })
        }

        fn events(&self) -> Vec<AgentEvent> {
            self.events.lock().unwrap().clone()
        }
    }

    impl NotificationHandler for Recorder {
        fn name(&self) -> String {
            self.name.clone()
        }

        fn handle(&self, event: &AgentEvent) -> Result<(), HandlerError> {
            self.events.lock().unwrap().push(event.clone());
            Ok(())
        }
    }

    fn silent_mock(name: &str) -> MockNotificationHandler {
        let mut mock = MockNotificationHandler::new();
        mock.expect_name().return_const(name.to_string());
        mock.expect_handle().never();
        mock
    }

    #[test]
    fn test_register_returns_name_as_key() {
        let coordinator = DispatchCoordinator::new();
        let key = coordinator.register("app-a", Recorder::named("sql")).unwrap();
        assert_eq!(key, "sql");
        assert_eq!(coordinator.handler_count(), 1);
        assert_eq!(coordinator.registration("sql").unwrap().owner().as_str(), Some("app-a"));
    }

    #[test]
    fn test_register_rejects_empty_name() {
        let coordinator = DispatchCoordinator::new();
        let err = coordinator.register(OwnerIdentity::anonymous(), Recorder::named("")).unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidArgument(_)));
        assert_eq!(coordinator.handler_count(), 0);
    }

    #[test]
    fn test_second_default_rejected() {
        let coordinator = DispatchCoordinator::new();
        let first = Recorder::named("first");
        coordinator.register_default(first.clone()).unwrap();

        let err = coordinator.register_default(Recorder::named("second")).unwrap_err();
        assert!(matches!(err, ConfigurationError::AlreadyRegistered(_)));

        coordinator.method_started("a/B.run");
        assert_eq!(first.events().len(), 1);
    }

    #[test]
    fn test_routes_by_dispatch_key() {
        let coordinator = DispatchCoordinator::new();
        let keyed = Recorder::named("tenant-a");
        let fallback = Recorder::named("default");
        coordinator.register("app-a", keyed.clone()).unwrap();
        coordinator.register_default(fallback.clone()).unwrap();

        {
            let _key = DispatchKeyScope::enter("tenant-a");
            coordinator.cache_call_started("redis/clients/jedis/Jedis.get");
        }
        coordinator.cache_call_started("redis/clients/jedis/Jedis.set");

        assert_eq!(keyed.events().len(), 1);
        assert_eq!(fallback.events().len(), 1);
    }

    #[test]
    fn test_unknown_key_is_no_op() {
        let coordinator = DispatchCoordinator::new();
        coordinator.register_default(Arc::new(silent_mock("default"))).unwrap();

        let _key = DispatchKeyScope::enter("nobody");
        coordinator.method_started("a/B.run");
        coordinator.exception_thrown(ThrowableInfo::new("E"));
        #[cfg(feature = "telemetry")]
        assert_eq!(coordinator.metrics().counts(EventKind::MethodStarted).unrouted, 1);
    }

    #[test]
    fn test_no_handlers_is_no_op() {
        let coordinator = DispatchCoordinator::new();
        coordinator.method_started("a/B.run");
        coordinator.core_pool_size_changed(8);
    }

    #[test]
    fn test_method_names_get_unit_kind_suffix() {
        let unit_types = Arc::new(UnitTypeIndex::new());
        unit_types.record("com/acme/Repo", UnitKind::JdbcStatement);
        let coordinator = DispatchCoordinator::with_unit_types(unit_types);
        let recorder = Recorder::named("default");
        coordinator.register_default(recorder.clone()).unwrap();

        coordinator.method_started("com/acme/Repo.find");
        coordinator.method_finished("com/acme/Repo.find", 10, Vec::new(), None);
        coordinator.method_started("com/acme/Unknown.find");
        coordinator.sql_statement_started("com/acme/Repo.find", "select 1");

        let events = recorder.events();
        assert_eq!(events[0].name(), Some("com/acme/Repo.find#JDBC_STATEMENT"));
        assert_eq!(events[1].name(), Some("com/acme/Repo.find#JDBC_STATEMENT"));
        assert_eq!(events[2].name(), Some("com/acme/Unknown.find"));
        assert_eq!(events[3].name(), Some("com/acme/Repo.find"));
    }

    #[test]
    fn test_handler_error_is_contained() {
        let coordinator = DispatchCoordinator::new();
        let mut mock = MockNotificationHandler::new();
        mock.expect_name().return_const("failing".to_string());
        mock.expect_handle()
            .times(2)
            .returning(|_| Err(HandlerError::Failed("boom".to_string())));
        coordinator.register_default(Arc::new(mock)).unwrap();

        coordinator.http_started("okhttp3/RealCall.execute", "https://example.com");
        coordinator.http_finished(HttpCall::default());
        #[cfg(feature = "telemetry")]
        assert_eq!(coordinator.metrics().counts(EventKind::HttpStarted).failed, 1);
    }

    struct Panicking;

    impl NotificationHandler for Panicking {
        fn name(&self) -> String {
            "panicking".to_string()
        }

        fn handle(&self, _event: &AgentEvent) -> Result<(), HandlerError> {
            panic!("handler bug")
        }
    }

    #[test]
    fn test_handler_panic_is_contained() {
        let coordinator = DispatchCoordinator::new();
        coordinator.register_default(Arc::new(Panicking)).unwrap();

        coordinator.prepared_statement_batch_started("a/B.executeBatch", "insert", 3);
        coordinator.method_started("a/B.run");
        #[cfg(feature = "telemetry")]
        assert_eq!(coordinator.metrics().snapshot().totals.failed, 2);
    }

    #[test]
    fn test_exception_filter_drops_and_sets_depth() {
        let coordinator = DispatchCoordinator::new();
        let recorder = Recorder::named("default");
        coordinator.register_default(recorder.clone()).unwrap();
        coordinator.set_exception_filter(&ExceptionFilterConfig {
            suppressed_types: vec!["java.lang.NumberFormatException".to_string()],
            max_stack_size: 2,
            ..Default::default()
        });

        coordinator.exception_thrown(ThrowableInfo::new("java.lang.NumberFormatException"));
        coordinator.exception_thrown(
            ThrowableInfo::new("java.lang.IllegalStateException")
                .with_stack_trace(vec!["a".into(), "b".into(), "c".into()]),
        );

        let events = recorder.events();
        assert_eq!(events.len(), 1);
        match &events[0] {
            AgentEvent::ExceptionThrown { error, stack_depth } => {
                assert_eq!(error.type_name, "java.lang.IllegalStateException");
                assert_eq!(*stack_depth, 2);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_threshold_defaults_and_clamping() {
        let coordinator = DispatchCoordinator::new();
        assert_eq!(coordinator.query_threshold_ms(), DEFAULT_QUERY_THRESHOLD_MS);
        assert_eq!(coordinator.cache_threshold_ns(), DEFAULT_CACHE_THRESHOLD_NS);

        coordinator.set_query_threshold_ms(-5);
        coordinator.set_cache_threshold_ms(-1);
        assert_eq!(coordinator.query_threshold_ms(), 0);
        assert_eq!(coordinator.cache_threshold_ns(), 0);

        coordinator.set_cache_threshold_ms(3);
        assert_eq!(coordinator.cache_threshold_ns(), 3_000_000);
        coordinator.set_cache_threshold_ns(-7);
        assert_eq!(coordinator.cache_threshold_ns(), 0);
    }
}
